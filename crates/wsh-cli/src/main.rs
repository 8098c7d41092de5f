//! wsh command-line client.
//!
//! Thin driver over `wsh-client`: connect/authenticate, then run one of the
//! session kinds (shell, exec, file transfer) or a key-store management
//! command.

mod config;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use config::Config;
use progress::{format_bytes, TransferProgress};
use wsh_client::{ChannelKind, Client, ConnectConfig, Credentials, NullEventSink};
use wsh_crypto::KeyStore;

/// wsh - authenticated, multiplexed remote shell sessions.
#[derive(Parser)]
#[command(name = "wsh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path.
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive pty session.
    Shell {
        /// Server URL, e.g. `https://host:port` or `wss://host:port`.
        url: String,
        /// Username to present during the handshake.
        #[arg(short, long, default_value = "wsh")]
        username: String,
        /// Named key store entry to authenticate with.
        #[arg(short, long)]
        key: Option<String>,
        /// Terminal width.
        #[arg(long, default_value_t = 80)]
        cols: u16,
        /// Terminal height.
        #[arg(long, default_value_t = 24)]
        rows: u16,
    },

    /// Run a single command and exit.
    Exec {
        /// Server URL.
        url: String,
        /// Command to run remotely.
        command: String,
        /// Username to present during the handshake.
        #[arg(short, long, default_value = "wsh")]
        username: String,
        /// Named key store entry to authenticate with.
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Upload a local file to the remote host.
    Upload {
        /// Server URL.
        url: String,
        /// Local file to send.
        file: PathBuf,
        /// Destination path on the remote host.
        remote_path: String,
        /// Username to present during the handshake.
        #[arg(short, long, default_value = "wsh")]
        username: String,
        /// Named key store entry to authenticate with.
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Download a remote file.
    Download {
        /// Server URL.
        url: String,
        /// Path on the remote host.
        remote_path: String,
        /// Local destination path.
        output: PathBuf,
        /// Username to present during the handshake.
        #[arg(short, long, default_value = "wsh")]
        username: String,
        /// Named key store entry to authenticate with.
        #[arg(short, long)]
        key: Option<String>,
    },

    /// Key store management.
    #[command(subcommand)]
    Keys(KeysCommand),
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Generate a new named identity keypair.
    Generate {
        /// Entry name.
        name: String,
        /// Allow this entry's raw/PKCS8 key material to be exported or backed up.
        #[arg(long)]
        exportable: bool,
    },
    /// List stored key entries.
    List,
    /// Print a key's public key in external (`ssh-ed25519 ...`) format.
    Export {
        /// Entry name.
        name: String,
    },
    /// Remove a key entry.
    Delete {
        /// Entry name.
        name: String,
    },
    /// Encrypt every exportable entry into a backup blob.
    Backup {
        /// Output file for the encrypted blob.
        output: PathBuf,
    },
    /// Restore entries from a backup blob.
    Restore {
        /// Backup blob to read.
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_env_filter(if cli.verbose { "debug" } else { "info" }).init();

    let config_path = cli.config.map(PathBuf::from).unwrap_or_else(Config::default_path);
    let config = if config_path.exists() || config_path == Config::default_path() {
        Config::load_or_default()?
    } else {
        Config::load(&config_path)?
    };
    config.validate()?;

    match cli.command {
        Commands::Shell { url, username, key, cols, rows } => {
            run_shell(url, username, key, cols, rows, &config).await?;
        }
        Commands::Exec { url, command, username, key } => {
            run_exec(url, command, username, key, &config).await?;
        }
        Commands::Upload { url, file, remote_path, username, key } => {
            run_upload(url, file, remote_path, username, key, &config).await?;
        }
        Commands::Download { url, remote_path, output, username, key } => {
            run_download(url, remote_path, output, username, key, &config).await?;
        }
        Commands::Keys(cmd) => run_keys(cmd, &config).await?,
    }

    Ok(())
}

async fn connect_config(
    url: String,
    username: String,
    key: Option<String>,
    config: &Config,
) -> anyhow::Result<ConnectConfig> {
    let credentials = match key.or_else(|| config.keystore.default_key.clone()) {
        Some(key_name) => {
            let keystore = Arc::new(KeyStore::open(config.keystore.path.clone()).await?);
            Credentials::Pubkey { keystore, key_name }
        }
        None => {
            let password = rpassword::prompt_password("Password: ")?;
            Credentials::Password(password)
        }
    };

    Ok(ConnectConfig {
        url,
        username,
        credentials,
        timeout: config.connect.timeout(),
        keepalive_interval: config.connect.keepalive_interval(),
    })
}

async fn run_shell(
    url: String,
    username: String,
    key: Option<String>,
    cols: u16,
    rows: u16,
    config: &Config,
) -> anyhow::Result<()> {
    let connect_cfg = connect_config(url, username, key, config).await?;
    let client = Client::connect(connect_cfg, Arc::new(NullEventSink)).await?;

    println!("connected: session {}", client.session_id().await);

    let mut session = client
        .open_session(ChannelKind::Pty, None, Some(cols), Some(rows), Vec::new())
        .await?;

    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut to_remote = [0u8; 4096];
    let mut from_remote = [0u8; 4096];

    loop {
        tokio::select! {
            result = tokio::io::AsyncReadExt::read(&mut stdin, &mut to_remote) => {
                let n = result?;
                if n == 0 {
                    session.close().await?;
                    break;
                }
                session.write(&to_remote[..n]).await?;
            }
            result = session.read(&mut from_remote) => {
                let n = result?;
                if n == 0 {
                    break;
                }
                tokio::io::AsyncWriteExt::write_all(&mut stdout, &from_remote[..n]).await?;
                tokio::io::AsyncWriteExt::flush(&mut stdout).await?;
            }
        }
    }

    let code = session.wait_exit().await;
    client.disconnect().await?;
    if let Some(code) = code {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_exec(
    url: String,
    command: String,
    username: String,
    key: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let connect_cfg = connect_config(url, username, key, config).await?;
    let (output, code) = Client::exec(connect_cfg, command, config.connect.timeout()).await?;
    tokio::io::AsyncWriteExt::write_all(&mut tokio::io::stdout(), &output).await?;
    if let Some(code) = code {
        std::process::exit(code);
    }
    Ok(())
}

async fn run_upload(
    url: String,
    file: PathBuf,
    remote_path: String,
    username: String,
    key: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let connect_cfg = connect_config(url, username, key, config).await?;
    let client = Client::connect(connect_cfg, Arc::new(NullEventSink)).await?;

    let bytes = tokio::fs::read(&file).await?;
    let label = file.file_name().and_then(|n| n.to_str()).unwrap_or("file");
    let progress = TransferProgress::new(bytes.len() as u64, label);

    let result = client.upload(&bytes, &remote_path, |sent, total| progress.update(sent.min(total) as u64)).await;

    match result {
        Ok(()) => progress.finish_with_message(format!("uploaded {}", format_bytes(bytes.len() as u64))),
        Err(e) => {
            progress.abandon();
            client.disconnect().await?;
            return Err(e.into());
        }
    }

    client.disconnect().await?;
    Ok(())
}

async fn run_download(
    url: String,
    remote_path: String,
    output: PathBuf,
    username: String,
    key: Option<String>,
    config: &Config,
) -> anyhow::Result<()> {
    let connect_cfg = connect_config(url, username, key, config).await?;
    let client = Client::connect(connect_cfg, Arc::new(NullEventSink)).await?;

    let bytes = client.download(&remote_path).await?;
    tokio::fs::write(&output, &bytes).await?;
    println!("downloaded {} to {}", format_bytes(bytes.len() as u64), output.display());

    client.disconnect().await?;
    Ok(())
}

async fn run_keys(cmd: KeysCommand, config: &Config) -> anyhow::Result<()> {
    let keystore = KeyStore::open(config.keystore.path.clone()).await?;

    match cmd {
        KeysCommand::Generate { name, exportable } => {
            let info = keystore.generate_key(&name, exportable).await?;
            println!("generated key '{}'", info.name);
            println!("  fingerprint: {}", info.fingerprint);
            println!("  public key:  {}", info.public_key_external);
        }
        KeysCommand::List => {
            let keys = keystore.list_keys().await;
            if keys.is_empty() {
                println!("no keys in store at {}", config.keystore.path.display());
            }
            for info in keys {
                println!("{}  {}  exportable={}", info.name, info.fingerprint, info.exportable);
            }
        }
        KeysCommand::Export { name } => {
            let external = keystore.export_public_key(&name).await?;
            println!("{external}");
        }
        KeysCommand::Delete { name } => {
            keystore.delete_key(&name).await?;
            println!("deleted '{name}'");
        }
        KeysCommand::Backup { output } => {
            let passphrase = rpassword::prompt_password("Backup passphrase: ")?;
            let blob = keystore.backup(&passphrase).await?;
            tokio::fs::write(&output, &blob).await?;
            println!("wrote backup to {}", output.display());
        }
        KeysCommand::Restore { input } => {
            let passphrase = rpassword::prompt_password("Backup passphrase: ")?;
            let blob = tokio::fs::read(&input).await?;
            let (restored, skipped) = keystore.restore(&passphrase, &blob).await?;
            println!("restored {restored}, skipped {skipped} (already present)");
        }
    }

    Ok(())
}
