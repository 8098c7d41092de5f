//! Generates `crates/wsh-protocol/src/messages.gen.rs` from `schema/wsh-v1.yaml`.
//!
//! The schema is the source of truth for every control-record opcode, field
//! list, and nested struct/enum. This module turns it into the same shape
//! the hand-reviewed generated file already uses: a `MsgType` enum, an
//! `Envelope`/`Payload` pair, one struct per message/nested record with a
//! `to_fields`/`from_value` pair, and a small `fields` helper module shared
//! by every `from_value`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

#[derive(Deserialize)]
struct Schema {
    version: String,
    #[serde(default)]
    enums: BTreeMap<String, EnumDef>,
    messages: Vec<MessageDef>,
    #[serde(default)]
    structs: BTreeMap<String, StructDef>,
}

#[derive(Deserialize)]
struct EnumDef {
    values: Vec<String>,
}

#[derive(Deserialize)]
struct MessageDef {
    name: String,
    opcode: u8,
    #[serde(default)]
    fields: Vec<FieldDef>,
}

#[derive(Deserialize)]
struct StructDef {
    #[serde(default)]
    fields: Vec<FieldDef>,
}

#[derive(Deserialize, Clone)]
struct FieldDef {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    #[serde(default)]
    optional: bool,
}

/// Read `schema_path`, render the generated module, and write it to `out_path`.
pub fn run(schema_path: &Path, out_path: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(schema_path)
        .with_context(|| format!("reading {}", schema_path.display()))?;
    let schema: Schema = serde_yaml::from_str(&raw)
        .with_context(|| format!("parsing {}", schema_path.display()))?;

    let code = render(&schema);
    std::fs::write(out_path, code).with_context(|| format!("writing {}", out_path.display()))?;
    println!("wrote {}", out_path.display());
    Ok(())
}

/// A resolved field: how to name it, type it, encode it, and decode it.
struct Resolved {
    rust_type: String,
    encode: String,
    decode: String,
}

fn is_enum(schema: &Schema, name: &str) -> bool {
    schema.enums.contains_key(name)
}

fn is_struct(schema: &Schema, name: &str) -> bool {
    schema.structs.contains_key(name)
}

fn resolve_field(schema: &Schema, field: &FieldDef) -> Resolved {
    let key = &field.name;
    let ty = field.ty.trim();
    let expr = format!("self.{key}");

    if let Some(inner) = ty.strip_prefix("array<").and_then(|s| s.strip_suffix('>')) {
        let inner = inner.trim();
        return resolve_array_field(schema, key, &expr, inner);
    }

    if ty == "map<text,text>" {
        return Resolved {
            rust_type: "Vec<(String, String)>".to_string(),
            encode: format!(
                "Value::Map({expr}.iter().map(|(k, v)| (k.clone(), Value::Text(v.clone()))).collect())"
            ),
            decode: format!(
                "v.get(\"{key}\").and_then(Value::as_map).map(|m| m.iter().map(|(k, v)| \
                 (k.clone(), v.as_text().unwrap_or_default().to_string())).collect()).unwrap_or_default()"
            ),
        };
    }

    if is_enum(schema, ty) {
        return if field.optional {
            Resolved {
                rust_type: format!("Option<{ty}>"),
                encode: format!(
                    "self.{key}.map(|m| Value::Text(m.as_str().to_string())).unwrap_or(Value::Null)"
                ),
                decode: format!(
                    "fields::opt_text(v, \"{key}\").map(|s| {ty}::parse(&s)).transpose()?"
                ),
            }
        } else {
            Resolved {
                rust_type: ty.to_string(),
                encode: format!("Value::Text(self.{key}.as_str().to_string())"),
                decode: format!("{ty}::parse(&fields::text(v, \"{key}\")?)?"),
            }
        };
    }

    if is_struct(schema, ty) {
        return if field.optional {
            Resolved {
                rust_type: format!("Option<{ty}>"),
                encode: format!("self.{key}.as_ref().map({ty}::to_value).unwrap_or(Value::Null)"),
                decode: format!(
                    "v.get(\"{key}\").map({ty}::from_value).transpose()?"
                ),
            }
        } else {
            Resolved {
                rust_type: ty.to_string(),
                encode: format!("self.{key}.to_value()"),
                decode: format!(
                    "{ty}::from_value(v.get(\"{key}\").ok_or(SchemaError::MissingField(\"{key}\"))?)?"
                ),
            }
        };
    }

    match ty {
        "text" => scalar(
            field.optional,
            "String",
            &format!("Value::Text({expr}.clone())"),
            &expr,
            "Value::Text(x.clone())",
            &format!("fields::text(v, \"{key}\")?"),
            &format!("fields::opt_text(v, \"{key}\")"),
        ),
        "bytes" => scalar(
            field.optional,
            "Vec<u8>",
            &format!("Value::Bytes({expr}.clone())"),
            &expr,
            "Value::Bytes(x.clone())",
            &format!("fields::bytes(v, \"{key}\")?"),
            &format!("fields::opt_bytes(v, \"{key}\")"),
        ),
        "uint" | "uint32" => scalar(
            field.optional,
            "u32",
            &format!("Value::UInt({expr} as u64)"),
            &expr,
            "Value::UInt(*x as u64)",
            &format!("fields::u32_(v, \"{key}\")?"),
            &format!("fields::opt_u32(v, \"{key}\")"),
        ),
        "uint16" => scalar(
            field.optional,
            "u16",
            &format!("Value::UInt({expr} as u64)"),
            &expr,
            "Value::UInt(*x as u64)",
            &format!("fields::u16_(v, \"{key}\")?"),
            &format!("fields::opt_u64(v, \"{key}\").map(|x| x as u16)"),
        ),
        "uint64" => scalar(
            field.optional,
            "u64",
            &format!("Value::UInt({expr})"),
            &expr,
            "Value::UInt(*x)",
            &format!("fields::u64_(v, \"{key}\")?"),
            &format!("fields::opt_u64(v, \"{key}\")"),
        ),
        "int32" => scalar(
            field.optional,
            "i32",
            &format!("Value::Int({expr} as i64)"),
            &expr,
            "Value::Int(*x as i64)",
            &format!("fields::i32_(v, \"{key}\")?"),
            &format!("fields::opt_f64(v, \"{key}\").map(|x| x as i32)"),
        ),
        "float" => scalar(
            field.optional,
            "f64",
            &format!("Value::Float({expr})"),
            &expr,
            "Value::Float(*x)",
            &format!("fields::opt_f64(v, \"{key}\").ok_or(SchemaError::MissingField(\"{key}\"))?"),
            &format!("fields::opt_f64(v, \"{key}\")"),
        ),
        "value" => scalar(
            field.optional,
            "Value",
            &format!("{expr}.clone()"),
            &expr,
            "x.clone()",
            &format!("v.get(\"{key}\").cloned().ok_or(SchemaError::MissingField(\"{key}\"))?"),
            &format!("v.get(\"{key}\").cloned()"),
        ),
        other => panic!("unhandled schema field type: {other}"),
    }
}

/// Build a `Resolved` for a scalar field. `opt_wrap` turns a bound `x: &T`
/// into a `Value`; `opt_expr` is the field access expression (e.g.
/// `self.foo`) used only when the field is optional.
fn scalar(
    optional: bool,
    ty: &str,
    encode_req: &str,
    opt_expr: &str,
    opt_wrap: &str,
    decode_req: &str,
    decode_opt: &str,
) -> Resolved {
    if optional {
        Resolved {
            rust_type: format!("Option<{ty}>"),
            encode: format!("{opt_expr}.as_ref().map(|x| {opt_wrap}).unwrap_or(Value::Null)"),
            decode: decode_opt.to_string(),
        }
    } else {
        Resolved { rust_type: ty.to_string(), encode: encode_req.to_string(), decode: decode_req.to_string() }
    }
}

fn resolve_array_field(schema: &Schema, key: &str, expr: &str, inner: &str) -> Resolved {
    if inner == "text" {
        return Resolved {
            rust_type: "Vec<String>".to_string(),
            encode: format!("Value::Array({expr}.iter().cloned().map(Value::Text).collect())"),
            decode: format!("fields::vec_text(v, \"{key}\")"),
        };
    }
    if inner == "uint32" || inner == "uint" {
        return Resolved {
            rust_type: "Vec<u32>".to_string(),
            encode: format!(
                "Value::Array({expr}.iter().map(|x| Value::UInt(*x as u64)).collect())"
            ),
            decode: format!(
                "fields::array(v, \"{key}\").iter().filter_map(Value::as_uint).map(|x| x as u32).collect()"
            ),
        };
    }
    if is_enum(schema, inner) {
        return Resolved {
            rust_type: format!("Vec<{inner}>"),
            encode: format!(
                "Value::Array({expr}.iter().map(|m| Value::Text(m.as_str().to_string())).collect())"
            ),
            decode: format!(
                "fields::array(v, \"{key}\").iter().filter_map(Value::as_text).filter_map(|s| {inner}::parse(s).ok()).collect()"
            ),
        };
    }
    if is_struct(schema, inner) {
        return Resolved {
            rust_type: format!("Vec<{inner}>"),
            encode: format!("Value::Array({expr}.iter().map({inner}::to_value).collect())"),
            decode: format!(
                "fields::array(v, \"{key}\").iter().filter_map(|item| {inner}::from_value(item).ok()).collect()"
            ),
        };
    }
    panic!("unhandled array element type: {inner}");
}

fn render_record(schema: &Schema, name: &str, fields: &[FieldDef], pub_struct: bool) -> String {
    let mut out = String::new();
    let vis = if pub_struct { "pub " } else { "" };
    let _ = writeln!(out, "#[derive(Debug, Clone)]");
    let _ = writeln!(out, "{vis}struct {name} {{");
    for field in fields {
        let resolved = resolve_field(schema, field);
        let _ = writeln!(out, "    pub {}: {},", field.name, resolved.rust_type);
    }
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "impl {name} {{");
    let _ = writeln!(out, "    #[must_use]");
    let _ = writeln!(out, "    pub fn to_value(&self) -> Value {{");
    let _ = writeln!(out, "        Value::Map(self.to_fields())");
    let _ = writeln!(out, "    }}\n");

    let _ = writeln!(out, "    fn to_fields(&self) -> Vec<(String, Value)> {{");
    let _ = writeln!(out, "        vec![");
    for field in fields {
        let resolved = resolve_field(schema, field);
        let _ = writeln!(out, "            (\"{}\".to_string(), {}),", field.name, resolved.encode);
    }
    let _ = writeln!(out, "        ]");
    let _ = writeln!(out, "    }}\n");

    let _ = writeln!(out, "    pub fn from_value(v: &Value) -> Result<Self, SchemaError> {{");
    let _ = writeln!(out, "        Ok(Self {{");
    for field in fields {
        let resolved = resolve_field(schema, field);
        let _ = writeln!(out, "            {}: {},", field.name, resolved.decode);
    }
    let _ = writeln!(out, "        }})");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");
    out
}

fn render(schema: &Schema) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "//! wsh protocol control message types.");
    let _ = writeln!(out, "//! AUTO-GENERATED from schema/wsh-v1.yaml — do not edit.");
    let _ = writeln!(out, "//! Run: cargo xtask codegen\n");
    let _ = writeln!(out, "use crate::codec::Value;");
    let _ = writeln!(out, "use crate::error::SchemaError;\n");
    let _ = writeln!(out, "/// Protocol version string exchanged in `Hello`/`ServerHello`.");
    let _ = writeln!(out, "pub const PROTOCOL_VERSION: &str = \"{}\";\n", schema.version);

    let _ = writeln!(out, "/// Numeric message type tags, one per control record kind.");
    let _ = writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]");
    let _ = writeln!(out, "#[repr(u8)]");
    let _ = writeln!(out, "pub enum MsgType {{");
    for message in &schema.messages {
        let _ = writeln!(out, "    {} = 0x{:02X},", message.name, message.opcode);
    }
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "impl From<MsgType> for u8 {{");
    let _ = writeln!(out, "    fn from(t: MsgType) -> u8 {{ t as u8 }}");
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "impl TryFrom<u8> for MsgType {{");
    let _ = writeln!(out, "    type Error = SchemaError;");
    let _ = writeln!(out, "    fn try_from(opcode: u8) -> Result<Self, SchemaError> {{");
    let _ = writeln!(out, "        match opcode {{");
    for message in &schema.messages {
        let _ = writeln!(out, "            0x{:02X} => Ok(MsgType::{}),", message.opcode, message.name);
    }
    let _ = writeln!(out, "            other => Err(SchemaError::UnknownOpcode(other)),");
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");

    for (enum_name, def) in &schema.enums {
        let _ = writeln!(out, "#[derive(Debug, Clone, Copy, PartialEq, Eq)]");
        let _ = writeln!(out, "pub enum {enum_name} {{");
        for value in &def.values {
            let _ = writeln!(out, "    {},", pascal_case(value));
        }
        let _ = writeln!(out, "}}\n");

        let _ = writeln!(out, "impl {enum_name} {{");
        let _ = writeln!(out, "    fn as_str(self) -> &'static str {{");
        let _ = writeln!(out, "        match self {{");
        for value in &def.values {
            let _ = writeln!(out, "            {enum_name}::{} => \"{value}\",", pascal_case(value));
        }
        let _ = writeln!(out, "        }}");
        let _ = writeln!(out, "    }}\n");
        let _ = writeln!(out, "    fn parse(s: &str) -> Result<Self, SchemaError> {{");
        let _ = writeln!(out, "        match s {{");
        for value in &def.values {
            let _ = writeln!(out, "            \"{value}\" => Ok({enum_name}::{}),", pascal_case(value));
        }
        let _ = writeln!(
            out,
            "            other => Err(SchemaError::InvalidEnumValue {{ field: \"{enum_name}\", value: other.to_string() }}),"
        );
        let _ = writeln!(out, "        }}");
        let _ = writeln!(out, "    }}");
        let _ = writeln!(out, "}}\n");
    }

    for (struct_name, def) in &schema.structs {
        out.push_str(&render_record(schema, struct_name, &def.fields, true));
    }

    let _ = writeln!(out, "#[derive(Debug, Clone)]");
    let _ = writeln!(out, "pub struct Envelope {{");
    let _ = writeln!(out, "    pub msg_type: MsgType,");
    let _ = writeln!(out, "    pub payload: Payload,");
    let _ = writeln!(out, "}}\n");
    let _ = writeln!(out, "impl Envelope {{");
    let _ = writeln!(out, "    #[must_use]");
    let _ = writeln!(out, "    pub fn to_value(&self) -> Value {{");
    let _ = writeln!(out, "        let mut fields = self.payload.to_value_fields();");
    let _ = writeln!(
        out,
        "        fields.insert(0, (\"type\".to_string(), Value::UInt(u8::from(self.msg_type) as u64)));"
    );
    let _ = writeln!(out, "        Value::Map(fields)");
    let _ = writeln!(out, "    }}\n");
    let _ = writeln!(out, "    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {{");
    let _ = writeln!(out, "        let opcode = fields::u64_(value, \"type\")? as u8;");
    let _ = writeln!(out, "        let msg_type = MsgType::try_from(opcode)?;");
    let _ = writeln!(out, "        let payload = Payload::from_value(msg_type, value)?;");
    let _ = writeln!(out, "        Ok(Self {{ msg_type, payload }})");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");

    let _ = writeln!(out, "#[derive(Debug, Clone)]");
    let _ = writeln!(out, "pub enum Payload {{");
    for message in &schema.messages {
        if message.fields.is_empty() {
            let _ = writeln!(out, "    {},", message.name);
        } else {
            let _ = writeln!(out, "    {}({}Payload),", message.name, message.name);
        }
    }
    let _ = writeln!(out, "}}\n");

    for message in &schema.messages {
        if !message.fields.is_empty() {
            out.push_str(&render_record(schema, &format!("{}Payload", message.name), &message.fields, true));
        }
    }

    let _ = writeln!(out, "impl Payload {{");
    let _ = writeln!(out, "    fn to_value_fields(&self) -> Vec<(String, Value)> {{");
    let _ = writeln!(out, "        match self {{");
    for message in &schema.messages {
        if message.fields.is_empty() {
            let _ = writeln!(out, "            Payload::{} => Vec::new(),", message.name);
        } else {
            let _ = writeln!(out, "            Payload::{}(p) => p.to_fields(),", message.name);
        }
    }
    let _ = writeln!(out, "        }}");
    let _ = writeln!(out, "    }}\n");

    let _ = writeln!(out, "    fn from_value(msg_type: MsgType, v: &Value) -> Result<Self, SchemaError> {{");
    let _ = writeln!(out, "        Ok(match msg_type {{");
    for message in &schema.messages {
        if message.fields.is_empty() {
            let _ = writeln!(out, "            MsgType::{} => Payload::{},", message.name, message.name);
        } else {
            let _ = writeln!(
                out,
                "            MsgType::{} => Payload::{}({}Payload::from_value(v)?),",
                message.name, message.name, message.name
            );
        }
    }
    let _ = writeln!(out, "        }})");
    let _ = writeln!(out, "    }}");
    let _ = writeln!(out, "}}\n");

    out.push_str(FIELDS_MODULE);
    out
}

fn pascal_case(value: &str) -> String {
    value
        .split(['_', '-'])
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

const FIELDS_MODULE: &str = r#"/// Field-extraction helpers shared by every payload's `from_value`.
mod fields {
    use super::{SchemaError, Value};

    pub fn text(m: &Value, key: &'static str) -> Result<String, SchemaError> {
        m.get(key).and_then(Value::as_text).map(str::to_string).ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_text(m: &Value, key: &'static str) -> Option<String> {
        m.get(key).and_then(Value::as_text).map(str::to_string)
    }

    pub fn u64_(m: &Value, key: &'static str) -> Result<u64, SchemaError> {
        m.get(key).and_then(Value::as_uint).ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_u64(m: &Value, key: &'static str) -> Option<u64> {
        m.get(key).and_then(Value::as_uint)
    }

    pub fn u32_(m: &Value, key: &'static str) -> Result<u32, SchemaError> {
        u64_(m, key).map(|v| v as u32)
    }

    pub fn u16_(m: &Value, key: &'static str) -> Result<u16, SchemaError> {
        u64_(m, key).map(|v| v as u16)
    }

    pub fn opt_u32(m: &Value, key: &'static str) -> Option<u32> {
        opt_u64(m, key).map(|v| v as u32)
    }

    pub fn i32_(m: &Value, key: &'static str) -> Result<i32, SchemaError> {
        m.get(key).and_then(Value::as_int).map(|v| v as i32).ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_f64(m: &Value, key: &'static str) -> Option<f64> {
        m.get(key).and_then(Value::as_float)
    }

    pub fn bytes(m: &Value, key: &'static str) -> Result<Vec<u8>, SchemaError> {
        m.get(key).and_then(Value::as_bytes).map(<[u8]>::to_vec).ok_or(SchemaError::MissingField(key))
    }

    pub fn opt_bytes(m: &Value, key: &'static str) -> Option<Vec<u8>> {
        m.get(key).and_then(Value::as_bytes).map(<[u8]>::to_vec)
    }

    pub fn vec_text(m: &Value, key: &'static str) -> Vec<String> {
        m.get(key)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_text).map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn array(m: &Value, key: &'static str) -> &[Value] {
        m.get(key).and_then(Value::as_array).unwrap_or(&[])
    }
}
"#;
