//! Fixtures for driving the wsh crates end-to-end in integration tests.

pub mod fake_server;
