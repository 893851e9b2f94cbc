//! Library half of the `prompt-alchemy` binary: the process `Config`,
//! the HTTP API server (C9), its metrics, and the CLI surface. Split out
//! from `main.rs` so integration tests can drive the HTTP router
//! directly against an in-memory store, the way the teacher's own
//! `tests/integration_test.rs` exercised its crates' public APIs
//! directly rather than through the binary.

pub mod cli;
pub mod config;
pub mod http;
pub mod metrics;
