//! JSON-RPC 2.0 tool server, line-delimited over stdio: protocol
//! envelopes, the tool catalog, request dispatch, and the read loop.

pub mod batch;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;

pub use dispatch::{Dispatcher, DispatcherDeps};
pub use error::{Error, Result};
pub use server::serve_stdio;
