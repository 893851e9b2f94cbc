//! CLI surface for the `prompt-alchemy` binary. CLI parsing itself is an
//! external-collaborator concern per §1; this is deliberately thin —
//! just enough to pick a transport and, for `learn`, trigger the
//! offline job a cron/launchd wrapper would otherwise call (§4.7).
//! Grounded on the teacher's `Cli`/`Commands` shape (`clap::Parser` +
//! `Subcommand`) in `src/cli/mod.rs`.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "prompt-alchemy")]
#[command(about = "Three-phase AI prompt generation, storage, and ranking")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Default)]
pub enum Command {
    /// Run the JSON-RPC tool server and the HTTP API server concurrently
    /// (the default when no subcommand is given).
    #[default]
    Serve,
    /// Run only the line-delimited JSON-RPC tool server over stdio (C8).
    Rpc,
    /// Run only the HTTP REST API server (C9).
    Http,
    /// Run one pass of the nightly pairwise-learning job (C7) and exit.
    Learn,
}
