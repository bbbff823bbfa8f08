//! # CLI Interface
//!
//! Defines the command-line argument structure for the `covault` binary
//! using `clap` derive. Three subcommands: `demo`, `check`, and `version`.

use clap::{Parser, Subcommand};

/// Covault console.
///
/// A harness around the covault-core library: runs scripted
/// threshold-approval walkthroughs against an in-memory vault chain and
/// validates address inputs offline.
#[derive(Parser, Debug)]
#[command(
    name = "covault",
    about = "Covault threshold-approval console",
    version,
    propagate_version = true
)]
pub struct CovaultCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the covault binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a scripted multi-owner approval walkthrough on a local
    /// in-memory vault.
    Demo(DemoArgs),
    /// Validate an address-shaped input offline and print its canonical
    /// form.
    Check(CheckArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `demo` subcommand.
#[derive(Parser, Debug)]
pub struct DemoArgs {
    /// Number of owners to create the vault with.
    #[arg(long, env = "COVAULT_DEMO_OWNERS", default_value_t = 3)]
    pub owners: usize,

    /// Approval threshold for the vault. Must be between 1 and the
    /// owner count.
    #[arg(long, short = 't', env = "COVAULT_DEMO_THRESHOLD", default_value_t = 2)]
    pub threshold: usize,

    /// Emit logs as JSON lines instead of pretty-printed text.
    #[arg(long)]
    pub json_logs: bool,
}

/// Arguments for the `check` subcommand.
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// The address input to validate.
    pub address: String,
}
