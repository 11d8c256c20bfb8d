//! Command-line interface definitions for the `sessionpool` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `sessionpool` binary.
#[derive(Debug, Parser)]
#[command(
    name = "sessionpool",
    about = "Provision a managed environment, a session pool, and sessions",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create the environment and pool, then generate sessions interactively.
    #[command(
        name = "provision",
        about = "Create the environment and pool, then generate sessions interactively"
    )]
    Provision(ProvisionCommand),
}

/// Arguments for the `sessionpool provision` subcommand.
///
/// Any value left out is prompted for on the terminal.
#[derive(Debug, Default, Parser)]
pub(crate) struct ProvisionCommand {
    /// Subscription that owns the resource group.
    #[arg(long, value_name = "ID")]
    pub(crate) subscription: Option<String>,
    /// Resource group the environment and pool are created in.
    #[arg(long, value_name = "NAME")]
    pub(crate) resource_group: Option<String>,
    /// Name of the managed environment to create or update.
    #[arg(long, value_name = "NAME")]
    pub(crate) environment: Option<String>,
    /// Region for the environment, the pool, and generated sessions.
    #[arg(long, value_name = "REGION")]
    pub(crate) location: Option<String>,
}
