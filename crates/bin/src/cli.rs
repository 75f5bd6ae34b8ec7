//! CLI argument definitions for the Fabler binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Fabler collaborative branching-story engine
#[derive(Parser, Debug)]
#[command(name = "fabler")]
#[command(about = "Fabler: a collaborative engine for branching stories")]
#[command(version)]
pub struct Cli {
    /// Emit machine-readable JSON instead of human-readable text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new story in the store
    Create(CreateArgs),
    /// Show a story outline, or list all stories in the store
    Show(ShowArgs),
    /// Run a scripted multi-session editing demo and print the events
    Demo(DemoArgs),
}

/// Where story state is persisted
#[derive(clap::Args, Debug)]
pub struct StoreArgs {
    /// Path of the JSON store file
    #[arg(short, long, default_value = "fabler.json", env = "FABLER_STORE")]
    pub store: PathBuf,
}

/// Arguments for the create command
#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Story title
    pub title: String,

    /// One-line description of the story
    #[arg(short, long, default_value = "")]
    pub description: String,

    /// User who owns the new story
    #[arg(short, long, default_value = "owner", env = "FABLER_USER")]
    pub owner: String,

    /// Explicit story id (a random one is generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the show command
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Story id to show; lists all stories when omitted
    pub story: Option<String>,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the demo command
#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    /// Milliseconds between automatic session flushes
    #[arg(long, default_value_t = 100)]
    pub flush_interval_ms: u64,
}
