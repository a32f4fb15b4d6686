//! imagebump: keep container image tags in a GitOps repository current.
//!
//! # Usage
//!
//! ```text
//! imagebump serve [--config FILE] [--repo-path PATH] [--port N]
//! imagebump update <image> <version> [--repo-path PATH] [--server URL] [--json]
//! imagebump scan [--repo-path PATH] [--image NAME] [--json]
//! imagebump diff <image> <version> [--repo-path PATH]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{diff::DiffArgs, scan::ScanArgs, serve::ServeArgs, update::UpdateArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "imagebump",
    version,
    about = "Rewrite container image tags in a git-backed manifest repository",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP update service.
    Serve(ServeArgs),

    /// Pull, retag, commit, and push one image version.
    Update(UpdateArgs),

    /// List manifests and the image references they contain.
    Scan(ScanArgs),

    /// Show unified diff of what an update would write.
    Diff(DiffArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => args.run(),
        Commands::Update(args) => args.run(),
        Commands::Scan(args) => args.run(),
        Commands::Diff(args) => args.run(),
    }
}
