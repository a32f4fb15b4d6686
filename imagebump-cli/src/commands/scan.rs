//! `imagebump scan`: manifests under the checkout and their image references.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use imagebump_core::base_image;
use imagebump_sync::{relative_path, scan_manifests, Manifest};

use super::load_config;

/// Arguments for `imagebump scan`.
#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Local checkout of the manifest repository.
    #[arg(long)]
    pub repo_path: Option<PathBuf>,

    /// Only list manifests referencing this base image.
    #[arg(long)]
    pub image: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ScanEntry {
    path: String,
    images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Tabled)]
struct ScanTableRow {
    #[tabled(rename = "manifest")]
    manifest: String,
    #[tabled(rename = "images")]
    images: String,
}

impl ScanArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(None, self.repo_path)?;
        let root = config.repo_path;

        let paths = scan_manifests(&root)
            .with_context(|| format!("failed to scan {}", root.display()))?;

        let mut entries = Vec::with_capacity(paths.len());
        for path in paths {
            let entry = match std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|text| Manifest::parse(&text).map_err(|e| e.to_string()))
            {
                Ok(manifest) => ScanEntry {
                    path: relative_path(&root, &path),
                    images: manifest.image_references(),
                    error: None,
                },
                Err(error) => ScanEntry {
                    path: relative_path(&root, &path),
                    images: Vec::new(),
                    error: Some(error),
                },
            };
            entries.push(entry);
        }

        if let Some(image) = self.image.as_deref() {
            entries.retain(|e| e.images.iter().any(|r| base_image(r) == image));
        }

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&entries).context("failed to serialize scan JSON")?
            );
            return Ok(());
        }

        print_table(entries);
        Ok(())
    }
}

fn print_table(entries: Vec<ScanEntry>) {
    if entries.is_empty() {
        println!("No manifests found.");
        return;
    }

    let count = entries.len();
    let rows: Vec<ScanTableRow> = entries
        .into_iter()
        .map(|entry| ScanTableRow {
            manifest: entry.path,
            images: match entry.error {
                Some(error) => format!("{} {error}", "unparseable:".red()),
                None if entry.images.is_empty() => "-".bright_black().to_string(),
                None => entry.images.join("\n"),
            },
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    println!("{count} manifests");
}
