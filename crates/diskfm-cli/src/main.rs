//! diskfm binary
//!
//! Command-line access to the disks declared in a diskfm config file.
//!
//! ## Usage
//!
//! ```bash
//! diskfm disks
//! diskfm ls media photos --by size --order -1
//! diskfm mkdir media photos/2024
//! diskfm mv media photos/a.jpg archive
//! diskfm --user amy rm media tmp
//! diskfm get media notes.txt --out notes.txt
//! diskfm put media inbox ./report.pdf
//! ```
//!
//! The config path comes from `--config`, then `$DISKFM_CONFIG`, then
//! `diskfm.toml` in the working directory. Logging follows `RUST_LOG`
//! (default `info`) and goes to stderr.

use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use diskfm_kernel::{
    Actor, DiskRegistry, DisksConfig, EntryMetadata, FilesystemGateway, SortOrder,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "diskfm", version, about = "Browse and manage configured disks")]
struct Cli {
    /// Disk configuration file.
    #[arg(long, short, global = true, env = "DISKFM_CONFIG", default_value = "diskfm.toml")]
    config: PathBuf,

    /// Name recorded in the audit log for mutations.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List configured disks.
    Disks,
    /// List a directory.
    Ls {
        disk: String,
        #[arg(default_value = "")]
        path: String,
        /// Sort key: path, size or mimeType.
        #[arg(long, default_value = "path")]
        by: String,
        /// Negative for descending.
        #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
        order: i64,
        /// Only show directories.
        #[arg(long)]
        dirs_only: bool,
    },
    /// Show one entry.
    Info { disk: String, path: String },
    /// Create a directory, including missing parents.
    Mkdir { disk: String, path: String },
    /// Delete a file or directory tree.
    Rm { disk: String, path: String },
    /// Move an entry (into DST if it is a directory).
    Mv { disk: String, src: String, dst: String },
    /// Copy an entry (into DST if it is a directory).
    Cp { disk: String, src: String, dst: String },
    /// Rename an entry within its directory.
    Rename {
        disk: String,
        path: String,
        new_name: String,
    },
    /// Download a file.
    Get {
        disk: String,
        path: String,
        /// Write here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Upload a local file into a directory.
    Put {
        disk: String,
        dir: String,
        local: PathBuf,
        /// Name on the disk (defaults to the local file name).
        #[arg(long)]
        name: Option<String>,
    },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = DisksConfig::load(&cli.config)?;
    let registry = DiskRegistry::from_config(&config);
    let actor = cli.user.clone().map(Actor::User).unwrap_or_default();
    let gateway = |id: &str| -> Result<FilesystemGateway> {
        Ok(registry.gateway(id)?.with_actor(actor.clone()))
    };

    let mut out = io::stdout().lock();
    match cli.command {
        Command::Disks => {
            if cli.json {
                let disks: Vec<_> = registry
                    .iter()
                    .map(|d| {
                        serde_json::json!({
                            "id": d.id(),
                            "label": d.label(),
                            "root": d.root().display().to_string(),
                        })
                    })
                    .collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&disks)?)?;
            } else {
                for disk in &registry {
                    writeln!(out, "{}\t{}\t{}", disk.id(), disk.label(), disk.root().display())?;
                }
            }
        }
        Command::Ls {
            disk,
            path,
            by,
            order,
            dirs_only,
        } => {
            let gw = gateway(&disk)?;
            let order = SortOrder::from_query(Some(&by), Some(order));
            let entries = if dirs_only {
                gw.list_directories(&path, order)?
            } else {
                gw.list_sorted(&path, order)?
            };
            print_entries(&mut out, &entries, cli.json)?;
        }
        Command::Info { disk, path } => {
            let entry = gateway(&disk)?.get_info(&path)?;
            print_entries(&mut out, std::slice::from_ref(&entry), cli.json)?;
        }
        Command::Mkdir { disk, path } => {
            let entry = gateway(&disk)?.create_directory(&path)?;
            print_entries(&mut out, &[entry], cli.json)?;
        }
        Command::Rm { disk, path } => {
            gateway(&disk)?.delete(&path)?;
        }
        Command::Mv { disk, src, dst } => {
            let entry = gateway(&disk)?.move_entry(&src, &dst)?;
            print_entries(&mut out, &[entry], cli.json)?;
        }
        Command::Cp { disk, src, dst } => {
            let entry = gateway(&disk)?.copy(&src, &dst)?;
            print_entries(&mut out, &[entry], cli.json)?;
        }
        Command::Rename {
            disk,
            path,
            new_name,
        } => {
            let entry = gateway(&disk)?.rename(&path, &new_name)?;
            print_entries(&mut out, &[entry], cli.json)?;
        }
        Command::Get {
            disk,
            path,
            out: target,
        } => {
            let (download, mut file) = gateway(&disk)?.open_file(&path)?;
            tracing::debug!(etag = %download.etag, bytes = download.content_length, "downloading");
            match target {
                Some(target) => {
                    let mut dest = File::create(&target)
                        .with_context(|| format!("creating {}", target.display()))?;
                    io::copy(&mut file, &mut dest)?;
                }
                None => {
                    io::copy(&mut file, &mut out)?;
                }
            }
        }
        Command::Put {
            disk,
            dir,
            local,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => local
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("local path has no file name")?,
            };
            let mut file =
                File::open(&local).with_context(|| format!("opening {}", local.display()))?;
            let entry = gateway(&disk)?.upload(&dir, &name, &mut file)?;
            print_entries(&mut out, &[entry], cli.json)?;
        }
    }
    Ok(())
}

fn print_entries(out: &mut impl Write, entries: &[EntryMetadata], json: bool) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(entries)?)?;
        return Ok(());
    }
    for entry in entries {
        writeln!(out, "{}", format_entry(entry))?;
    }
    Ok(())
}

/// One listing line: type flag, size, MIME type, path.
fn format_entry(entry: &EntryMetadata) -> String {
    let flag = if entry.is_directory() { 'd' } else { '-' };
    let size = entry
        .size_bytes
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{flag} {size:>10}  {:<24} {}", entry.mime_type, entry.path())
}
