use std::ops::ControlFlow;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use liftpuck_core::storage::{session_path, SessionStore};
use liftpuck_host::FsStorage;
use liftpuck_icd::MAX_PAGE_LIMIT;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Inspect and repair a puck session directory")]
struct Args {
    /// Directory holding `sessions/`, e.g. a mounted SD card
    #[arg(short, long, default_value = "./puck-data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print one page of the index
    List {
        #[arg(long, default_value_t = 0)]
        cursor: u32,
        #[arg(long, default_value_t = MAX_PAGE_LIMIT as u32)]
        limit: u32,
    },
    /// Regenerate the index from the session files on disk
    Rebuild,
    /// Resolve a session id to its file
    Find { session_id: String },
    /// Delete the index and every session file
    Clear {
        #[arg(long)]
        yes: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let storage = FsStorage::new(&args.data_dir);
    let mut store = SessionStore::new(storage, 0);

    match args.command {
        Command::List { cursor, limit } => {
            let page = store
                .read_index(cursor, limit, |entry, line| {
                    println!("{line:>5}  {:<48} {:>10}  {}", entry.name, entry.size, entry.mtime);
                    ControlFlow::Continue(())
                })
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("reading index")?;
            if page.has_more {
                println!("more: --cursor {}", page.next_cursor);
            }
        }
        Command::Rebuild => {
            let count = store
                .rebuild_index()
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("rebuilding index")?;
            println!("indexed {count} session files");
        }
        Command::Find { session_id } => {
            let found = store
                .find_session(&session_id)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            match found {
                Some(name) => {
                    let path = store.storage().root().join(session_path(&name).trim_start_matches('/'));
                    println!("{}", path.display());
                }
                None => bail!("{session_id} is not in the index"),
            }
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to delete sessions without --yes");
            }
            let removed = store
                .clear_sessions()
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("clearing sessions")?;
            println!("removed {removed} session files");
        }
    }
    Ok(())
}
