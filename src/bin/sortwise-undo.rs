// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Sortwise Undo Utility
//!
//! Moves sorted files back to where they were found, newest first.

use clap::Parser;
use std::path::PathBuf;

use sortwise::history::{History, UndoResult};

#[derive(Parser, Debug)]
#[command(name = "sortwise-undo")]
#[command(version)]
#[command(about = "Undo Sortwise file moves")]
struct Args {
    /// Path to history file
    #[arg(short = 'f', long, default_value = "sortwise_history.jsonl")]
    history_file: PathBuf,

    /// Number of moves to undo (default: 1, use 0 for all)
    #[arg(short, long, default_value = "1")]
    count: usize,

    /// Only undo moves into this category
    #[arg(long)]
    category: Option<String>,

    /// Dry run - show what would be undone without doing it
    #[arg(long)]
    dry_run: bool,

    /// List all entries in history
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if !args.history_file.exists() {
        eprintln!("History file not found: {:?}", args.history_file);
        eprintln!("No moves to undo.");
        return Ok(());
    }

    let history = History::new(args.history_file.clone());

    if args.list {
        let entries = history.get_recent(usize::MAX)?;
        println!("Move History ({} entries):", entries.len());
        println!("{:-<80}", "");
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "{:3}. [{}] {} -> {}{}",
                i + 1,
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.original_path.display(),
                entry.new_path.display(),
                if entry.undone { " (undone)" } else { "" }
            );
            println!("     Category: {}", entry.category);
        }
        return Ok(());
    }

    // Most recent first
    let mut entries: Vec<_> = history
        .get_undoable()?
        .into_iter()
        .rev()
        .filter(|e| {
            args.category
                .as_deref()
                .map_or(true, |c| e.category.eq_ignore_ascii_case(c))
        })
        .collect();

    if entries.is_empty() {
        println!("No history entries found.");
        return Ok(());
    }

    if args.count != 0 {
        entries.truncate(args.count);
    }

    println!(
        "{}Undoing {} move(s)...",
        if args.dry_run { "[DRY RUN] " } else { "" },
        entries.len()
    );

    let mut undone = 0;
    let mut skipped = 0;

    for entry in &entries {
        if args.dry_run {
            println!(
                "  Would move: {} -> {}",
                entry.new_path.display(),
                entry.original_path.display()
            );
            continue;
        }

        match history.undo(entry) {
            Ok(UndoResult::Restored) => {
                println!(
                    "  Undone: {} -> {}",
                    entry.new_path.display(),
                    entry.original_path.display()
                );
                undone += 1;
            }
            Ok(UndoResult::Missing) => {
                eprintln!(
                    "  Skip: {} (file not found, may have been moved/deleted)",
                    entry.new_path.display()
                );
                skipped += 1;
            }
            Ok(UndoResult::Occupied) => {
                eprintln!(
                    "  Skip: {} (original path already exists)",
                    entry.original_path.display()
                );
                skipped += 1;
            }
            Err(e) => {
                eprintln!("  Failed: {} ({})", entry.new_path.display(), e);
                skipped += 1;
            }
        }
    }

    println!();
    if args.dry_run {
        println!("Dry run complete. {} move(s) would be undone.", entries.len());
    } else {
        println!("Done. {} undone, {} failed/skipped.", undone, skipped);
    }

    Ok(())
}
