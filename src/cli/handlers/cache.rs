// src/cli/handlers/cache.rs

use crate::cli::handlers::commons::{self, AppContext};
use crate::constants::{ARCHIVES_DIR, STAGING_PREFIX};
use crate::core::cache::CacheStore;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::*;
use dialoguer::{Confirm, theme::ColorfulTheme};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum CacheAction {
    /// Print the cache root.
    Dir,
    /// Show the total and per-entry size.
    Size,
    /// Delete every cached artifact.
    Clear,
}

#[derive(Parser, Debug)]
#[command(no_binary_name = true, about = "Inspects or clears the phpx cache.")]
struct CacheArgs {
    #[arg(value_enum)]
    action: CacheAction,

    /// Skip the confirmation prompt of `clear`.
    #[arg(short, long)]
    yes: bool,
}

/// `phpx cache dir|size|clear [--yes]`
pub fn handle(args: Vec<String>, ctx: &AppContext) -> Result<i32> {
    let cache_args = CacheArgs::try_parse_from(&args)?;
    let store = CacheStore::new(ctx.settings.cache_root.clone());

    match cache_args.action {
        CacheAction::Dir => {
            println!("{}", store.root().display());
            Ok(0)
        }
        CacheAction::Size => show_size(&store),
        CacheAction::Clear => clear(&store, cache_args.yes),
    }
}

fn show_size(store: &CacheStore) -> Result<i32> {
    let root = store.root();
    if !root.exists() {
        println!("{}", format!(t!("cache.dir.missing"), path = root.display()).yellow());
        return Ok(0);
    }

    let sizes = entry_sizes(root)?;
    println!("\n{} {}", t!("cache.size.title").green().bold(), root.display());
    if sizes.is_empty() {
        println!("{}\n", t!("cache.size.empty").dimmed());
        return Ok(0);
    }

    for (entry, size) in &sizes {
        let label = entry
            .strip_prefix(root)
            .unwrap_or(entry)
            .display()
            .to_string();
        println!("  {:>12}  {}", commons::format_size(*size), label.cyan());
    }
    let total: u64 = sizes.iter().map(|(_, size)| size).sum();
    println!(
        "\n{} {}\n",
        t!("cache.size.total").green().bold(),
        commons::format_size(total)
    );
    Ok(0)
}

fn clear(store: &CacheStore, skip_confirmation: bool) -> Result<i32> {
    let root = store.root();
    if !root.exists() {
        println!("{}", format!(t!("cache.dir.missing"), path = root.display()).yellow());
        return Ok(0);
    }

    // 1. Report what is about to go.
    let size = commons::directory_size(root);
    let formatted = commons::format_size(size);
    println!("\n{} {}", t!("cache.clear.about").yellow().bold(), root.display());
    println!("{} {}\n", t!("cache.clear.current_size").yellow().bold(), formatted);

    // 2. Confirm.
    if !skip_confirmation {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(t!("cache.clear.confirm"))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", t!("cache.clear.cancelled"));
            return Ok(0);
        }
    }

    // 3. Remove the contents, keep the root.
    println!("{}", t!("cache.clear.progress"));
    clear_contents(root)?;
    println!("{}", t!("cache.clear.done").green());
    println!("{} {}", t!("cache.clear.freed").green().bold(), formatted);
    Ok(0)
}

/// Cache entries with their sizes: one per archive version, one per installed package.
///
/// Staging directories left behind by an interrupted run are not entries and
/// are skipped; `clear` still removes them.
fn entry_sizes(root: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let mut entries = Vec::new();
    for top in read_sorted(root)?.into_iter().filter(|p| !is_staging(p)) {
        if top.file_name().is_some_and(|name| name == ARCHIVES_DIR) && top.is_dir() {
            for archive in read_sorted(&top)?.into_iter().filter(|p| !is_staging(p)) {
                let versions = read_sorted(&archive).unwrap_or_default();
                entries.extend(versions.into_iter().filter(|p| !is_staging(p)));
            }
        } else {
            entries.push(top);
        }
    }

    let mut sizes: Vec<(PathBuf, u64)> = entries
        .into_par_iter()
        .map(|entry| {
            let size = commons::directory_size(&entry);
            (entry, size)
        })
        .collect();
    sizes.sort();
    Ok(sizes)
}

fn is_staging(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(STAGING_PREFIX))
}

fn read_sorted(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    paths.sort();
    Ok(paths)
}

fn clear_contents(root: &Path) -> Result<()> {
    for path in read_sorted(root)? {
        log::debug!("Removing '{}'", path.display());
        let result = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.with_context(|| format!("Failed to remove '{}'", path.display()))?;
    }
    Ok(())
}
