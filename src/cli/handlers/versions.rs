// src/cli/handlers/versions.rs

use crate::cli::handlers::commons::AppContext;
use crate::core::cache::CacheStore;
use anyhow::Result;
use colored::*;

/// `phpx versions`: how `name:version` works, and which labels each archive has.
pub fn handle(_args: Vec<String>, ctx: &AppContext) -> Result<i32> {
    println!("\n{}\n", t!("versions.title").green().bold());
    println!("{}", t!("versions.intro"));
    println!("{}\n", t!("versions.syntax").cyan());

    println!("{}", t!("versions.examples.title").green().bold());
    println!("{}\n", t!("versions.examples.body"));

    println!("{}\n", t!("versions.available").green().bold());
    for (name, versions) in ctx.catalog.registry().iter() {
        println!("  {}", name.yellow());
        for label in versions.keys() {
            println!("    - {}", label);
        }
        println!();
    }

    let layout = CacheStore::new(ctx.settings.cache_root.clone())
        .archives_root()
        .join("<phar-name>")
        .join("<version>");
    println!("{}", t!("versions.cache_layout"));
    println!("  {}\n", layout.display().to_string().dimmed());
    Ok(0)
}
