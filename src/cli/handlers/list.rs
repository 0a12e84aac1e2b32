// src/cli/handlers/list.rs

use crate::cli::handlers::commons::AppContext;
use crate::core::catalog::Catalog;
use anyhow::Result;
use colored::*;

/// One printable row of the archive table.
#[derive(Debug, PartialEq, Eq)]
struct ArchiveRow {
    name: String,
    versions: String,
    aliases: String,
}

fn collect_rows(catalog: &Catalog) -> Vec<ArchiveRow> {
    catalog
        .registry()
        .iter()
        .map(|(name, versions)| ArchiveRow {
            name: name.clone(),
            versions: versions.keys().cloned().collect::<Vec<_>>().join(", "),
            aliases: catalog.aliases().aliases_for(name).join(", "),
        })
        .collect()
}

/// `phpx list`: the known archives with their version labels and aliases.
pub fn handle(_args: Vec<String>, ctx: &AppContext) -> Result<i32> {
    let rows = collect_rows(&ctx.catalog);
    let (name_header, versions_header, aliases_header) = (
        t!("list.header.name"),
        t!("list.header.versions"),
        t!("list.header.aliases"),
    );

    // Column widths are measured in chars so accented headers line up too.
    let width = |header: &str, cell: fn(&ArchiveRow) -> &str| {
        rows.iter()
            .map(|row| cell(row).chars().count())
            .chain(std::iter::once(header.chars().count()))
            .max()
            .unwrap_or(0)
    };
    let name_w = width(name_header, |r| r.name.as_str());
    let versions_w = width(versions_header, |r| r.versions.as_str());

    println!("\n{}\n", t!("list.title").green().bold());
    println!(
        "  {:<name_w$}  {:<versions_w$}  {}",
        name_header.bold(),
        versions_header.bold(),
        aliases_header.bold(),
    );
    println!(
        "  {}  {}  {}",
        "-".repeat(name_w),
        "-".repeat(versions_w),
        "-".repeat(aliases_header.chars().count())
    );
    for row in &rows {
        println!(
            "  {:<name_w$}  {:<versions_w$}  {}",
            row.name.cyan(),
            row.versions,
            row.aliases.dimmed(),
        );
    }

    println!("\n{}", t!("list.usage.title").bold());
    println!("{}\n", t!("list.usage.body"));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_the_catalog() {
        let catalog = Catalog::builtin()
            .merged_with_toml(
                "[archives.\"box.phar\"]\nlatest = \"https://example.test/box.phar\"\n4 = \"https://example.test/box-4.phar\"\n",
                "test",
            )
            .unwrap();
        let rows = collect_rows(&catalog);

        let box_row = rows.iter().find(|row| row.name == "box.phar").unwrap();
        assert_eq!(box_row.versions, "4, latest");
        assert_eq!(box_row.aliases, "");

        let fixer = rows.iter().find(|row| row.name == "php-cs-fixer.phar").unwrap();
        assert_eq!(fixer.aliases, "cs-fixer, php-cs-fixer");
    }
}
