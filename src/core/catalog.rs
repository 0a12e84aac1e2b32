// src/core/catalog.rs

//! # Catalog
//!
//! The Known-Artifact Registry (archive name → version label → URL) and the
//! Alias Table (short name → archive name). Both are immutable once loaded and
//! are handed to the resolver as a value, so tests can inject their own.

use crate::constants::{ARCHIVE_EXTENSION, LATEST_LABEL};
use crate::models::has_archive_extension;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

/// Version label → download URL.
pub type VersionUrls = BTreeMap<String, String>;

const BUILTIN_ARCHIVES: &[(&str, &[(&str, &str)])] = &[
    (
        "composer.phar",
        &[
            ("latest", "https://getcomposer.org/download/latest-stable/composer.phar"),
            ("2", "https://getcomposer.org/download/latest-2.x/composer.phar"),
            ("2.2", "https://getcomposer.org/download/latest-2.2.x/composer.phar"),
            ("1", "https://getcomposer.org/download/latest-1.x/composer.phar"),
        ],
    ),
    (
        "php-cs-fixer.phar",
        &[
            ("latest", "https://cs.symfony.com/download/php-cs-fixer-v3.phar"),
            ("3", "https://cs.symfony.com/download/php-cs-fixer-v3.phar"),
            ("2", "https://cs.symfony.com/download/php-cs-fixer-v2.phar"),
        ],
    ),
    (
        "phpstan.phar",
        &[
            ("latest", "https://github.com/phpstan/phpstan/releases/latest/download/phpstan.phar"),
            ("1", "https://github.com/phpstan/phpstan/releases/download/1.12.12/phpstan.phar"),
        ],
    ),
    (
        "phpunit.phar",
        &[
            ("latest", "https://phar.phpunit.de/phpunit.phar"),
            ("11", "https://phar.phpunit.de/phpunit-11.phar"),
            ("10", "https://phar.phpunit.de/phpunit-10.phar"),
            ("9", "https://phar.phpunit.de/phpunit-9.phar"),
            ("8", "https://phar.phpunit.de/phpunit-8.phar"),
        ],
    ),
    (
        "psalm.phar",
        &[
            ("latest", "https://github.com/vimeo/psalm/releases/latest/download/psalm.phar"),
            ("5", "https://github.com/vimeo/psalm/releases/download/5.26.1/psalm.phar"),
        ],
    ),
];

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("composer", "composer.phar"),
    ("cs-fixer", "php-cs-fixer.phar"),
    ("php-cs-fixer", "php-cs-fixer.phar"),
    ("phpstan", "phpstan.phar"),
    ("phpunit", "phpunit.phar"),
    ("psalm", "psalm.phar"),
];

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read catalog file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Archive '{name}' must end with '.{ext}'.", ext = ARCHIVE_EXTENSION)]
    NotAnArchive { name: String },
    #[error("Archive '{name}' does not define the mandatory '{label}' version.", label = LATEST_LABEL)]
    MissingLatest { name: String },
    #[error("Alias '{alias}' points to '{target}', which is itself an alias.")]
    ChainedAlias { alias: String, target: String },
    #[error("Alias '{alias}' points to unknown archive '{target}'.")]
    UnknownAliasTarget { alias: String, target: String },
}

/// Static mapping of canonical archive name → version label → download URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownArtifactRegistry {
    entries: BTreeMap<String, VersionUrls>,
}

impl KnownArtifactRegistry {
    /// Adds or replaces an archive entry.
    pub fn insert(&mut self, name: impl Into<String>, versions: VersionUrls) {
        self.entries.insert(name.into(), versions);
    }

    /// All version labels of an archive, if it is registered.
    pub fn versions(&self, name: &str) -> Option<&VersionUrls> {
        self.entries.get(name)
    }

    /// `true` if the archive is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over the registered archives in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &VersionUrls)> {
        self.entries.iter()
    }
}

/// Short user-facing names → canonical archive names. Lookups are one hop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
}

impl AliasTable {
    /// Adds or replaces an alias.
    pub fn insert(&mut self, alias: impl Into<String>, target: impl Into<String>) {
        self.aliases.insert(alias.into(), target.into());
    }

    /// Resolves `name` through the table (exact match, one level). Unknown
    /// names are returned unchanged.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// The aliases pointing at `canonical`, in name order.
    pub fn aliases_for(&self, canonical: &str) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == canonical)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Iterates over `(alias, target)` pairs in alias order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.aliases.iter()
    }
}

/// Shape of the optional `catalog.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    archives: BTreeMap<String, VersionUrls>,
    #[serde(default)]
    aliases: BTreeMap<String, String>,
}

/// The validated pair of registry and alias table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    registry: KnownArtifactRegistry,
    aliases: AliasTable,
}

impl Catalog {
    /// Builds a catalog from parts, enforcing its invariants.
    pub fn new(registry: KnownArtifactRegistry, aliases: AliasTable) -> Result<Self, CatalogError> {
        let catalog = Self { registry, aliases };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        let mut registry = KnownArtifactRegistry::default();
        for (name, versions) in BUILTIN_ARCHIVES {
            let urls = versions
                .iter()
                .map(|(label, url)| (label.to_string(), url.to_string()))
                .collect();
            registry.insert(*name, urls);
        }
        let mut aliases = AliasTable::default();
        for (alias, target) in BUILTIN_ALIASES {
            aliases.insert(*alias, *target);
        }
        Self { registry, aliases }
    }

    /// Loads the built-in catalog and merges the user's catalog file over it.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, CatalogError> {
        let builtin = Self::builtin();
        let Some(path) = path else {
            return Ok(builtin);
        };
        match fs::read_to_string(path) {
            Ok(content) => {
                log::debug!("Merging user catalog from '{}'", path.display());
                builtin.merged_with_toml(&content, &path.display().to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(builtin),
            Err(source) => Err(CatalogError::Read {
                path: path.display().to_string(),
                source,
            }),
        }
    }

    /// Returns a new catalog with the entries of a TOML document layered on top.
    pub fn merged_with_toml(&self, content: &str, origin: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(content).map_err(|source| CatalogError::Parse {
            path: origin.to_string(),
            source,
        })?;
        let mut registry = self.registry.clone();
        for (name, versions) in file.archives {
            registry.insert(name, versions);
        }
        let mut aliases = self.aliases.clone();
        for (alias, target) in file.aliases {
            aliases.insert(alias, target);
        }
        Self::new(registry, aliases)
    }

    /// The known-artifact registry.
    pub fn registry(&self) -> &KnownArtifactRegistry {
        &self.registry
    }

    /// The alias table.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    fn validate(&self) -> Result<(), CatalogError> {
        for (name, versions) in self.registry.iter() {
            if !has_archive_extension(name) {
                return Err(CatalogError::NotAnArchive { name: name.clone() });
            }
            if !versions.contains_key(LATEST_LABEL) {
                return Err(CatalogError::MissingLatest { name: name.clone() });
            }
        }
        for (alias, target) in self.aliases.iter() {
            if self.aliases.aliases.contains_key(target) {
                return Err(CatalogError::ChainedAlias {
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
            if !self.registry.contains(target) {
                return Err(CatalogError::UnknownAliasTarget {
                    alias: alias.clone(),
                    target: target.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert!(catalog.validate().is_ok());
        for name in ["phpunit.phar", "php-cs-fixer.phar", "phpstan.phar", "composer.phar"] {
            assert!(catalog.registry().contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_builtin_aliases() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.aliases().resolve("phpunit"), "phpunit.phar");
        assert_eq!(catalog.aliases().resolve("cs-fixer"), "php-cs-fixer.phar");
        assert_eq!(catalog.aliases().resolve("acme/tool"), "acme/tool");
        assert_eq!(
            catalog.aliases().aliases_for("php-cs-fixer.phar"),
            vec!["cs-fixer", "php-cs-fixer"]
        );
    }

    #[test]
    fn test_user_catalog_is_layered_over_builtin() {
        let content = r#"
            [archives."box.phar"]
            latest = "https://example.test/box.phar"
            "4" = "https://example.test/box-4.phar"

            [aliases]
            box = "box.phar"
        "#;
        let catalog = Catalog::builtin().merged_with_toml(content, "test").unwrap();
        assert_eq!(catalog.aliases().resolve("box"), "box.phar");
        let versions = catalog.registry().versions("box.phar").unwrap();
        assert_eq!(versions.get("4").unwrap(), "https://example.test/box-4.phar");
        assert!(catalog.registry().contains("phpunit.phar"));
    }

    #[test]
    fn test_entry_without_latest_is_rejected() {
        let content = r#"
            [archives."box.phar"]
            "4" = "https://example.test/box-4.phar"
        "#;
        let err = Catalog::builtin().merged_with_toml(content, "test").unwrap_err();
        assert!(matches!(err, CatalogError::MissingLatest { .. }));
    }

    #[test]
    fn test_alias_chains_are_rejected() {
        let content = r#"
            [aliases]
            unit = "phpunit"
        "#;
        let err = Catalog::builtin().merged_with_toml(content, "test").unwrap_err();
        assert!(matches!(err, CatalogError::ChainedAlias { .. }));
    }

    #[test]
    fn test_alias_to_unknown_archive_is_rejected() {
        let content = r#"
            [aliases]
            ghost = "ghost.phar"
        "#;
        let err = Catalog::builtin().merged_with_toml(content, "test").unwrap_err();
        assert!(matches!(err, CatalogError::UnknownAliasTarget { .. }));
    }

    #[test]
    fn test_non_archive_names_are_rejected() {
        let content = r#"
            [archives.box]
            latest = "https://example.test/box.phar"
        "#;
        let err = Catalog::builtin().merged_with_toml(content, "test").unwrap_err();
        assert!(matches!(err, CatalogError::NotAnArchive { .. }));
    }

    #[test]
    fn test_missing_catalog_file_falls_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::load(Some(&dir.path().join("catalog.toml"))).unwrap();
        assert_eq!(catalog, Catalog::builtin());
    }
}
