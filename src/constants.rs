// src/constants.rs

//! Names shared by the resolution engine and the execution bridge.

/// Name of the phpx directory inside the user's cache and config directories.
pub const APP_DIR: &str = "phpx";

/// Subdirectory of the cache root holding downloaded or copied PHAR archives.
pub const ARCHIVES_DIR: &str = "archives";

/// File extension (lowercase, without the dot) that marks an archive artifact.
pub const ARCHIVE_EXTENSION: &str = "phar";

/// File extension (lowercase, without the dot) of standalone PHP scripts.
pub const SCRIPT_EXTENSION: &str = "php";

/// Version label used for archives when the spec carries no version.
pub const LATEST_LABEL: &str = "latest";

/// Version label used in cache keys of packages when the spec carries no version.
pub const DEFAULT_LABEL: &str = "default";

/// Dependency directory of an installed package (mirrors the installer's output).
pub const VENDOR_DIR: &str = "vendor";

/// Conventional binary directory, relative to the dependency directory.
pub const VENDOR_BIN_DIR: &str = "bin";

/// Package manifest read by the executable locator and written for the installer.
pub const MANIFEST_FILENAME: &str = "composer.json";

/// Optional user catalog (extra archives and aliases), inside the config directory.
pub const CATALOG_FILENAME: &str = "catalog.toml";

/// Prefix of staging directories. Anything starting with it is never a committed entry.
pub const STAGING_PREFIX: &str = ".staging-";

/// Exit code for failures that never produced a child process.
pub const FAILURE_EXIT_CODE: i32 = 1;

// --- Environment variables consumed ---

/// Overrides the cache root. `~` and `$VARS` are expanded.
pub const ENV_CACHE_DIR: &str = "PHPX_CACHE_DIR";
/// Overrides the PHP interpreter used for archives and scripts.
pub const ENV_PHP_BINARY: &str = "PHPX_PHP";
/// Overrides the installer command (split shell-style, e.g. `php /opt/composer.phar`).
pub const ENV_COMPOSER: &str = "PHPX_COMPOSER";
/// Base directory for user caches on XDG systems.
pub const ENV_XDG_CACHE_HOME: &str = "XDG_CACHE_HOME";

// --- Environment variables produced for the child ---

/// Points at the resolved artifact directory.
pub const ENV_PACKAGE_PATH: &str = "PHPX_PACKAGE_PATH";
/// Points at the artifact's dependency directory.
pub const ENV_VENDOR_DIR: &str = "COMPOSER_VENDOR_DIR";

/// Default interpreter binary, looked up on `PATH`.
pub const DEFAULT_PHP_BINARY: &str = "php";
/// Default installer binary, looked up on `PATH`.
pub const DEFAULT_COMPOSER: &str = "composer";
