// src/core/paths.rs

use crate::constants::{
    APP_DIR, CATALOG_FILENAME, DEFAULT_COMPOSER, DEFAULT_PHP_BINARY, ENV_CACHE_DIR, ENV_COMPOSER,
    ENV_PHP_BINARY, ENV_XDG_CACHE_HOME,
};
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find the home directory to derive the cache root.")]
    HomeDirNotFound,
    #[error("Could not expand path '{template}': {reason}")]
    Expansion { template: String, reason: String },
    #[error("Could not parse {variable}='{value}' as a command line.")]
    CommandParse {
        variable: &'static str,
        value: String,
    },
}

/// Process-wide settings, derived once from the environment and passed down explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Root of the artifact cache.
    pub cache_root: PathBuf,
    /// Interpreter used for archives and scripts.
    pub php_binary: PathBuf,
    /// Installer command line (program followed by leading arguments).
    pub composer_command: Vec<String>,
    /// Optional user catalog, merged over the built-in one.
    pub catalog_path: Option<PathBuf>,
}

impl Settings {
    /// Reads the settings from the real process environment.
    pub fn from_env() -> Result<Self, PathError> {
        Self::from_lookup(
            |key| env::var(key).ok(),
            dirs::home_dir(),
            get_phpx_config_dir(),
        )
    }

    /// Builds the settings from an arbitrary variable lookup.
    ///
    /// # Arguments
    /// * `lookup` - Returns the value of an environment variable, if set.
    /// * `home_dir` - The user's home directory, used for the default cache root.
    /// * `config_dir` - The phpx config directory, used to locate `catalog.toml`.
    pub fn from_lookup<F>(
        lookup: F,
        home_dir: Option<PathBuf>,
        config_dir: Option<PathBuf>,
    ) -> Result<Self, PathError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // 1. Cache root: explicit override > XDG > platform default under home.
        let cache_root = match non_empty(ENV_CACHE_DIR) {
            Some(template) => expand_path_template(&template)?,
            None => default_cache_root(non_empty(ENV_XDG_CACHE_HOME), home_dir)?,
        };

        // 2. Interpreter.
        let php_binary = non_empty(ENV_PHP_BINARY)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PHP_BINARY));

        // 3. Installer command, split like a shell would.
        let composer_command = match non_empty(ENV_COMPOSER) {
            Some(value) => match shlex::split(&value) {
                Some(parts) if !parts.is_empty() => parts,
                _ => {
                    return Err(PathError::CommandParse {
                        variable: ENV_COMPOSER,
                        value,
                    });
                }
            },
            None => vec![DEFAULT_COMPOSER.to_string()],
        };

        let catalog_path = config_dir.map(|dir| dir.join(CATALOG_FILENAME));

        Ok(Self {
            cache_root,
            php_binary,
            composer_command,
            catalog_path,
        })
    }
}

/// Returns the phpx configuration directory (`~/.config/phpx` on Linux), if the
/// platform has one. It is not created; it only hosts the optional catalog file.
pub fn get_phpx_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR))
}

/// Expands `~` and environment variables in a user-supplied path.
pub fn expand_path_template(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Determines the default cache root when no override is set.
///
/// `$XDG_CACHE_HOME/phpx` wins when set; otherwise `%LOCALAPPDATA%\phpx` on
/// Windows and `~/.cache/phpx` everywhere else.
fn default_cache_root(
    xdg_cache_home: Option<String>,
    home_dir: Option<PathBuf>,
) -> Result<PathBuf, PathError> {
    if let Some(xdg) = xdg_cache_home {
        return Ok(PathBuf::from(xdg).join(APP_DIR));
    }
    if cfg!(target_os = "windows")
        && let Some(local) = dirs::cache_dir()
    {
        return Ok(local.join(APP_DIR));
    }
    let home = home_dir.ok_or(PathError::HomeDirNotFound)?;
    Ok(home.join(".cache").join(APP_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_cache_root_override_wins() {
        let settings = Settings::from_lookup(
            lookup_from(&[("PHPX_CACHE_DIR", "/srv/phpx"), ("XDG_CACHE_HOME", "/xdg")]),
            Some(PathBuf::from("/home/u")),
            None,
        )
        .unwrap();
        assert_eq!(settings.cache_root, PathBuf::from("/srv/phpx"));
    }

    #[cfg(unix)]
    #[test]
    fn test_cache_root_from_xdg_then_home() {
        let xdg = Settings::from_lookup(
            lookup_from(&[("XDG_CACHE_HOME", "/xdg")]),
            Some(PathBuf::from("/home/u")),
            None,
        )
        .unwrap();
        assert_eq!(xdg.cache_root, PathBuf::from("/xdg/phpx"));

        let home =
            Settings::from_lookup(lookup_from(&[]), Some(PathBuf::from("/home/u")), None).unwrap();
        assert_eq!(home.cache_root, PathBuf::from("/home/u/.cache/phpx"));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_home_is_an_error() {
        let result = Settings::from_lookup(lookup_from(&[]), None, None);
        assert!(matches!(result, Err(PathError::HomeDirNotFound)));
    }

    #[test]
    fn test_interpreter_and_installer_defaults() {
        let settings = Settings::from_lookup(
            lookup_from(&[("PHPX_CACHE_DIR", "/c")]),
            None,
            Some(PathBuf::from("/cfg/phpx")),
        )
        .unwrap();
        assert_eq!(settings.php_binary, PathBuf::from("php"));
        assert_eq!(settings.composer_command, vec!["composer".to_string()]);
        assert_eq!(
            settings.catalog_path,
            Some(PathBuf::from("/cfg/phpx").join("catalog.toml"))
        );
    }

    #[test]
    fn test_composer_override_is_split_like_a_shell() {
        let settings = Settings::from_lookup(
            lookup_from(&[
                ("PHPX_CACHE_DIR", "/c"),
                ("PHPX_COMPOSER", "php '/opt/my tools/composer.phar'"),
                ("PHPX_PHP", "/usr/bin/php8.3"),
            ]),
            None,
            None,
        )
        .unwrap();
        assert_eq!(
            settings.composer_command,
            vec!["php".to_string(), "/opt/my tools/composer.phar".to_string()]
        );
        assert_eq!(settings.php_binary, PathBuf::from("/usr/bin/php8.3"));
    }

    #[test]
    fn test_unbalanced_composer_override_is_rejected() {
        let result = Settings::from_lookup(
            lookup_from(&[("PHPX_CACHE_DIR", "/c"), ("PHPX_COMPOSER", "php 'broken")]),
            None,
            None,
        );
        assert!(matches!(result, Err(PathError::CommandParse { .. })));
    }
}
