// src/core/spec.rs

//! Splits a raw spec string into `(name, version)` and classifies it as a
//! direct script, an archive or an installable package.

use crate::constants::SCRIPT_EXTENSION;
use crate::core::catalog::Catalog;
use crate::core::resolver::ResolveError;
use crate::models::{ArtifactSpec, SpecTarget, has_archive_extension};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Bytes read from the head of a file when looking for a script marker.
const MARKER_PROBE_LIMIT: u64 = 256;

lazy_static! {
    // `<?php`, or a shebang whose interpreter is php (`#!/usr/bin/php`, `#!/usr/bin/env php8.3`).
    static ref SCRIPT_MARKER_RE: Regex =
        Regex::new(r"^(?:<\?php\b|#!.*\bphp[0-9.]*(?:\s|$))").unwrap();

    // Composer package names: `vendor/package`, lowercase alphanumerics with `.`, `_` and `-` separators.
    static ref PACKAGE_NAME_RE: Regex = Regex::new(
        r"^[a-z0-9](?:[_.-]?[a-z0-9]+)*/[a-z0-9](?:(?:[_.]|-{1,2})?[a-z0-9]+)*$"
    )
    .unwrap();
}

/// Parses `name[:version]`, splitting on the first `:`.
///
/// # Errors
/// `SpecInvalid` when the string is empty, the name is empty, or the version
/// after a `:` is empty. Names may contain spaces since they can be paths.
pub fn parse(raw: &str) -> Result<ArtifactSpec, ResolveError> {
    let invalid = |reason: &str| ResolveError::SpecInvalid {
        spec: raw.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid("the specification is empty"));
    }

    let (name, version) = match trimmed.split_once(':') {
        Some((name, version)) => (name, Some(version.trim())),
        None => (trimmed, None),
    };

    if name.is_empty() {
        return Err(invalid("a name is required before ':'"));
    }
    if version.is_some_and(str::is_empty) {
        return Err(invalid("a version is required after ':'"));
    }

    Ok(ArtifactSpec {
        raw_name: name.to_string(),
        version: version.map(str::to_string),
    })
}

/// Classifies a parsed spec. First match wins:
///
/// 1. An existing, readable PHP script (by extension or leading marker). The
///    whole raw string is tried before the name portion so that paths which
///    contain `:` still work. Files with the archive extension never qualify.
/// 2. After one hop through the alias table, a name ending in `.phar` is an archive.
/// 3. Anything else is a package name and must look like `vendor/package`.
pub fn classify(raw: &str, spec: &ArtifactSpec, catalog: &Catalog) -> Result<SpecTarget, ResolveError> {
    let candidates = [raw.trim(), spec.raw_name.as_str()];
    for candidate in candidates {
        let path = Path::new(candidate);
        if is_direct_script(path) {
            let canonical = dunce::canonicalize(path).map_err(|source| ResolveError::Io {
                action: "canonicalizing",
                path: path.display().to_string(),
                source,
            })?;
            log::debug!("'{}' is a direct script at '{}'", raw, canonical.display());
            return Ok(SpecTarget::DirectScript { path: canonical });
        }
    }

    let canonical = catalog.aliases().resolve(&spec.raw_name);
    if canonical != spec.raw_name {
        log::debug!("Alias '{}' resolved to '{}'", spec.raw_name, canonical);
    }

    if has_archive_extension(canonical) {
        if let Some(version) = &spec.version
            && !is_safe_label(version)
        {
            return Err(ResolveError::SpecInvalid {
                spec: raw.to_string(),
                reason: format!("'{}' is not a valid version label", version),
            });
        }
        return Ok(SpecTarget::Archive {
            name: canonical.to_string(),
            version: spec.version.clone(),
        });
    }

    let name = canonical.to_ascii_lowercase();
    if !PACKAGE_NAME_RE.is_match(&name) {
        return Err(ResolveError::SpecInvalid {
            spec: raw.to_string(),
            reason: format!(
                "'{}' is not a script, a .phar archive or a 'vendor/package' name",
                spec.raw_name
            ),
        });
    }
    Ok(SpecTarget::Package {
        name,
        version: spec.version.clone(),
    })
}

/// `true` for a readable, non-archive file that is PHP by extension or by its first line.
pub fn is_direct_script(path: &Path) -> bool {
    if !path.is_file() || has_archive_extension(&path.to_string_lossy()) {
        return false;
    }
    let Ok(file) = File::open(path) else {
        return false;
    };
    has_script_extension(path) || starts_with_script_marker(file)
}

/// `true` when `path` should be run through the interpreter rather than exec'd directly.
pub fn is_php_script(path: &Path) -> bool {
    if has_script_extension(path) {
        return true;
    }
    File::open(path).is_ok_and(starts_with_script_marker)
}

fn has_script_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
}

fn starts_with_script_marker(file: File) -> bool {
    let mut first_line = Vec::new();
    let mut reader = BufReader::new(file.take(MARKER_PROBE_LIMIT));
    if reader.read_until(b'\n', &mut first_line).is_err() {
        return false;
    }
    let first_line = String::from_utf8_lossy(&first_line);
    SCRIPT_MARKER_RE.is_match(first_line.trim_end())
}

fn is_safe_label(label: &str) -> bool {
    !label.contains(['/', '\\']) && label != "." && label != ".."
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn catalog() -> Catalog {
        Catalog::builtin()
    }

    fn classify_raw(raw: &str) -> Result<SpecTarget, ResolveError> {
        let spec = parse(raw)?;
        classify(raw, &spec, &catalog())
    }

    #[test]
    fn test_parse_name_and_version() {
        let spec = parse("acme/tool:^2.1").unwrap();
        assert_eq!(spec.raw_name, "acme/tool");
        assert_eq!(spec.version.as_deref(), Some("^2.1"));

        let spec = parse("  phpunit  ").unwrap();
        assert_eq!(spec.raw_name, "phpunit");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let spec = parse("tool.phar:1:2").unwrap();
        assert_eq!(spec.raw_name, "tool.phar");
        assert_eq!(spec.version.as_deref(), Some("1:2"));
    }

    #[test]
    fn test_parse_rejects_malformed_specs() {
        for raw in ["", "   ", ":1.0", "acme/tool:", "acme/tool:  "] {
            let result = parse(raw);
            assert!(
                matches!(result, Err(ResolveError::SpecInvalid { .. })),
                "expected SpecInvalid for {raw:?}"
            );
        }
    }

    #[test]
    fn test_alias_resolves_to_archive() {
        let target = classify_raw("phpunit:10").unwrap();
        assert_eq!(
            target,
            SpecTarget::Archive {
                name: "phpunit.phar".to_string(),
                version: Some("10".to_string())
            }
        );
    }

    #[test]
    fn test_unknown_phar_is_still_an_archive() {
        let target = classify_raw("box.phar").unwrap();
        assert_eq!(
            target,
            SpecTarget::Archive {
                name: "box.phar".to_string(),
                version: None
            }
        );
    }

    #[test]
    fn test_archive_version_cannot_escape_the_cache() {
        let result = classify_raw("phpunit:../../etc");
        assert!(matches!(result, Err(ResolveError::SpecInvalid { .. })));
    }

    #[test]
    fn test_package_names_are_normalized() {
        let target = classify_raw("Acme/Tool:1.0").unwrap();
        assert_eq!(
            target,
            SpecTarget::Package {
                name: "acme/tool".to_string(),
                version: Some("1.0".to_string())
            }
        );
    }

    #[test]
    fn test_invalid_package_names_are_rejected() {
        for raw in ["tool", "../escape", "acme/", "acme/tool/extra", "acme tool", "acme/my tool"] {
            assert!(
                matches!(classify_raw(raw), Err(ResolveError::SpecInvalid { .. })),
                "expected SpecInvalid for {raw:?}"
            );
        }
    }

    #[test]
    fn test_php_extension_makes_a_direct_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("hello.php");
        fs::write(&script, "echo 'hi';").unwrap();
        let raw = format!("{}:9.9", script.display());

        let target = classify_raw(&raw).unwrap();
        let expected = dunce::canonicalize(&script).unwrap();
        assert_eq!(target, SpecTarget::DirectScript { path: expected });
    }

    #[test]
    fn test_script_paths_may_contain_spaces() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("my tools")).unwrap();
        let script = dir.path().join("my tools/hello.php");
        fs::write(&script, "<?php echo 'hi';").unwrap();

        let spec = parse(&script.display().to_string()).unwrap();
        assert_eq!(spec.raw_name, script.display().to_string());
        let target = classify_raw(&script.display().to_string()).unwrap();
        let expected = dunce::canonicalize(&script).unwrap();
        assert_eq!(target, SpecTarget::DirectScript { path: expected });
    }

    #[test]
    fn test_marker_makes_a_direct_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("tool");
        fs::write(&script, "#!/usr/bin/env php\n<?php echo 1;\n").unwrap();
        assert!(is_direct_script(&script));
        assert!(is_php_script(&script));

        let other = dir.path().join("other");
        fs::write(&other, "#!/bin/sh\necho php\n").unwrap();
        assert!(!is_direct_script(&other));
        assert!(!is_php_script(&other));
    }

    #[test]
    fn test_phar_files_are_never_direct_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let phar = dir.path().join("tool.phar");
        fs::write(&phar, "#!/usr/bin/env php\n<?php __HALT_COMPILER();").unwrap();
        assert!(!is_direct_script(&phar));

        let raw = phar.display().to_string();
        let target = classify_raw(&raw).unwrap();
        assert_eq!(target, SpecTarget::Archive { name: raw, version: None });
    }
}
