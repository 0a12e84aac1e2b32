//! # phpx
//!
//! Runs PHP packages, PHAR archives and standalone scripts without installing
//! them globally. A short spec string (`vendor/package:^2.0`, `phpunit:10`,
//! `./tool.php`) is resolved to a cached, ready-to-run artifact which is then
//! launched with the caller's standard streams bridged to the child.
//!
//! - [`core`] turns spec strings into [`models::ResolvedArtifact`]s (parsing,
//!   catalog lookups, the on-disk cache, downloads, package installs and the
//!   entry-point search).
//! - [`system`] talks to the operating system: HTTP downloads, the external
//!   installer, and the execution bridge that runs the artifact.

include!(concat!(env!("OUT_DIR"), "/translations.rs"));

pub mod cli;
pub mod constants;
pub mod core;
pub mod dev_utils;
pub mod models;
pub mod system;
