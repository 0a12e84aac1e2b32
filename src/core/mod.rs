// src/core/mod.rs

//! # Resolution Engine
//!
//! - **`spec`**: parses and classifies `name[:version]` strings.
//! - **`catalog`**: the known-archive registry and the alias table.
//! - **`cache`**: the on-disk layout and atomic commits.
//! - **`installer`**: drives the external package installer.
//! - **`locator`**: finds the entry point inside a resolved artifact.
//! - **`resolver`**: ties the above together.
//! - **`paths`**: settings derived from the environment.

pub mod cache;
pub mod catalog;
pub mod installer;
pub mod locator;
pub mod paths;
pub mod resolver;
pub mod spec;
