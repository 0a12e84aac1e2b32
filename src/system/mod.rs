//! # System Interaction Layer
//!
//! This module provides abstractions for interacting with the underlying operating system.
//! It serves as a boundary between the resolution engine and the specifics of
//! networking, external tools and process management.
//!
//! ## Modules
//!
//! - **`downloader`**: fetches a single URL into a file (the `Fetcher` seam).
//! - **`composer`**: runs the composer CLI against a disposable workspace (the `InstallTool` seam).
//! - **`readiness`**: zero-timeout `poll(2)` probes used to pick the execution mode.
//! - **`bridge`**: spawns the child and relays stdin/stdout/stderr, either inherited
//!   or through the interactive polling loop.
//! - **`executor`**: builds the command line and environment of a resolved artifact
//!   and hands it to the bridge.

pub mod bridge;
pub mod composer;
pub mod downloader;
pub mod executor;
pub mod readiness;
