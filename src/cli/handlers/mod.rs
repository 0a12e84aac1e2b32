// src/cli/handlers/mod.rs

// One module per CLI command. Every handler has the signature
// `fn(Vec<String>, &AppContext) -> anyhow::Result<i32>`.

pub mod cache;
pub mod commons;
pub mod exec;
pub mod list;
pub mod versions;
