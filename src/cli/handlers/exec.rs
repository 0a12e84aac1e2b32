// src/cli/handlers/exec.rs

use crate::cli::handlers::commons::AppContext;
use crate::core::resolver::Resolver;
use crate::system::executor::ExecutionEnvironment;
use anyhow::{Result, anyhow};

/// `phpx exec <spec> [args...]`, also reached by `phpx <spec> [args...]`.
///
/// Returns the child's exit code. Arguments after the spec are passed to the
/// child untouched, so no flag parsing happens here.
pub fn handle(mut args: Vec<String>, ctx: &AppContext) -> Result<i32> {
    if args.is_empty() {
        return Err(anyhow!(t!("exec.error.missing_spec")));
    }
    let spec = args.remove(0);

    // 1. Resolve to a ready-to-run artifact.
    let resolver = Resolver::from_settings(&ctx.settings, ctx.catalog.clone());
    let artifact = resolver.resolve(&spec)?;
    log::debug!(
        "Resolved '{}' to {} '{}' ({})",
        spec,
        artifact.kind(),
        artifact.name(),
        artifact.path().display()
    );

    // 2. Launch it from the caller's directory.
    let environment = ExecutionEnvironment::new(&artifact, &ctx.settings)?;
    let code = environment.execute(&args)?;
    log::debug!("'{}' exited with code {}", spec, code);
    Ok(code)
}
