// src/system/executor.rs

use crate::constants::{ENV_PACKAGE_PATH, ENV_VENDOR_DIR};
use crate::core::paths::Settings;
use crate::core::spec::is_php_script;
use crate::models::{ArtifactKind, ResolvedArtifact};
use crate::system::{bridge, readiness};
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Could not start '{program}': {source}")]
    ProcessLaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("Could not determine the current working directory: {0}")]
    WorkingDir(#[source] io::Error),
    #[error("Stream bridge failed while {action}: {source}")]
    Bridge {
        action: &'static str,
        #[source]
        source: io::Error,
    },
}

/// How the child's standard streams are wired.
#[derive(Debug)]
pub enum StdioMode {
    /// The child inherits the caller's streams.
    Inherit,
    /// The child gets pipes; `input` is relayed to its stdin and its output to ours.
    #[cfg(unix)]
    Bridged { input: std::fs::File },
}

impl StdioMode {
    /// Bridged over a dup of fd 0 when stdin has data waiting, inherited otherwise.
    pub fn detect() -> Result<Self, ExecutionError> {
        if !readiness::stdin_has_pending_input() {
            log::debug!("No pending input, passing stdio through");
            return Ok(Self::Inherit);
        }
        log::debug!("Pending input on stdin, using the interactive bridge");
        Self::bridged_stdin()
    }

    #[cfg(unix)]
    fn bridged_stdin() -> Result<Self, ExecutionError> {
        use std::os::fd::AsFd;

        // A dup of fd 0 read as a plain file, bypassing Stdin's internal buffer.
        let stdin_fd = io::stdin()
            .as_fd()
            .try_clone_to_owned()
            .map_err(|source| ExecutionError::Bridge {
                action: "duplicating stdin",
                source,
            })?;
        Ok(Self::Bridged {
            input: std::fs::File::from(stdin_fd),
        })
    }

    #[cfg(not(unix))]
    fn bridged_stdin() -> Result<Self, ExecutionError> {
        Ok(Self::Inherit)
    }
}

/// Everything needed to launch a resolved artifact from the caller's point of view.
#[derive(Debug, Clone)]
pub struct ExecutionEnvironment<'a> {
    artifact: &'a ResolvedArtifact,
    php_binary: PathBuf,
    original_dir: PathBuf,
}

impl<'a> ExecutionEnvironment<'a> {
    /// Captures the caller's current directory; relative arguments will resolve against it.
    pub fn new(artifact: &'a ResolvedArtifact, settings: &Settings) -> Result<Self, ExecutionError> {
        let original_dir = env::current_dir().map_err(ExecutionError::WorkingDir)?;
        Ok(Self {
            artifact,
            php_binary: settings.php_binary.clone(),
            original_dir,
        })
    }

    /// Overrides the directory the child runs in (and that `PWD` reports).
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.original_dir = dir.into();
        self
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    /// Archives and PHP scripts go through the interpreter; anything else is exec'd.
    pub fn needs_interpreter(&self) -> bool {
        match self.artifact.kind() {
            ArtifactKind::Archive => true,
            _ => is_php_script(self.artifact.entry_point()),
        }
    }

    /// `[php, entry, args...]` or `[entry, args...]`.
    pub fn command_line(&self, args: &[String]) -> Vec<OsString> {
        let mut line = Vec::with_capacity(args.len() + 2);
        if self.needs_interpreter() {
            line.push(self.php_binary.clone().into_os_string());
        }
        line.push(self.artifact.entry_point().as_os_str().to_owned());
        line.extend(args.iter().map(OsString::from));
        line
    }

    /// Variables added on top of the inherited environment.
    pub fn environment(&self) -> Vec<(&'static str, OsString)> {
        let mut path_entries = vec![self.artifact.bin_dir()];
        if let Some(existing) = env::var_os("PATH") {
            path_entries.extend(env::split_paths(&existing));
        }
        let path = env::join_paths(path_entries).unwrap_or_else(|e| {
            log::warn!("Could not prepend the artifact's bin dir to PATH: {}", e);
            env::var_os("PATH").unwrap_or_default()
        });

        vec![
            (ENV_PACKAGE_PATH, self.artifact.path().as_os_str().to_owned()),
            (ENV_VENDOR_DIR, self.artifact.vendor_dir().into_os_string()),
            ("PATH", path),
            ("PWD", self.working_dir().as_os_str().to_owned()),
        ]
    }

    /// The fully configured command, not yet started.
    pub fn command(&self, args: &[String]) -> Command {
        let mut line = self.command_line(args).into_iter();
        let program = line
            .next()
            .unwrap_or_else(|| self.artifact.entry_point().as_os_str().to_owned());
        let mut command = Command::new(program);
        command
            .args(line)
            .current_dir(self.working_dir())
            .envs(self.environment());
        command
    }

    /// Launches the artifact and returns the child's exit code.
    ///
    /// Pending data on stdin selects the interactive bridge; otherwise the
    /// child simply inherits the terminal.
    pub fn execute(&self, args: &[String]) -> Result<i32, ExecutionError> {
        self.execute_with(args, StdioMode::detect()?)
    }

    /// Launches the artifact with the given stream wiring.
    pub fn execute_with(&self, args: &[String], mode: StdioMode) -> Result<i32, ExecutionError> {
        let command = self.command(args);
        if log::log_enabled!(log::Level::Debug) {
            let shown: Vec<String> = self
                .command_line(args)
                .iter()
                .map(|part| part.to_string_lossy().into_owned())
                .collect();
            log::debug!("Executable: {}", self.artifact.entry_point().display());
            log::debug!("Arguments: {:?}", args);
            log::debug!("Working directory: {}", self.working_dir().display());
            log::debug!(
                "Command: {}",
                shlex::try_join(shown.iter().map(String::as_str)).unwrap_or_else(|_| shown.join(" "))
            );
        }

        match mode {
            StdioMode::Inherit => bridge::run_passthrough(command),
            #[cfg(unix)]
            StdioMode::Bridged { mut input } => {
                let mut out = io::stdout().lock();
                let mut err = io::stderr().lock();
                bridge::run_interactive(command, &mut input, &mut out, &mut err)
            }
        }
    }

    fn working_dir(&self) -> &Path {
        dunce::simplified(&self.original_dir)
    }
}
