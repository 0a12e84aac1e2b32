// src/system/composer.rs

use crate::core::installer::{InstallTool, ToolOutcome};
use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

/// Runs `composer install` non-interactively with its output captured.
#[derive(Debug, Clone)]
pub struct ComposerTool {
    command: Vec<String>,
}

impl ComposerTool {
    /// `command` is the program followed by any leading arguments,
    /// e.g. `["php", "/opt/composer.phar"]`.
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }

    fn build(&self, workspace: &Path) -> io::Result<Command> {
        let (program, leading) = self.command.split_first().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "the composer command is empty")
        })?;
        let mut command = Command::new(program);
        command
            .args(leading)
            .args(["install", "--no-interaction", "--no-progress", "--no-dev"])
            .arg("--working-dir")
            .arg(workspace)
            .current_dir(workspace)
            .stdin(Stdio::null());
        Ok(command)
    }
}

impl InstallTool for ComposerTool {
    fn install(&self, workspace: &Path) -> io::Result<ToolOutcome> {
        let output = self.build(workspace)?.output()?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(ToolOutcome {
            success: output.status.success(),
            output: text,
        })
    }

    fn describe(&self) -> String {
        shlex::try_join(self.command.iter().map(String::as_str))
            .unwrap_or_else(|_| self.command.join(" "))
    }
}
