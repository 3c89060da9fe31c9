//! Invocation of external programs.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::process::{Command, Output, Stdio};

use crate::error::{HarnessError, Result};

/// Program plus the arguments that precede per-call arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    leading_args: Vec<String>,
}

impl ToolCommand {
    /// A bare program.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    /// Builds from `[program, args...]`; `None` if `argv` is empty.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = argv.into_iter().map(Into::into);
        let program = argv.next()?;
        if program.is_empty() {
            return None;
        }
        Some(Self {
            program,
            leading_args: argv.collect(),
        })
    }

    /// Program name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments placed before per-call arguments.
    pub fn leading_args(&self) -> &[String] {
        &self.leading_args
    }

    /// A `Command` with the leading arguments already applied.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.leading_args);
        command
    }

    /// Runs with extra arguments, blocking until the process exits.
    ///
    /// Non-zero exit is an error carrying the trimmed stderr.
    pub fn run<I, A>(&self, args: I) -> Result<Output>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut command = self.command();
        command.args(args);
        run_to_completion(&mut command, &self.program)
    }

    /// Runs with extra arguments, blocking only until the process itself
    /// exits.
    ///
    /// Children it leaves behind may keep running. Stdout is discarded and
    /// stderr goes to an unlinked temp file, so a background daemon holding
    /// them open does not keep the caller waiting.
    pub fn run_until_exit<I, A>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = A>,
        A: AsRef<OsStr>,
    {
        let mut command = self.command();
        command.args(args);
        wait_for_exit(&mut command, &self.program)
    }
}

/// Spawns `command` and waits for its exit status only.
pub(crate) fn wait_for_exit(command: &mut Command, tool: &str) -> Result<()> {
    let mut stderr = tempfile::tempfile()
        .map_err(|e| HarnessError::io(format!("creating stderr capture for {tool}"), e))?;
    let stderr_handle = stderr
        .try_clone()
        .map_err(|e| HarnessError::io(format!("creating stderr capture for {tool}"), e))?;

    tracing::debug!(?command, "running until exit");
    let status = command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(stderr_handle)
        .spawn()
        .and_then(|mut child| child.wait())
        .map_err(|source| HarnessError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(HarnessError::Tool {
            tool: tool.to_string(),
            status,
            stderr: read_capture(&mut stderr),
        })
    }
}

/// Best effort: an unreadable capture yields an empty message.
fn read_capture(file: &mut File) -> String {
    let mut captured = Vec::new();
    if file.seek(SeekFrom::Start(0)).is_ok() && file.read_to_end(&mut captured).is_ok() {
        String::from_utf8_lossy(&captured).trim().to_string()
    } else {
        String::new()
    }
}

/// Runs `command` to completion with stdin closed and output captured.
pub(crate) fn run_to_completion(command: &mut Command, tool: &str) -> Result<Output> {
    tracing::debug!(?command, "running");
    let output = command
        .stdin(Stdio::null())
        .output()
        .map_err(|source| HarnessError::Spawn {
            tool: tool.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(output)
    } else {
        Err(HarnessError::Tool {
            tool: tool.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_from_argv() {
        let tool = ToolCommand::from_argv(["rdiff-backup", "--force"]).unwrap();
        assert_eq!(tool.program(), "rdiff-backup");
        assert_eq!(tool.leading_args(), ["--force".to_string()]);
        assert!(ToolCommand::from_argv(Vec::<String>::new()).is_none());
        assert!(ToolCommand::from_argv([""]).is_none());
    }

    #[test]
    fn test_run_success_captures_stdout() {
        let tool = ToolCommand::from_argv(["sh", "-c"]).unwrap();
        let output = tool.run(["echo hello"]).unwrap();
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "hello");
    }

    #[test]
    fn test_run_failure_reports_stderr() {
        let tool = ToolCommand::from_argv(["sh", "-c"]).unwrap();
        let err = tool.run(["echo broken >&2; exit 3"]).unwrap_err();
        match err {
            HarnessError::Tool { tool, stderr, status } => {
                assert_eq!(tool, "sh");
                assert_eq!(stderr, "broken");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_until_exit_reports_stderr() {
        let tool = ToolCommand::from_argv(["sh", "-c"]).unwrap();
        let err = tool.run_until_exit(["echo no fuse >&2; exit 2"]).unwrap_err();
        match err {
            HarnessError::Tool { stderr, status, .. } => {
                assert_eq!(stderr, "no fuse");
                assert_eq!(status.code(), Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_until_exit_missing_program_is_spawn_error() {
        let tool = ToolCommand::new("/nonexistent/revmount-tool");
        let err = tool.run_until_exit(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let tool = ToolCommand::new("/nonexistent/revmount-tool");
        let err = tool.run(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
        assert!(err.is_tool_failure());
    }
}
