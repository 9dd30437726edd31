//! Running external programs
//!
//! Every external tool the pipeline touches goes through [`CommandRunner`],
//! so the pipeline can be driven by a fake in tests.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::process::{Command, ExitStatus, Stdio};
use crate::error::{Error, Result};

/// A program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl Invocation {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Program name for messages
    pub fn tool_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// True if any argument equals `flag`
    pub fn has_arg(&self, flag: &str) -> bool {
        self.args.iter().any(|a| a == flag)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            let arg = arg.to_string_lossy();
            if arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitState {
    pub success: bool,
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
}

impl ExitState {
    pub fn ok() -> Self {
        Self { success: true, code: Some(0) }
    }

    pub fn failed(code: i32) -> Self {
        Self { success: false, code: Some(code) }
    }
}

impl From<ExitStatus> for ExitState {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Exit state plus everything the child wrote to stdout and stderr
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub state: ExitState,
    pub text: String,
}

/// Capability to run external programs
pub trait CommandRunner {
    /// Run with stdin/stdout/stderr inherited and wait for exit
    fn status(&mut self, invocation: &Invocation) -> std::io::Result<ExitState>;

    /// Run with stdout and stderr captured into one string
    fn output(&mut self, invocation: &Invocation) -> std::io::Result<CapturedOutput>;
}

/// Runs programs on the host with `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn status(&mut self, invocation: &Invocation) -> std::io::Result<ExitState> {
        let status = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.into())
    }

    fn output(&mut self, invocation: &Invocation) -> std::io::Result<CapturedOutput> {
        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CapturedOutput {
            state: output.status.into(),
            text,
        })
    }
}

/// Run a tool with inherited streams; launch failures and non-zero exits are errors
pub fn run_checked<R: CommandRunner + ?Sized>(runner: &mut R, invocation: &Invocation) -> Result<()> {
    log::debug!("running: {}", invocation);

    let state = runner.status(invocation).map_err(|source| Error::ToolLaunch {
        tool: invocation.tool_name(),
        source,
    })?;

    if state.success {
        Ok(())
    } else {
        Err(Error::ToolFailed {
            tool: invocation.tool_name(),
            status: state.code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted(ExitState);

    impl CommandRunner for Scripted {
        fn status(&mut self, _invocation: &Invocation) -> std::io::Result<ExitState> {
            Ok(self.0)
        }

        fn output(&mut self, _invocation: &Invocation) -> std::io::Result<CapturedOutput> {
            Ok(CapturedOutput { state: self.0, text: String::new() })
        }
    }

    #[test]
    fn test_display_quotes_arguments_with_spaces() {
        let invocation = Invocation::new("gimp").arg("/tmp/my scan.png").arg("-n");
        assert_eq!(invocation.to_string(), "gimp '/tmp/my scan.png' -n");
    }

    #[test]
    fn test_has_arg() {
        let invocation = Invocation::new("pdftoppm").args(["-f", "3", "-singlefile"]);
        assert!(invocation.has_arg("-singlefile"));
        assert!(!invocation.has_arg("-l"));
    }

    #[test]
    fn test_run_checked_reports_exit_code() {
        let mut runner = Scripted(ExitState::failed(2));
        let err = run_checked(&mut runner, &Invocation::new("gimp")).unwrap_err();
        assert!(matches!(err, Error::ToolFailed { status: Some(2), .. }));
    }

    #[test]
    fn test_run_checked_success() {
        let mut runner = Scripted(ExitState::ok());
        assert!(run_checked(&mut runner, &Invocation::new("gimp")).is_ok());
    }
}
