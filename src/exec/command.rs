// src/exec/command.rs

//! Subprocess execution with output redirected into a [`LogStream`].

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{ComposeWatchError, Result};
use crate::project::LogStream;

/// A program invocation: what a build backend hands back to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCommand {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl BuildCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Run `script` through the platform shell.
    pub fn shell(script: impl Into<String>) -> Self {
        if cfg!(windows) {
            Self::new("cmd").arg("/C").arg(script)
        } else {
            Self::new("sh").arg("-c").arg(script)
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    fn to_tokio(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).kill_on_drop(true);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for BuildCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Where a child's stdout/stderr go.
#[derive(Debug, Clone, Default)]
pub enum OutputTarget {
    /// Share the orchestrator's own stdout/stderr.
    #[default]
    Inherit,
    Discard,
    Stream(Arc<LogStream>),
}

impl From<Option<Arc<LogStream>>> for OutputTarget {
    fn from(stream: Option<Arc<LogStream>>) -> Self {
        match stream {
            Some(stream) => OutputTarget::Stream(stream),
            None => OutputTarget::Inherit,
        }
    }
}

/// Run `command` to completion.
///
/// Succeeds on exit code 0; any other exit (including death by signal,
/// reported as `-1`) yields [`ComposeWatchError::CommandFailed`].
pub async fn execute(command: &BuildCommand, output: &OutputTarget) -> Result<()> {
    info!(cmd = %command, cwd = ?command.cwd, "executing command");

    let mut cmd = command.to_tokio();
    match output {
        OutputTarget::Inherit => {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputTarget::Discard => {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }
        OutputTarget::Stream(_) => {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning `{}`", command.program))?;

    let mut pumps = Vec::new();
    if let OutputTarget::Stream(stream) = output {
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, Arc::clone(stream))));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, Arc::clone(stream))));
        }
    }

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{}`", command.program))?;

    // Let the pumps drain whatever the child wrote before exiting.
    for handle in pumps {
        let _ = handle.await;
    }

    let code = status.code().unwrap_or(-1);
    debug!(cmd = %command, exit_code = code, success = status.success(), "command exited");

    if status.success() {
        Ok(())
    } else {
        Err(ComposeWatchError::CommandFailed {
            program: command.program.clone(),
            code,
        })
    }
}

/// Run `command` and capture its stdout, without failing on exit status.
///
/// Returns `None` if the program could not be started.
pub async fn capture(command: &BuildCommand) -> Option<std::process::Output> {
    match command.to_tokio().output().await {
        Ok(output) => Some(output),
        Err(err) => {
            debug!(cmd = %command, error = %err, "failed to run command");
            None
        }
    }
}

async fn pump<R>(mut reader: R, stream: Arc<LogStream>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => stream.write(&buf[..n]).await,
        }
    }
}
