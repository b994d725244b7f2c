//! Built-in node executors.
//!
//! `Text`, `Preview` and `Output` are pure string transforms. `Shell` runs
//! the rendered command through the platform shell. `LLM` and
//! `SearchContext` have no built-in executor; hosts register their own.

use crate::workflow::node::{NodeContext, NodeError, NodeExecutor, NodeOutput, NodeRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Renders the node's template.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextExecutor;

#[async_trait]
impl NodeExecutor for TextExecutor {
    async fn execute(&self, request: &NodeRequest, _: &NodeContext) -> Result<NodeOutput, NodeError> {
        Ok(NodeOutput::new(request.node.content.clone()))
    }
}

/// Passes upstream output through; falls back to the node's content when
/// nothing is connected.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviewExecutor;

#[async_trait]
impl NodeExecutor for PreviewExecutor {
    async fn execute(&self, request: &NodeRequest, _: &NodeContext) -> Result<NodeOutput, NodeError> {
        if request.inputs.is_empty() {
            Ok(NodeOutput::new(request.node.content.clone()))
        } else {
            Ok(NodeOutput::new(request.joined_inputs()))
        }
    }
}

/// Final output: the node's content, else upstream output.
#[derive(Clone, Copy, Debug, Default)]
pub struct OutputExecutor;

#[async_trait]
impl NodeExecutor for OutputExecutor {
    async fn execute(&self, request: &NodeRequest, _: &NodeContext) -> Result<NodeOutput, NodeError> {
        if request.node.content.trim().is_empty() {
            Ok(NodeOutput::new(request.joined_inputs()))
        } else {
            Ok(NodeOutput::new(request.node.content.clone()))
        }
    }
}

/// Configuration for the shell executor.
///
/// Provides configurable shell program, working directory, environment
/// variables and timeout for shell nodes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShellConfig {
    /// Shell program; defaults to `sh -c` (`cmd /C` on Windows)
    pub program: Option<String>,
    /// Optional working directory for command execution
    pub working_dir: Option<PathBuf>,
    /// Environment variables to set for the command
    pub env: HashMap<String, String>,
    /// Optional timeout for command execution
    pub timeout: Option<Duration>,
}

impl ShellConfig {
    /// Creates a default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the shell program. It is invoked as `<program> -c <command>`.
    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    /// Sets the working directory for command execution.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the working directory
    ///
    /// # Returns
    ///
    /// Self for builder pattern chaining
    pub fn working_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(path.into());
        self
    }

    /// Adds an environment variable for the command.
    ///
    /// # Arguments
    ///
    /// * `key` - Environment variable name
    /// * `value` - Environment variable value
    ///
    /// # Returns
    ///
    /// Self for builder pattern chaining
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Sets the timeout for command execution.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    fn command(&self, script: &str) -> tokio::process::Command {
        let mut cmd = match &self.program {
            Some(program) => {
                let mut cmd = tokio::process::Command::new(program);
                cmd.arg("-c");
                cmd
            }
            None if cfg!(windows) => {
                let mut cmd = tokio::process::Command::new("cmd");
                cmd.arg("/C");
                cmd
            }
            None => {
                let mut cmd = tokio::process::Command::new("sh");
                cmd.arg("-c");
                cmd
            }
        };
        cmd.arg(script);
        if let Some(ref working_dir) = self.working_dir {
            cmd.current_dir(working_dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Runs the rendered content as a shell command.
///
/// The result is stdout with trailing whitespace removed. A non-zero exit
/// is an error carrying the exit code and stderr. The child is killed when
/// the dispatch is dropped or the run is cancelled.
#[derive(Clone, Debug, Default)]
pub struct ShellExecutor {
    config: ShellConfig,
}

impl ShellExecutor {
    /// Creates a shell executor.
    pub fn new(config: ShellConfig) -> Self {
        Self { config }
    }

    /// Gets the configuration.
    pub fn config(&self) -> &ShellConfig {
        &self.config
    }
}

#[async_trait]
impl NodeExecutor for ShellExecutor {
    async fn execute(
        &self,
        request: &NodeRequest,
        context: &NodeContext,
    ) -> Result<NodeOutput, NodeError> {
        let script = request.node.content.trim();
        if script.is_empty() {
            return Err(NodeError::ExecutionFailed("Shell command is empty".to_string()));
        }

        let mut cmd = self.config.command(script);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn()?;
        tracing::debug!(node_id = %context.node_id, pid = ?child.id(), "spawned shell command");

        let wait = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                    .await
                    .map_err(|_| {
                        NodeError::Timeout(format!("Command timed out after {:?}", timeout))
                    })?
                    .map_err(NodeError::Io),
                None => child.wait_with_output().await.map_err(NodeError::Io),
            }
        };

        let output = match context.cancellation_token() {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Err(NodeError::Cancelled),
                output = wait => output?,
            },
            None => wait.await?,
        };

        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(NodeOutput::new(stdout.trim_end()))
        } else {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim_end();
            let error_msg = if !stderr.is_empty() {
                format!("exit code: {}, stderr: {}", exit_code, stderr)
            } else {
                format!("exit code: {}", exit_code)
            };
            Err(NodeError::ExecutionFailed(error_msg))
        }
    }
}
