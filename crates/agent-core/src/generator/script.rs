//! Script plugins
//!
//! A generated tool is a Python file holding one class. It is never imported
//! into this process: every call starts the interpreter with a fixed harness
//! that loads the file, instantiates the class and calls `run(args)`, with
//! `args` on stdin and the result on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{AgentError, GenerationError, Result};
use crate::generator::source::ToolSource;
use crate::tool::Tool;

const HARNESS: &str = r#"import importlib.util
import sys

spec = importlib.util.spec_from_file_location("generated_tool", sys.argv[1])
module = importlib.util.module_from_spec(spec)
spec.loader.exec_module(module)
tool = getattr(module, sys.argv[2])()
result = tool.run(sys.stdin.read())
sys.stdout.write("" if result is None else str(result))
"#;

const FIND_SPEC: &str =
    "import importlib.util, sys; sys.exit(0 if importlib.util.find_spec(sys.argv[1]) else 1)";

/// Interpreter used to check and run script plugins
#[derive(Clone, Debug)]
pub struct ScriptRuntime {
    interpreter: String,
    timeout: Duration,
}

/// Captured result of one harness invocation
#[derive(Debug)]
pub struct ScriptOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptRuntime {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether `module` could be imported by the interpreter, without importing it
    pub async fn can_import(&self, module: &str) -> bool {
        let status = Command::new(&self.interpreter)
            .arg("-c")
            .arg(FIND_SPEC)
            .arg(module)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(self.timeout, status).await {
            Ok(Ok(status)) => status.success(),
            Ok(Err(e)) => {
                tracing::warn!(interpreter = %self.interpreter, error = %e, "Could not start interpreter");
                false
            }
            Err(_) => false,
        }
    }

    /// Run `class_name.run(args)` from the plugin at `path`.
    ///
    /// Returns `Ok(None)` when the call exceeded the timeout.
    pub async fn execute(
        &self,
        path: &Path,
        class_name: &str,
        args: &str,
    ) -> std::io::Result<Option<ScriptOutput>> {
        let mut child = Command::new(&self.interpreter)
            .arg("-c")
            .arg(HARNESS)
            .arg(path)
            .arg(class_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // stdin is fed while output is collected; both are bounded by the timeout
        let stdin = child.stdin.take();
        let feed = async move {
            if let Some(mut stdin) = stdin {
                if let Err(e) = stdin.write_all(args.as_bytes()).await {
                    tracing::debug!(error = %e, "Plugin closed stdin before reading all input");
                }
            }
        };
        let run = async move { tokio::join!(feed, child.wait_with_output()).1 };

        match tokio::time::timeout(self.timeout, run).await {
            Ok(output) => {
                let output = output?;
                Ok(Some(ScriptOutput {
                    success: output.status.success(),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }))
            }
            Err(_) => Ok(None),
        }
    }
}

/// A generated tool backed by a script plugin file
#[derive(Debug)]
pub struct ScriptTool {
    source: ToolSource,
    path: PathBuf,
    runtime: ScriptRuntime,
}

impl ScriptTool {
    /// Read and validate the plugin at `path`
    pub async fn load(path: &Path, runtime: ScriptRuntime) -> std::result::Result<Self, GenerationError> {
        let code = tokio::fs::read_to_string(path).await?;
        let source = ToolSource::parse(&code)?;
        Ok(Self {
            source,
            path: path.to_path_buf(),
            runtime,
        })
    }

    pub fn class_name(&self) -> &str {
        &self.source.class_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Tool for ScriptTool {
    fn name(&self) -> &str {
        &self.source.name
    }

    fn description(&self) -> &str {
        &self.source.description
    }

    async fn run(&self, args: &str) -> Result<String> {
        tracing::debug!(tool = %self.source.name, path = %self.path.display(), "Running script tool");

        let output = self
            .runtime
            .execute(&self.path, &self.source.class_name, args)
            .await
            .map_err(|e| {
                AgentError::ToolExecution(format!(
                    "could not start '{}' for tool '{}': {e}",
                    self.runtime.interpreter(),
                    self.source.name
                ))
            })?;

        let Some(output) = output else {
            return Ok(format!(
                "Error: tool '{}' timed out after {}s",
                self.source.name,
                self.runtime.timeout().as_secs()
            ));
        };

        if output.success {
            Ok(output.stdout.trim_end().to_string())
        } else {
            // the last traceback line carries the actual exception
            let reason = output
                .stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("unknown error")
                .trim();
            Ok(format!("Error running tool '{}': {reason}", self.source.name))
        }
    }
}
