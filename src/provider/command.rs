//! Local command-execution backend
//!
//! Runs a CLI once per call, writes the prompt to its stdin and treats
//! stdout as the response. Useful for agent CLIs and local model runners.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::{non_empty, Provider, DEFAULT_TIMEOUT};
use crate::{Error, Result};

/// Provider that shells out to a local program.
#[derive(Debug, Clone)]
pub struct CommandProvider {
    model_id: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandProvider {
    /// Create a provider for `program`, recorded as `cli/<program>`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        let program = program.into();
        Self {
            model_id: format!("cli/{program}"),
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a command-line argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Override the recorded model ID.
    #[must_use]
    pub fn model_id_override(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, input: String) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Transport(format!("failed to spawn `{}`: {e}", self.program)))?;

        // Feed stdin while stdout drains; a full stdout pipe would stall the child.
        let stdin = child.stdin.take();
        let feed = async move {
            match stdin {
                Some(mut stdin) => {
                    stdin.write_all(input.as_bytes()).await?;
                    stdin.shutdown().await
                }
                None => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output
            .map_err(|e| Error::Transport(format!("`{}` did not complete: {e}", self.program)))?;

        if !output.status.success() {
            return Err(Error::Transport(format!(
                "`{}` exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        // A child may exit successfully without reading all of its input.
        if let Err(e) = fed.or_else(|e| match e.kind() {
            std::io::ErrorKind::BrokenPipe => Ok(()),
            _ => Err(e),
        }) {
            return Err(Error::Transport(format!("failed to write prompt: {e}")));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Provider for CommandProvider {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn send_text(&self, prompt: &str, system_prompt: Option<&str>) -> Result<String> {
        let input = match system_prompt {
            Some(system) => format!("{system}\n\n{prompt}"),
            None => prompt.to_string(),
        };
        let output = tokio::time::timeout(self.timeout, self.run(input))
            .await
            .map_err(|_| {
                Error::Transport(format!("`{}` timed out after {:?}", self.program, self.timeout))
            })??;
        non_empty(output.trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cat_echoes_prompt() {
        let provider = CommandProvider::new("cat");
        let text = provider.send_text("36 months", Some("judge")).await.unwrap();
        assert_eq!(text, "judge\n\n36 months");
        assert_eq!(provider.model_id(), "cli/cat");
    }

    #[tokio::test]
    async fn test_large_prompt_round_trips_through_pipe() {
        let provider = CommandProvider::new("cat").timeout(Duration::from_secs(10));
        let prompt = "x".repeat(256 * 1024);
        let text = provider.send_text(&prompt, None).await.unwrap();
        assert_eq!(text.len(), prompt.len());
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_transport_error() {
        let provider = CommandProvider::new("false");
        let err = provider.send_text("x", None).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_missing_program_is_transport_error() {
        let provider = CommandProvider::new("definitely-not-a-real-binary-anchorlab");
        assert!(matches!(
            provider.send_text("x", None).await,
            Err(Error::Transport(_))
        ));
    }
}
