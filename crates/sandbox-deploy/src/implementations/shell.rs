//! Shell-based deployment runner.
//!
//! Runs the command through `sh -c` so callers can pass pipelines and
//! `&&`-chains. Output is echoed line by line as it arrives and captured in
//! full for the outcome.

use crate::{DeployError, DeployerInterface};
use async_trait::async_trait;
use sandbox_types::chain::ENV_MNEMONIC;
use sandbox_types::{DeployEnvironment, DeploymentOutcome};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// Runs deployment commands through a POSIX shell.
#[derive(Debug, Clone)]
pub struct ShellDeployer {
	shell: String,
	echo: bool,
}

impl Default for ShellDeployer {
	fn default() -> Self {
		Self {
			shell: "sh".to_string(),
			echo: true,
		}
	}
}

impl ShellDeployer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Captures child output without echoing it.
	pub fn quiet(mut self) -> Self {
		self.echo = false;
		self
	}
}

/// Copies `reader` into a buffer, forwarding each line to `sink` as soon as
/// it is complete. A broken sink stops echoing but not capturing.
async fn pump<R, W>(reader: R, mut sink: Option<W>) -> std::io::Result<String>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut reader = BufReader::new(reader);
	let mut captured = Vec::new();
	let mut line = Vec::new();

	loop {
		line.clear();
		if reader.read_until(b'\n', &mut line).await? == 0 {
			break;
		}
		if let Some(out) = sink.as_mut() {
			let forwarded = async {
				out.write_all(&line).await?;
				out.flush().await
			}
			.await;
			if let Err(e) = forwarded {
				tracing::debug!(error = %e, "Stopped echoing deploy output");
				sink = None;
			}
		}
		captured.extend_from_slice(&line);
	}

	Ok(String::from_utf8_lossy(&captured).into_owned())
}

#[async_trait]
impl DeployerInterface for ShellDeployer {
	async fn run(
		&self,
		command: &str,
		working_dir: &Path,
		env: &DeployEnvironment,
	) -> Result<DeploymentOutcome, DeployError> {
		let mut cmd = Command::new(&self.shell);
		cmd.arg("-c")
			.arg(command)
			.current_dir(working_dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		// A mnemonic inherited from our own environment must not leak into a
		// sandbox that was created without one.
		if env.mnemonic.is_none() {
			cmd.env_remove(ENV_MNEMONIC);
		}
		for (key, value) in env.vars() {
			cmd.env(key, value);
		}

		let mut child = cmd.spawn().map_err(|e| {
			DeployError::Spawn(format!("{} in {}: {}", command, working_dir.display(), e))
		})?;

		let stdout = child
			.stdout
			.take()
			.ok_or_else(|| DeployError::Io("child stdout not captured".into()))?;
		let stderr = child
			.stderr
			.take()
			.ok_or_else(|| DeployError::Io("child stderr not captured".into()))?;

		let (status, stdout, stderr) = tokio::try_join!(
			child.wait(),
			pump(stdout, self.echo.then(tokio::io::stdout)),
			pump(stderr, self.echo.then(tokio::io::stderr)),
		)
		.map_err(|e| DeployError::Io(e.to_string()))?;

		Ok(DeploymentOutcome {
			exit_code: status.code(),
			stdout,
			stderr,
		})
	}
}
