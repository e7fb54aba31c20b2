//! Helper subprocess channel.
//!
//! The helper is spawned with its stdin, stdout, and stderr wired to three
//! pipes. Requests go down stdin, replies come back on stdout, and stderr is
//! drained into the log so a chatty helper never stalls on a full pipe.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use bonsai_protocol::HELPER_PROTOCOL_ARG;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use crate::error::{HelperError, Result};
use crate::transport::{HelperLauncher, HelperTransport};

/// Bound applied to each send and receive when none is configured.
pub const DEFAULT_HELPER_TIMEOUT: Duration = Duration::from_secs(30);

/// One running helper process and its pipes.
///
/// [`close`](HelperTransport::close) only closes the pipes, which lets the
/// helper exit on EOF. Dropping the channel kills a helper that is still
/// running.
pub struct ProcessHelper {
	path: PathBuf,
	child: Child,
	stdin: Option<ChildStdin>,
	stdout: Option<BufReader<ChildStdout>>,
	stderr_drain: Option<JoinHandle<()>>,
	timeout: Duration,
}

impl ProcessHelper {
	/// Spawns the helper at `path` in Squid `ntlmssp` mode.
	///
	/// Must be called from within a Tokio runtime. On any failure the child
	/// and every pipe created so far are dropped before returning.
	pub fn open(path: Option<&Path>, io_timeout: Duration) -> Result<Self> {
		let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
			error!(target = "bonsai.helper", "missing helper application path");
			return Err(HelperError::MissingPath);
		};

		if !is_executable(path) {
			error!(target = "bonsai.helper", path = %path.display(), "permission check failed for helper");
			return Err(HelperError::NotExecutable { path: path.to_path_buf() });
		}

		debug!(target = "bonsai.helper", path = %path.display(), "spawning helper process");
		let mut child = Command::new(path)
			.arg(HELPER_PROTOCOL_ARG)
			.stdin(Stdio::piped())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|source| {
				error!(target = "bonsai.helper", path = %path.display(), error = %source, "failed to spawn helper");
				HelperError::Spawn {
					path: path.to_path_buf(),
					source,
				}
			})?;

		let stdin = child.stdin.take().ok_or(HelperError::PipeUnavailable("stdin"))?;
		let stdout = child.stdout.take().ok_or(HelperError::PipeUnavailable("stdout"))?;
		let stderr = child.stderr.take().ok_or(HelperError::PipeUnavailable("stderr"))?;

		let pid = child.id();
		let stderr_drain = tokio::spawn(async move {
			let mut lines = BufReader::new(stderr).lines();
			while let Ok(Some(line)) = lines.next_line().await {
				debug!(target = "bonsai.helper", ?pid, %line, "helper stderr");
			}
		});

		Ok(Self {
			path: path.to_path_buf(),
			child,
			stdin: Some(stdin),
			stdout: Some(BufReader::new(stdout)),
			stderr_drain: Some(stderr_drain),
			timeout: io_timeout,
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// OS process id, or `None` once the helper has been reaped.
	pub fn pid(&self) -> Option<u32> {
		self.child.id()
	}

	/// Returns `true` while the helper process has not exited.
	pub fn is_running(&mut self) -> bool {
		matches!(self.child.try_wait(), Ok(None))
	}
}

#[async_trait]
impl HelperTransport for ProcessHelper {
	async fn send_line(&mut self, line: &str) -> Result<()> {
		let limit = self.timeout;
		let stdin = self.stdin.as_mut().ok_or(HelperError::Closed)?;

		let mut framed = String::with_capacity(line.len() + 1);
		framed.push_str(line);
		framed.push('\n');

		trace!(target = "bonsai.helper", %line, "sending line to helper");
		let write = async {
			stdin.write_all(framed.as_bytes()).await?;
			stdin.flush().await
		};
		timeout(limit, write).await.map_err(|_| HelperError::Timeout(limit))??;
		Ok(())
	}

	async fn recv_line(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
		let limit = self.timeout;
		let stdout = self.stdout.as_mut().ok_or(HelperError::Closed)?;

		let mut buf = Vec::with_capacity(max_bytes.min(1024));
		let mut bounded = (&mut *stdout).take(max_bytes as u64);
		timeout(limit, bounded.read_until(b'\n', &mut buf))
			.await
			.map_err(|_| HelperError::Timeout(limit))??;

		trace!(target = "bonsai.helper", len = buf.len(), raw = %String::from_utf8_lossy(&buf), "raw data received from helper");
		Ok(buf)
	}

	fn close(&mut self) {
		if self.is_closed() {
			return;
		}
		self.stdin.take();
		self.stdout.take();
		if let Some(drain) = self.stderr_drain.take() {
			drain.abort();
		}
		debug!(target = "bonsai.helper", path = %self.path.display(), pid = ?self.child.id(), "closed helper pipes");
	}

	fn is_closed(&self) -> bool {
		self.stdin.is_none() && self.stdout.is_none() && self.stderr_drain.is_none()
	}
}

impl Drop for ProcessHelper {
	fn drop(&mut self) {
		self.close();
	}
}

/// Launches [`ProcessHelper`]s from a configured path.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
	path: Option<PathBuf>,
	timeout: Duration,
}

impl ProcessLauncher {
	pub fn new(path: Option<PathBuf>, timeout: Duration) -> Self {
		Self { path, timeout }
	}

	pub fn path(&self) -> Option<&Path> {
		self.path.as_deref()
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}
}

#[async_trait]
impl HelperLauncher for ProcessLauncher {
	async fn launch(&self) -> Result<Box<dyn HelperTransport>> {
		let helper = ProcessHelper::open(self.path.as_deref(), self.timeout)?;
		Ok(Box::new(helper))
	}
}

fn is_executable(path: &Path) -> bool {
	let Ok(meta) = std::fs::metadata(path) else {
		return false;
	};
	if !meta.is_file() {
		return false;
	}

	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		meta.permissions().mode() & 0o111 != 0
	}

	#[cfg(not(unix))]
	{
		true
	}
}
