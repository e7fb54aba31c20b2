//! Scripted in-memory helper for testing negotiations without subprocesses.
//!
//! # Example
//!
//! ```ignore
//! let (mut helper, controller) = FakeHelperBuilder::new().build();
//! controller.push_reply("TT SGVsbG8=\n");
//!
//! helper.send_line("YR TlRMTVNTUAAB").await?;
//! assert_eq!(helper.recv_line(1023).await?, b"TT SGVsbG8=\n");
//! assert_eq!(controller.take_sent(), vec!["YR TlRMTVNTUAAB"]);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{HelperError, Result};
use crate::transport::{HelperLauncher, HelperTransport};

enum Scripted {
	Reply(Vec<u8>),
	Timeout,
}

#[derive(Default)]
struct FakeState {
	replies: VecDeque<Scripted>,
	sent: Vec<String>,
	closed: bool,
}

/// Builder for creating fake helper instances.
#[derive(Default)]
pub struct FakeHelperBuilder {
	replies: Vec<Vec<u8>>,
}

impl FakeHelperBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Queues a raw reply before the helper is built.
	pub fn reply(mut self, raw: impl Into<Vec<u8>>) -> Self {
		self.replies.push(raw.into());
		self
	}

	/// Builds the helper and the controller that scripts it.
	pub fn build(self) -> (FakeHelper, FakeHelperController) {
		let state = FakeState {
			replies: self.replies.into_iter().map(Scripted::Reply).collect(),
			..FakeState::default()
		};
		let state = Arc::new(Mutex::new(state));

		(
			FakeHelper {
				state: Arc::clone(&state),
			},
			FakeHelperController { state },
		)
	}
}

/// Handle for queuing replies and inspecting what the engine sent.
#[derive(Clone)]
pub struct FakeHelperController {
	state: Arc<Mutex<FakeState>>,
}

impl FakeHelperController {
	/// Queues raw bytes for the next `recv_line`.
	pub fn push_reply(&self, raw: impl Into<Vec<u8>>) {
		self.state.lock().replies.push_back(Scripted::Reply(raw.into()));
	}

	/// Makes the next `recv_line` fail as if the helper stalled.
	pub fn push_timeout(&self) {
		self.state.lock().replies.push_back(Scripted::Timeout);
	}

	/// Takes all sent lines, clearing the buffer.
	pub fn take_sent(&self) -> Vec<String> {
		std::mem::take(&mut self.state.lock().sent)
	}

	pub fn pending_replies(&self) -> usize {
		self.state.lock().replies.len()
	}

	pub fn is_closed(&self) -> bool {
		self.state.lock().closed
	}
}

/// In-memory [`HelperTransport`] driven by a [`FakeHelperController`].
///
/// With no reply queued, `recv_line` behaves like a helper at EOF and returns
/// an empty buffer.
pub struct FakeHelper {
	state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl HelperTransport for FakeHelper {
	async fn send_line(&mut self, line: &str) -> Result<()> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(HelperError::Closed);
		}
		state.sent.push(line.to_string());
		Ok(())
	}

	async fn recv_line(&mut self, max_bytes: usize) -> Result<Vec<u8>> {
		let mut state = self.state.lock();
		if state.closed {
			return Err(HelperError::Closed);
		}
		match state.replies.pop_front() {
			Some(Scripted::Reply(mut raw)) => {
				raw.truncate(max_bytes);
				Ok(raw)
			}
			Some(Scripted::Timeout) => Err(HelperError::Timeout(Duration::ZERO)),
			None => Ok(Vec::new()),
		}
	}

	fn close(&mut self) {
		self.state.lock().closed = true;
	}

	fn is_closed(&self) -> bool {
		self.state.lock().closed
	}
}

/// Launcher that hands out prepared fake helpers in order.
///
/// Once the queue is empty every launch fails with [`HelperError::MissingPath`].
#[derive(Default)]
pub struct ScriptedLauncher {
	helpers: Mutex<VecDeque<FakeHelper>>,
	launches: AtomicUsize,
}

impl ScriptedLauncher {
	pub fn new(helpers: impl IntoIterator<Item = FakeHelper>) -> Self {
		Self {
			helpers: Mutex::new(helpers.into_iter().collect()),
			launches: AtomicUsize::new(0),
		}
	}

	/// Number of launch attempts, including failed ones.
	pub fn launches(&self) -> usize {
		self.launches.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl HelperLauncher for ScriptedLauncher {
	async fn launch(&self) -> Result<Box<dyn HelperTransport>> {
		self.launches.fetch_add(1, Ordering::SeqCst);
		let helper = self.helpers.lock().pop_front().ok_or(HelperError::MissingPath)?;
		Ok(Box::new(helper))
	}
}
