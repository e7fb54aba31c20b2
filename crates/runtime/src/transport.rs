//! Line transport seam between the negotiation engine and a helper.

use async_trait::async_trait;

use crate::error::Result;

/// Line-oriented conversation with one helper instance.
///
/// A transport serves exactly one negotiation at a time and does no locking
/// of its own.
#[async_trait]
pub trait HelperTransport: Send {
	/// Writes `line` followed by a newline.
	async fn send_line(&mut self, line: &str) -> Result<()>;

	/// Reads at most `max_bytes` of reply, up to and including the first newline.
	///
	/// The bytes are returned raw. A short read or an empty buffer at EOF is
	/// not an error here; framing is checked by the caller.
	async fn recv_line(&mut self, max_bytes: usize) -> Result<Vec<u8>>;

	/// Closes every pipe to the helper. Calling this twice is a no-op.
	fn close(&mut self);

	fn is_closed(&self) -> bool;
}

/// Opens fresh helper channels for new negotiations.
#[async_trait]
pub trait HelperLauncher: Send + Sync {
	async fn launch(&self) -> Result<Box<dyn HelperTransport>>;
}
