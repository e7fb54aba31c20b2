//! NTLM helper lifecycle and transport.
//!
//! Each negotiation talks to its own helper subprocess through a
//! [`HelperTransport`]. Production code opens a [`ProcessHelper`] through a
//! [`ProcessLauncher`]; tests script a [`FakeHelper`] instead.

pub mod error;
pub mod fake;
pub mod process;
pub mod transport;

pub use error::{HelperError, Result};
pub use fake::{FakeHelper, FakeHelperBuilder, FakeHelperController, ScriptedLauncher};
pub use process::{DEFAULT_HELPER_TIMEOUT, ProcessHelper, ProcessLauncher};
pub use transport::{HelperLauncher, HelperTransport};
