//! Minimal NTLMSSP message inspection.
//!
//! Only the signature and message type are read. The helper does the real
//! parsing; this exists so the server can log what a client actually sent.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";
const HEADER_LEN: usize = 12;

/// NTLMSSP message type from bytes 8-11 of a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
	/// Type 1, sent by the client to open a negotiation.
	Negotiate,
	/// Type 2, the server challenge.
	Challenge,
	/// Type 3, the client's response to a challenge.
	Authenticate,
	Other(u32),
}

impl fmt::Display for MessageType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			MessageType::Negotiate => f.write_str("negotiate (type 1)"),
			MessageType::Challenge => f.write_str("challenge (type 2)"),
			MessageType::Authenticate => f.write_str("authenticate (type 3)"),
			MessageType::Other(kind) => write!(f, "unknown (type {kind})"),
		}
	}
}

/// Decodes a base64 token payload and reads its NTLMSSP message type.
///
/// Returns `None` when the payload is not base64 or does not start with the
/// `NTLMSSP\0` signature.
pub fn sniff_message_type(payload: &str) -> Option<MessageType> {
	let bytes = STANDARD.decode(payload.trim()).ok()?;
	if bytes.len() < HEADER_LEN || !bytes.starts_with(SIGNATURE) {
		return None;
	}

	let kind = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
	Some(match kind {
		1 => MessageType::Negotiate,
		2 => MessageType::Challenge,
		3 => MessageType::Authenticate,
		other => MessageType::Other(other),
	})
}
