//! Client-facing NTLM tokens as carried in HTTP authentication headers.

/// Authentication scheme name, and the bare token that asks a client to start negotiating.
pub const NTLM_SCHEME: &str = "NTLM";

const NTLM_PREFIX: &str = "NTLM ";

/// Extracts the base64 payload from a client token of the form `NTLM <data>`.
///
/// Returns `None` for tokens shorter than six bytes, tokens without the
/// `NTLM ` prefix (which includes the bare `NTLM` token), and tokens carrying
/// ASCII control characters, which would break helper line framing.
pub fn client_payload(token: &str) -> Option<&str> {
	if token.len() <= NTLM_PREFIX.len() || token.bytes().any(|b| b.is_ascii_control()) {
		return None;
	}
	token.strip_prefix(NTLM_PREFIX)
}

/// Builds the server token that relays a helper challenge to the client.
pub fn challenge_token(data: &str) -> String {
	format!("{NTLM_PREFIX}{data}")
}
