//! Line-driven negotiation: each stdin line is one client token.

use bonsai::{AuthConfig, AuthOutcome, AuthService, SessionHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::info;

use crate::error::{CliError, Result};

pub async fn execute(config: &AuthConfig, session_id: &str, scope: &str) -> Result<()> {
	let service = AuthService::from_config(config);
	let input = BufReader::new(tokio::io::stdin());
	match run(&service, session_id, scope, input, tokio::io::stdout()).await? {
		Some(principal) => info!(target = "bonsai", session = session_id, scope, %principal, "negotiation finished"),
		None => info!(target = "bonsai", session = session_id, scope, "input ended before authentication"),
	}
	Ok(())
}

/// Runs rounds until authentication or end of input.
///
/// Returns the principal if the session authenticated. The session handle is
/// released on every exit path.
pub async fn run<R, W>(service: &AuthService, session_id: &str, scope: &str, input: R, mut output: W) -> Result<Option<String>>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let session = service.registry().lookup_or_create(session_id)?;
	let result = rounds(service, &session, scope, input, &mut output).await;
	service.registry().release(session);
	result
}

async fn rounds<R, W>(service: &AuthService, session: &SessionHandle, scope: &str, input: R, output: &mut W) -> Result<Option<String>>
where
	R: AsyncBufRead + Unpin,
	W: AsyncWrite + Unpin,
{
	let mut lines = input.lines();
	while let Some(line) = lines.next_line().await.map_err(CliError::Input)? {
		let token = Some(line.trim()).filter(|token| !token.is_empty());

		match service.authenticate(session, scope, token).await? {
			AuthOutcome::Authenticated { principal } => {
				write_line(output, &format!("authenticated {principal}")).await?;
				return Ok(Some(principal));
			}
			AuthOutcome::Continue { token: Some(token) } => write_line(output, &format!("WWW-Authenticate: {token}")).await?,
			AuthOutcome::Continue { token: None } => write_line(output, "WWW-Authenticate: (none)").await?,
		}
	}
	Ok(None)
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> Result<()> {
	let write = async {
		output.write_all(line.as_bytes()).await?;
		output.write_all(b"\n").await?;
		output.flush().await
	};
	write.await.map_err(CliError::Output)
}
