use anyhow::Context;
use bonsai::AuthConfig;

use crate::error::Result;

pub fn execute(config: &AuthConfig) -> Result<()> {
	let json = serde_json::to_string_pretty(config).context("failed to serialize config")?;
	println!("{json}");
	Ok(())
}
