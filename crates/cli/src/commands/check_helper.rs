use bonsai::AuthConfig;
use bonsai_runtime::{HelperTransport, ProcessHelper};
use tracing::info;

use crate::error::Result;

pub async fn execute(config: &AuthConfig) -> Result<()> {
	let mut helper = ProcessHelper::open(config.ntlm_helper.as_deref(), config.helper_timeout())?;
	let pid = helper.pid();
	info!(target = "bonsai", path = %helper.path().display(), ?pid, "helper started");

	helper.close();
	match pid {
		Some(pid) => println!("helper ok: {} (pid {pid})", helper.path().display()),
		None => println!("helper ok: {}", helper.path().display()),
	}
	Ok(())
}
