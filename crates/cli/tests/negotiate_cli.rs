#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;

const TYPE1: &str = "NTLM TlRMTVNTUAABAAAAB4IIogAAAAAAAAAAAAAAAAAAAAAGAbEdAAAADw==";

fn helper_fixture() -> PathBuf {
	let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
		.join("..")
		.join("runtime")
		.join("tests")
		.join("fixtures")
		.join("ntlm_helper.sh");
	std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("fixture should be chmod-able");
	path
}

fn write_config(dir: &Path, helper: Option<&Path>) -> PathBuf {
	let path = dir.join("auth.json");
	let config = match helper {
		Some(helper) => serde_json::json!({ "ntlmHelper": helper, "helperTimeoutMs": 5000, "maxSessions": 4 }),
		None => serde_json::json!({ "maxSessions": 4 }),
	};
	std::fs::write(&path, config.to_string()).expect("config should be written");
	path
}

fn run_cli(args: &[&str], stdin: &str) -> (bool, String, String) {
	let mut child = Command::new(env!("CARGO_BIN_EXE_bonsai-auth"))
		.args(args)
		.env_remove("RUST_LOG")
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.spawn()
		.expect("failed to execute bonsai-auth");

	child
		.stdin
		.take()
		.expect("stdin should be piped")
		.write_all(stdin.as_bytes())
		.expect("stdin should accept input");
	let output = child.wait_with_output().expect("bonsai-auth should exit");

	let stdout = String::from_utf8_lossy(&output.stdout).to_string();
	let stderr = String::from_utf8_lossy(&output.stderr).to_string();
	(output.status.success(), stdout, stderr)
}

#[test]
fn negotiate_runs_full_handshake() {
	let dir = TempDir::new().unwrap();
	let config = write_config(dir.path(), Some(&helper_fixture()));
	let config = config.to_str().unwrap();

	let input = format!("\n{TYPE1}\nNTLM SGVsbG8=\n");
	let (success, stdout, stderr) = run_cli(&["-c", config, "negotiate", "--session", "abc", "--scope", "tfs"], &input);

	assert!(success, "stderr: {stderr}");
	assert_eq!(
		stdout.lines().collect::<Vec<_>>(),
		vec!["WWW-Authenticate: NTLM", "WWW-Authenticate: NTLM SGVsbG8=", "authenticated alice"]
	);
}

#[test]
fn negotiate_reports_denied_round() {
	let dir = TempDir::new().unwrap();
	let config = write_config(dir.path(), Some(&helper_fixture()));
	let config = config.to_str().unwrap();

	let input = format!("\n{TYPE1}\nNTLM d3Jvbmc=\n\n");
	let (success, stdout, _stderr) = run_cli(&["-c", config, "negotiate", "--session", "abc"], &input);

	assert!(success);
	assert_eq!(
		stdout.lines().collect::<Vec<_>>(),
		vec![
			"WWW-Authenticate: NTLM",
			"WWW-Authenticate: NTLM SGVsbG8=",
			"WWW-Authenticate: (none)",
			"WWW-Authenticate: NTLM"
		]
	);
}

#[test]
fn check_helper_succeeds_with_fixture() {
	let dir = TempDir::new().unwrap();
	let config = write_config(dir.path(), Some(&helper_fixture()));

	let (success, stdout, stderr) = run_cli(&["-c", config.to_str().unwrap(), "check-helper"], "");
	assert!(success, "stderr: {stderr}");
	assert!(stdout.starts_with("helper ok:"), "stdout: {stdout}");
}

#[test]
fn check_helper_fails_without_helper() {
	let dir = TempDir::new().unwrap();
	let config = write_config(dir.path(), None);

	let (success, stdout, stderr) = run_cli(&["-c", config.to_str().unwrap(), "check-helper"], "");
	assert!(!success);
	assert!(stdout.is_empty());
	assert!(stderr.contains("missing helper application path"), "stderr: {stderr}");
}

#[test]
fn show_config_prints_effective_values() {
	let dir = TempDir::new().unwrap();
	let config = write_config(dir.path(), None);

	let (success, stdout, stderr) = run_cli(&["-c", config.to_str().unwrap(), "show-config"], "");
	assert!(success, "stderr: {stderr}");

	let shown: serde_json::Value = serde_json::from_str(&stdout).expect("show-config should print JSON");
	assert_eq!(shown["maxSessions"], 4);
	assert_eq!(shown["helperTimeoutMs"], 30000);
	assert_eq!(shown["logLevel"], "warn");
	assert!(shown["ntlmHelper"].is_null());
}

#[test]
fn missing_config_file_fails() {
	let dir = TempDir::new().unwrap();
	let missing = dir.path().join("absent.json");

	let (success, _stdout, stderr) = run_cli(&["-c", missing.to_str().unwrap(), "show-config"], "");
	assert!(!success);
	assert!(stderr.contains("absent.json"), "stderr: {stderr}");
}
