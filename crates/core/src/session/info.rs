use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::registry::SessionRecord;

/// Point-in-time snapshot of one session, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
	pub id: String,
	pub slot: usize,
	pub refcount: u32,
	/// Seconds since the Unix epoch.
	pub last_seen: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	/// Scopes with an attached context, in attach order.
	#[serde(default)]
	pub scopes: Vec<String>,
}

impl SessionInfo {
	pub(super) fn capture(slot: usize, record: &SessionRecord) -> Self {
		Self {
			id: record.id.to_string(),
			slot,
			refcount: record.refcount,
			last_seen: unix_seconds(record.last_seen),
			user_id: record.user_id.clone(),
			scopes: record.contexts.iter().map(|ctx| ctx.scope().to_string()).collect(),
		}
	}
}

fn unix_seconds(at: SystemTime) -> u64 {
	at.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}
