use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::info::SessionInfo;
use crate::error::SessionError;
use crate::ntlm::AuthContext;

/// Slot count used when none is configured.
pub const DEFAULT_CAPACITY: usize = 10240;

/// What happens to sessions nobody holds a handle to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
	/// Records live for the life of the registry and slots are never reused.
	#[default]
	Never,
	/// [`SessionRegistry::reap_idle`] frees records that have had no handles
	/// for at least `ttl`; their slots become reusable.
	Idle { ttl: Duration },
}

pub(crate) struct SessionRecord {
	pub(crate) id: Arc<str>,
	pub(crate) refcount: u32,
	pub(crate) last_seen: SystemTime,
	pub(crate) user_id: Option<String>,
	pub(crate) contexts: Vec<Arc<AuthContext>>,
}

impl SessionRecord {
	fn new(id: &str, now: SystemTime) -> Self {
		Self {
			id: Arc::from(id),
			refcount: 1,
			last_seen: now,
			user_id: None,
			contexts: Vec::new(),
		}
	}
}

#[derive(Default)]
pub(crate) struct Table {
	allocated: bool,
	pub(crate) slots: Vec<Option<SessionRecord>>,
	free: Vec<usize>,
	live: usize,
}

impl Table {
	/// Resolves a handle to its record, rejecting handles whose record was reaped.
	pub(crate) fn record_mut(&mut self, handle: &SessionHandle) -> Result<&mut SessionRecord, SessionError> {
		match self.slots.get_mut(handle.slot) {
			Some(Some(record)) if Arc::ptr_eq(&record.id, &handle.id) => Ok(record),
			_ => Err(SessionError::StaleHandle {
				id: handle.id.to_string(),
			}),
		}
	}
}

/// One counted reference to a session record.
///
/// Obtained from [`SessionRegistry::lookup_or_create`] and given back with
/// [`SessionRegistry::release`]. Handles are deliberately not `Clone`: each
/// one accounts for exactly one reference.
#[derive(Debug)]
pub struct SessionHandle {
	slot: usize,
	id: Arc<str>,
}

impl SessionHandle {
	pub fn id(&self) -> &str {
		&self.id
	}

	pub fn slot(&self) -> usize {
		self.slot
	}
}

/// Table of live client sessions.
pub struct SessionRegistry {
	capacity: usize,
	policy: EvictionPolicy,
	pub(super) table: Mutex<Table>,
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new(DEFAULT_CAPACITY, EvictionPolicy::Never)
	}
}

impl SessionRegistry {
	/// Creates an empty registry. Slot storage is allocated on first use.
	pub fn new(capacity: usize, policy: EvictionPolicy) -> Self {
		Self {
			capacity,
			policy,
			table: Mutex::new(Table::default()),
		}
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	pub fn policy(&self) -> EvictionPolicy {
		self.policy
	}

	/// Number of records currently held, referenced or not.
	pub fn len(&self) -> usize {
		self.table.lock().live
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Returns a handle to the session `id`, creating its record if needed.
	///
	/// An existing record gains a reference and has its last-seen time
	/// refreshed. A new record starts with one reference.
	pub fn lookup_or_create(&self, id: &str) -> Result<SessionHandle, SessionError> {
		if id.is_empty() {
			return Err(SessionError::InvalidArgument("session id must not be empty".into()));
		}

		let mut table = self.table.lock();
		if !table.allocated {
			table.slots.reserve_exact(self.capacity);
			table.allocated = true;
			debug!(target = "bonsai.session", capacity = self.capacity, "allocated session storage");
		}

		let now = SystemTime::now();
		let existing = table
			.slots
			.iter_mut()
			.enumerate()
			.find_map(|(slot, entry)| entry.as_mut().filter(|record| &*record.id == id).map(|record| (slot, record)));

		if let Some((slot, record)) = existing {
			record.refcount = record.refcount.saturating_add(1);
			record.last_seen = now;
			debug!(target = "bonsai.session", slot, id, refcount = record.refcount, "re-using session");
			return Ok(SessionHandle {
				slot,
				id: Arc::clone(&record.id),
			});
		}

		if table.live >= self.capacity {
			error!(target = "bonsai.session", capacity = self.capacity, id, "no session slots available");
			return Err(SessionError::CapacityExceeded { capacity: self.capacity });
		}

		let record = SessionRecord::new(id, now);
		let handle_id = Arc::clone(&record.id);
		let slot = match table.free.pop() {
			Some(slot) => {
				table.slots[slot] = Some(record);
				slot
			}
			None => {
				table.slots.push(Some(record));
				table.slots.len() - 1
			}
		};
		table.live += 1;

		info!(target = "bonsai.session", slot, id, "allocating session");
		Ok(SessionHandle { slot, id: handle_id })
	}

	/// Gives back one reference. A record with no references stays in the
	/// table until the eviction policy removes it.
	pub fn release(&self, handle: SessionHandle) {
		let mut table = self.table.lock();
		match table.record_mut(&handle) {
			Ok(record) => {
				if record.refcount == 0 {
					warn!(target = "bonsai.session", id = %handle.id, "released session with no outstanding references");
				}
				record.refcount = record.refcount.saturating_sub(1);
				debug!(target = "bonsai.session", slot = handle.slot, id = %handle.id, refcount = record.refcount, "released session");
			}
			Err(_) => warn!(target = "bonsai.session", slot = handle.slot, id = %handle.id, "released a stale session handle"),
		}
	}

	/// Binds `user_id` to the session unless a user is already bound.
	///
	/// Returns `true` when this call bound the user. An empty `user_id` is
	/// ignored.
	pub fn bind_user(&self, handle: &SessionHandle, user_id: &str) -> Result<bool, SessionError> {
		let mut table = self.table.lock();
		let record = table.record_mut(handle)?;

		if user_id.is_empty() {
			return Ok(false);
		}
		if let Some(bound) = &record.user_id {
			debug!(target = "bonsai.session", id = %handle.id, %bound, "session already bound to a user");
			return Ok(false);
		}

		info!(target = "bonsai.session", id = %handle.id, user_id, "binding session to user");
		record.user_id = Some(user_id.to_string());
		Ok(true)
	}

	pub fn user_id(&self, handle: &SessionHandle) -> Result<Option<String>, SessionError> {
		let mut table = self.table.lock();
		Ok(table.record_mut(handle)?.user_id.clone())
	}

	pub fn is_authenticated(&self, handle: &SessionHandle) -> Result<bool, SessionError> {
		let mut table = self.table.lock();
		Ok(table.record_mut(handle)?.user_id.is_some())
	}

	pub fn info(&self, handle: &SessionHandle) -> Result<SessionInfo, SessionError> {
		let mut table = self.table.lock();
		let record = table.record_mut(handle)?;
		Ok(SessionInfo::capture(handle.slot, record))
	}

	/// Snapshots every record in slot order.
	pub fn sessions(&self) -> Vec<SessionInfo> {
		let table = self.table.lock();
		table
			.slots
			.iter()
			.enumerate()
			.filter_map(|(slot, entry)| entry.as_ref().map(|record| SessionInfo::capture(slot, record)))
			.collect()
	}

	/// Frees unreferenced records idle for at least the policy's TTL.
	///
	/// Returns the number of records removed. Always `0` under
	/// [`EvictionPolicy::Never`]. Contexts held only by a reaped record are
	/// dropped with it, which shuts down their helpers.
	pub fn reap_idle(&self, now: SystemTime) -> usize {
		let EvictionPolicy::Idle { ttl } = self.policy else {
			return 0;
		};

		let mut table = self.table.lock();
		let Table { slots, free, live, .. } = &mut *table;

		let mut reaped = Vec::new();
		for (slot, entry) in slots.iter_mut().enumerate() {
			let idle = entry.as_ref().is_some_and(|record| {
				record.refcount == 0 && now.duration_since(record.last_seen).is_ok_and(|elapsed| elapsed >= ttl)
			});
			if !idle {
				continue;
			}
			if let Some(record) = entry.take() {
				info!(target = "bonsai.session", slot, id = %record.id, "reaping idle session");
				reaped.push(slot);
			}
		}

		*live -= reaped.len();
		free.extend(reaped.iter().rev());
		reaped.len()
	}
}
