//! Per-scope auth-context binding on a session.
//!
//! Once a scope has a context it keeps it for the life of the record: a
//! second attach for the same scope is refused, not merged or replaced.

use std::sync::Arc;

use tracing::{debug, error};

use super::registry::{SessionHandle, SessionRegistry};
use crate::error::SessionError;
use crate::ntlm::AuthContext;

/// What [`SessionRegistry::bind_context`] should do.
#[derive(Debug)]
pub enum ContextRequest {
	/// Report whether the scope has a context.
	Query,
	/// Return the scope's context, if any.
	Fetch,
	/// Attach this context unless the scope already has one.
	Attach(Arc<AuthContext>),
}

/// Result of [`SessionRegistry::bind_context`].
#[derive(Debug)]
pub enum ContextBinding {
	/// [`Query`](ContextRequest::Query): whether a context exists.
	Exists(bool),
	Found(Arc<AuthContext>),
	NotFound,
	Attached,
	/// The scope was already bound; carries the caller's context back, unlinked.
	Conflict(Arc<AuthContext>),
}

impl SessionRegistry {
	/// Queries, fetches, or attaches the context for `scope`.
	///
	/// Scope comparison ignores ASCII case. Query and fetch never modify the
	/// session. Attaching a context whose own scope differs from `scope` is
	/// an [`InvalidArgument`](SessionError::InvalidArgument).
	pub fn bind_context(&self, handle: &SessionHandle, scope: &str, request: ContextRequest) -> Result<ContextBinding, SessionError> {
		let mut table = self.table.lock();
		let record = table.record_mut(handle)?;
		let existing = record.contexts.iter().find(|ctx| ctx.matches_scope(scope)).cloned();

		match request {
			ContextRequest::Query => Ok(ContextBinding::Exists(existing.is_some())),
			ContextRequest::Fetch => match existing {
				Some(ctx) => {
					debug!(target = "bonsai.session", id = handle.id(), scope, "returning previous authentication context");
					Ok(ContextBinding::Found(ctx))
				}
				None => {
					debug!(target = "bonsai.session", id = handle.id(), scope, "no previous authentication context exists");
					Ok(ContextBinding::NotFound)
				}
			},
			ContextRequest::Attach(ctx) => {
				if !ctx.matches_scope(scope) {
					return Err(SessionError::InvalidArgument(format!(
						"context for scope {} cannot be attached as {scope}",
						ctx.scope()
					)));
				}
				if existing.is_some() {
					error!(target = "bonsai.session", id = handle.id(), scope, "got an auth context but one already exists");
					return Ok(ContextBinding::Conflict(ctx));
				}
				debug!(target = "bonsai.session", id = handle.id(), scope, "setting new authentication context");
				record.contexts.push(ctx);
				Ok(ContextBinding::Attached)
			}
		}
	}

	pub fn has_context(&self, handle: &SessionHandle, scope: &str) -> Result<bool, SessionError> {
		match self.bind_context(handle, scope, ContextRequest::Query)? {
			ContextBinding::Exists(exists) => Ok(exists),
			_ => Ok(false),
		}
	}

	pub fn context(&self, handle: &SessionHandle, scope: &str) -> Result<Option<Arc<AuthContext>>, SessionError> {
		match self.bind_context(handle, scope, ContextRequest::Fetch)? {
			ContextBinding::Found(ctx) => Ok(Some(ctx)),
			_ => Ok(None),
		}
	}

	/// Attaches `context` under its own scope, failing with
	/// [`AlreadyBound`](SessionError::AlreadyBound) if the scope is taken.
	pub fn attach_context(&self, handle: &SessionHandle, context: Arc<AuthContext>) -> Result<(), SessionError> {
		let scope = context.scope().to_string();
		match self.bind_context(handle, &scope, ContextRequest::Attach(context))? {
			ContextBinding::Conflict(rejected) => Err(SessionError::AlreadyBound { scope, rejected }),
			_ => Ok(()),
		}
	}

	/// Returns the scope's context, attaching one built by `make` if there is none.
	///
	/// The check and the attach happen under one lock acquisition, so
	/// concurrent callers for the same scope all get the same context.
	pub fn context_or_attach(
		&self,
		handle: &SessionHandle,
		scope: &str,
		make: impl FnOnce() -> AuthContext,
	) -> Result<Arc<AuthContext>, SessionError> {
		let mut table = self.table.lock();
		let record = table.record_mut(handle)?;

		if let Some(ctx) = record.contexts.iter().find(|ctx| ctx.matches_scope(scope)) {
			return Ok(Arc::clone(ctx));
		}

		let ctx = Arc::new(make());
		if !ctx.matches_scope(scope) {
			return Err(SessionError::InvalidArgument(format!(
				"context for scope {} cannot be attached as {scope}",
				ctx.scope()
			)));
		}
		debug!(target = "bonsai.session", id = handle.id(), scope, "setting new authentication context");
		record.contexts.push(Arc::clone(&ctx));
		Ok(ctx)
	}
}
