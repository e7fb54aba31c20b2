//! Shared session registry.
//!
//! A [`SessionRegistry`] maps client session ids to records holding a
//! reference count, the bound user, and one [`AuthContext`](crate::AuthContext)
//! per scope. One lock guards the whole table, so every operation here is
//! linearized.

mod binding;
mod info;
mod registry;


pub use binding::{ContextBinding, ContextRequest};
pub use info::SessionInfo;
pub use registry::{DEFAULT_CAPACITY, EvictionPolicy, SessionHandle, SessionRegistry};
