//! Authentication core for the Bonsai application server.
//!
//! * [`session`]: the shared session registry and per-scope auth-context binding.
//! * [`ntlm`]: the NTLM negotiation state machine and the attachable [`AuthContext`].
//! * [`service`]: the per-request flow tying both together.
//!
//! # Example
//!
//! ```ignore
//! let config = AuthConfig::load(Path::new("/etc/bonsai/auth.json"))?.normalize();
//! let service = AuthService::from_config(&config);
//!
//! let session = service.registry().lookup_or_create("8f2c1e")?;
//! match service.authenticate(&session, "tfs", request_token).await? {
//!     AuthOutcome::Authenticated { principal } => { /* serve request */ }
//!     AuthOutcome::Continue { token } => { /* 401 with WWW-Authenticate: token */ }
//! }
//! service.registry().release(session);
//! ```

pub mod config;
pub mod error;
pub mod ntlm;
pub mod service;
pub mod session;

pub use config::AuthConfig;
pub use error::{AuthError, ConfigError, Result, SessionError};
pub use ntlm::{AuthContext, Challenge, HelperFault, Negotiation, NegotiationState};
pub use service::{AuthOutcome, AuthService};
pub use session::{ContextBinding, ContextRequest, EvictionPolicy, SessionHandle, SessionInfo, SessionRegistry};
