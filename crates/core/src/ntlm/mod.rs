//! NTLM negotiation over a Squid `ntlmssp` helper.

mod context;
mod engine;
mod state;

pub use context::AuthContext;
pub use engine::{Challenge, HelperFault, Negotiation};
pub use state::NegotiationState;
