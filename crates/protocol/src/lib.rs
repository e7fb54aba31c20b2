//! Wire types for NTLM negotiation.
//!
//! This crate contains the shapes of data exchanged on the two edges of an
//! NTLM negotiation:
//!
//! * the helper edge, where the server talks to an external helper program
//!   over the Squid `ntlmssp` line protocol (`YR`/`KK` out, `TT`/`AF`/`NA`/`BH` in);
//! * the client edge, where tokens travel as `NTLM` or `NTLM <base64>` in
//!   `WWW-Authenticate`/`Authorization` headers.
//!
//! Types in this crate are pure data plus parsing. Negotiation state lives in
//! `bonsai-auth`.

pub mod helper;
pub mod ntlmssp;
pub mod token;

pub use helper::*;
pub use ntlmssp::*;
pub use token::*;
