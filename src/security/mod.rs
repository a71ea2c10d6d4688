//! Authentication subsystem.
//!
//! The gate decides; authenticators advise. Fail-closed throughout: a
//! request is rejected unless some authenticator has positively marked it
//! valid.

pub mod authenticators;
pub mod gate;

pub use authenticators::{CredsAuthenticator, HeaderAuthenticator};
