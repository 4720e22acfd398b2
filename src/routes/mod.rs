//! Router Module Index
//!
//! Splits the routing table by guard: public routes carry no credentials,
//! user routes resolve the caller through the `ActiveUser`/`AdminUser`
//! extractors inside each handler.

/// Routes accessible without credentials.
pub mod public;

/// The user-management surface, mounted under the configured API prefix.
pub mod users;
