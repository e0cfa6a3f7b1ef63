//! `shipit-auth` — explicit, transport-agnostic access checks.
//!
//! Claims are decoded and signature-verified elsewhere; this crate only
//! decides whether a given set of claims may act on an owner's data.

pub mod authorize;
pub mod claims;
pub mod scope;

pub use authorize::{AuthzError, check_read_access, check_write_access};
pub use claims::{AccessClaims, GrantFlow, TokenValidationError, validate_claims};
pub use scope::Scope;
