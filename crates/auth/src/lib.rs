//! `forgepos-auth` — bearer-token validation and role-based authorization.
//!
//! Tokens are minted elsewhere; this crate only verifies them and turns their
//! claims into a [`Principal`] that services and handlers can check against.

pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod permissions;
pub mod policy;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtValidator, JwtError, JwtValidator};
pub use permissions::Permission;
pub use policy::permissions_for_roles;
pub use principal::TenantMembership;
pub use roles::Role;
