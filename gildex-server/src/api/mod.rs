//! API routers.
//!
//! Three surfaces, matching the three external consumers:
//!
//! - `/api/v1/service` — platform gateway (signed bodies)
//! - `/api/v1/query`   — presentation layer (signed URLs)
//! - `/api/v1/admin`   — administrative tooling (hashed secret header)

pub mod admin;
pub mod extractors;
pub mod query;
pub mod service;
