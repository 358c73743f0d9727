//! OAuth 2.0 authorization server endpoints.
//!
//! ## Supported Standards
//! - RFC 6749: Authorization Code, Implicit, Resource Owner Password and
//!   Client Credentials grants, plus refresh
//! - RFC 6750: Bearer token usage
//! - RFC 7009: Token revocation

pub mod handlers;
pub mod pages;
