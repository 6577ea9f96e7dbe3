pub mod auth;

pub use auth::{Claims, JwtAuth, JwtVerifier, TokenVerifier};
