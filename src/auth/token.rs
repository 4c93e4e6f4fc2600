//! Token secrets and token endpoint results.

pub mod response;
pub mod secret;
