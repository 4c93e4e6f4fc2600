//! Operator discovery: request options, discovery results, provider metadata, and the
//! discovery service client.

pub mod client;
pub mod metadata;
pub mod options;
pub mod response;

pub use client::*;
pub use metadata::*;
pub use options::*;
pub use response::*;
