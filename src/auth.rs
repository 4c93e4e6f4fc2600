//! Auth-domain scope handling and token models.

pub mod scope;
pub mod token;

pub use scope::*;
pub use token::{response::*, secret::*};
