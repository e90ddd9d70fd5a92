#![forbid(unsafe_code)]

pub mod ids;
pub mod instant;

pub use ids::{ResourceId, ResourceIdError};
