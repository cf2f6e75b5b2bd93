//! Common types used across the application.

pub mod amount;
pub mod id;

pub use amount::{MINOR_UNIT_SCALE, is_minor_unit, minor_unit, round_to_minor_unit};
pub use id::*;
