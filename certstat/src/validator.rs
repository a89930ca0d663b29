//! Settings and the chain walker that ties sources and verifiers together

pub mod chain_validator;
pub mod status_settings;

pub use crate::validator::{chain_validator::*, status_settings::*};
