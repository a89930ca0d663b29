//! Qualifier evaluation over already-parsed trusted list service entries

pub mod condition;
pub mod qualifier_rules;

pub use crate::tsl::{condition::*, qualifier_rules::*};
