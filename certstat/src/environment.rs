//! Callback switchboard and collaborator traits used when determining certificate status

pub mod pki_environment;
pub mod pki_environment_traits;

pub use crate::{environment::pki_environment::*, environment::pki_environment_traits::*};
