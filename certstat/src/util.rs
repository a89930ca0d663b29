//! Basic utility functionality supporting certificate status determination

pub mod alg_oids;
pub mod crypto;
pub mod error;
pub mod file_utils;
pub mod logging;
pub mod utilities;

pub use crate::{
    util::alg_oids::*, util::crypto::*, util::error::*, util::file_utils::*, util::logging::*, util::utilities::*,
};
