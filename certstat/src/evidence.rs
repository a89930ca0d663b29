//! Value types describing certificates, signed tokens, verdicts and the evidence behind them

pub mod cert_with_context;
pub mod certificate_status;
pub mod revocation_data;
pub mod signed_token;

pub use crate::{
    evidence::cert_with_context::*, evidence::certificate_status::*,
    evidence::revocation_data::*, evidence::signed_token::*,
};
