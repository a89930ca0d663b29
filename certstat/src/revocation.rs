//! Certificate status verifiers that consume CRLs and OCSP responses

pub mod check_revocation;
pub mod crl;
pub mod ocsp_client;

pub use crate::revocation::{check_revocation::*, crl::*, ocsp_client::*};
