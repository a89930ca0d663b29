//! Sources of certificates, CRLs and OCSP responses

pub mod aia_source;
pub mod cert_source;
pub mod composite_source;
pub mod crl_cache;
pub mod crl_source;
pub mod http_transport;
pub mod ocsp_source;

pub use crate::source::{
    aia_source::*, cert_source::*, composite_source::*, crl_cache::*, crl_source::*,
    http_transport::*, ocsp_source::*,
};
