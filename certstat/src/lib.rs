#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

pub mod environment;
pub mod evidence;
pub mod revocation;
pub mod source;
pub mod tsl;
pub mod util;
pub mod validator;

// order of pub use statements below is intended to assure the list emitted by cargo doc on the main
// index.html page is in alphabetical order.
pub use crate::environment::*;
pub use crate::evidence::*;
pub use crate::revocation::*;
pub use crate::{source::*, tsl::*, util::*, validator::*};
