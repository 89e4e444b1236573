#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(all(doc, CHANNEL_NIGHTLY), feature(doc_auto_cfg))]
//! Log file writer that rotates on hour boundaries.
mod error;
mod writer;

pub use error::Error;
pub use writer::{RotatingFileWriter, RotationHandle};

pub(crate) type Result<T> = std::result::Result<T, Error>;
