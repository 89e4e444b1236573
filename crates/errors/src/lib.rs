#![deny(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(all(doc, CHANNEL_NIGHTLY), feature(doc_auto_cfg))]
//! Attach structured context to errors as they propagate
//! up a call stack.
//!
//! Wrapping an error merges the attributes of any context
//! already in its chain and captures a call stack snapshot
//! the first time an error enters the context system.
mod context;
mod stack;

pub use context::{
    find_diagnostic, get_args, Diagnostic, ErrorContext, STACK_ATTRIBUTE,
};
pub use stack::{CallerStack, StackCapture};

/// Attribute map attached to an error context.
pub type AttributeMap = serde_json::Map<String, serde_json::Value>;
