//! Error wrapper carrying named diagnostic attributes.
use crate::{stack::CallerStack, AttributeMap, StackCapture};
use serde_json::Value;
use std::{error::Error as StdError, fmt};

/// Reserved attribute key holding the call stack snapshot.
pub const STACK_ATTRIBUTE: &str = "stack";

/// Boxed error type accepted as a wrapped cause.
type BoxedError = Box<dyn StdError + Send + Sync + 'static>;

/// Capability exposed by errors that carry diagnostic attributes.
///
/// Implemented by [ErrorContext]; chain walking is performed
/// with [find_diagnostic] rather than ad-hoc type matching.
pub trait Diagnostic {
    /// Attribute map of this context.
    ///
    /// Does not walk the cause chain.
    fn attributes(&self) -> &AttributeMap;

    /// Wrapped cause, if any.
    fn cause(&self) -> Option<&(dyn StdError + 'static)>;

    /// Whether an attribute with the given name is present.
    fn has_arg(&self, name: &str) -> bool {
        self.attributes().contains_key(name)
    }

    /// Value of the named attribute when present.
    fn get_arg(&self, name: &str) -> Option<&Value> {
        self.attributes().get(name)
    }

    /// Attributes of this context flattened to an alternating
    /// key/value sequence.
    fn args(&self) -> Vec<Value> {
        let mut out = Vec::with_capacity(self.attributes().len() * 2);
        for (key, value) in self.attributes() {
            out.push(Value::String(key.clone()));
            out.push(value.clone());
        }
        out
    }
}

/// Error wrapping a cause with a map of named attributes.
///
/// Contexts are immutable once constructed so concurrent
/// reads need no locking.
#[derive(Debug)]
pub struct ErrorContext {
    cause: Option<BoxedError>,
    attrs: AttributeMap,
}

impl ErrorContext {
    /// Wrap a cause with attributes given as a flat alternating
    /// `(name, value)` sequence.
    ///
    /// If the cause chain already carries a context its
    /// attributes are copied first and the new pairs overwrite
    /// duplicate keys; otherwise a call stack snapshot is
    /// captured under [STACK_ATTRIBUTE].
    ///
    /// Malformed input is dropped silently: an element in name
    /// position that is not a string is skipped and a trailing
    /// name with no value is ignored. Construction cannot fail.
    pub fn wrap(cause: Option<BoxedError>, key_vals: Vec<Value>) -> Self {
        Self::wrap_with(cause, key_vals, &CallerStack)
    }

    /// Wrap a cause using the given stack capture capability.
    pub fn wrap_with(
        cause: Option<BoxedError>,
        key_vals: Vec<Value>,
        capture: &dyn StackCapture,
    ) -> Self {
        let mut attrs = AttributeMap::new();

        let mut capture_stack = true;
        if let Some(cause) = &cause {
            if let Some(prior) = find_diagnostic(as_dyn_error(cause)) {
                capture_stack = false;
                for (key, value) in prior.attributes() {
                    attrs.insert(key.clone(), value.clone());
                }
            }
        }

        let mut iter = key_vals.into_iter();
        while let Some(item) = iter.next() {
            let Value::String(key) = item else {
                continue;
            };
            let Some(value) = iter.next() else {
                break;
            };
            attrs.insert(key, value);
        }

        if capture_stack {
            let frames = capture.capture();
            if !frames.is_empty() {
                attrs.insert(
                    STACK_ATTRIBUTE.to_owned(),
                    Value::Array(
                        frames.into_iter().map(Value::String).collect(),
                    ),
                );
            }
        }

        Self { cause, attrs }
    }
}

impl Diagnostic for ErrorContext {
    fn attributes(&self) -> &AttributeMap {
        &self.attrs
    }

    fn cause(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| as_dyn_error(e))
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}", cause),
            None => write!(f, "{}", Value::Object(self.attrs.clone())),
        }
    }
}

impl StdError for ErrorContext {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Diagnostic::cause(self)
    }
}

/// Find the nearest diagnostic context in an error chain.
///
/// Walks the `source()` links starting at `err` and returns
/// the first context encountered.
pub fn find_diagnostic<'a>(
    err: &'a (dyn StdError + 'static),
) -> Option<&'a dyn Diagnostic> {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(context) = err.downcast_ref::<ErrorContext>() {
            return Some(context);
        }
        current = err.source();
    }
    None
}

/// Flatten the attributes of the nearest context in an error
/// chain to an alternating key/value sequence with `extra`
/// appended.
///
/// When the chain carries no context `extra` is returned
/// unchanged.
pub fn get_args(
    err: &(dyn StdError + 'static),
    extra: Vec<Value>,
) -> Vec<Value> {
    match find_diagnostic(err) {
        Some(context) => {
            let mut out = context.args();
            out.extend(extra);
            out
        }
        None => extra,
    }
}

fn as_dyn_error(err: &BoxedError) -> &(dyn StdError + 'static) {
    &**err
}
