use serde_json::{json, Value};
use slate_errors::{
    find_diagnostic, get_args, Diagnostic, ErrorContext, StackCapture,
    STACK_ATTRIBUTE,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

/// Capture that records how many times it was invoked.
#[derive(Default)]
struct CountingStack(AtomicUsize);

impl CountingStack {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl StackCapture for CountingStack {
    fn capture(&self) -> Vec<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        vec!["app.rs:1 - handler".to_owned()]
    }
}

/// Capture that yields no frames.
struct NoStack;

impl StackCapture for NoStack {
    fn capture(&self) -> Vec<String> {
        Vec::new()
    }
}

#[derive(Debug, Error)]
#[error("request failed")]
struct RequestError {
    #[source]
    source: ErrorContext,
}

#[test]
fn wrap_merges_and_overrides() {
    let inner = ErrorContext::wrap(None, vec![json!("code"), json!(42)]);
    let outer = ErrorContext::wrap(
        Some(inner.into()),
        vec![json!("code"), json!(7), json!("user"), json!("a")],
    );

    assert_eq!(Some(&json!(7)), outer.get_arg("code"));
    assert_eq!(Some(&json!("a")), outer.get_arg("user"));
    assert!(outer.has_arg(STACK_ATTRIBUTE));
}

#[test]
fn stack_captured_once_per_chain() {
    let capture = CountingStack::default();

    let mut chain =
        ErrorContext::wrap_with(None, vec![json!("depth"), json!(0)], &capture);
    for depth in 1..4 {
        chain = ErrorContext::wrap_with(
            Some(chain.into()),
            vec![json!("depth"), json!(depth)],
            &capture,
        );
    }

    assert_eq!(1, capture.count());
    assert_eq!(
        Some(&json!(["app.rs:1 - handler"])),
        chain.get_arg(STACK_ATTRIBUTE)
    );
    assert_eq!(Some(&json!(3)), chain.get_arg("depth"));
}

#[test]
fn absent_attribute_reports_absence() {
    let context = ErrorContext::wrap_with(
        None,
        vec![json!("code"), json!(0)],
        &NoStack,
    );

    assert!(!context.has_arg("missing"));
    assert!(context.get_arg("missing").is_none());

    // A stored zero-like value is still distinguishable
    // from absence.
    assert_eq!(Some(&json!(0)), context.get_arg("code"));
}

#[test]
fn malformed_pairs_are_dropped() {
    let context = ErrorContext::wrap_with(
        None,
        vec![json!(1), json!("code"), json!(42), json!("trailing")],
        &NoStack,
    );

    assert_eq!(1, context.attributes().len());
    assert_eq!(Some(&json!(42)), context.get_arg("code"));
    assert!(!context.has_arg("trailing"));
}

#[test]
fn display_prefers_cause_message() {
    let cause = std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no such table",
    );
    let context = ErrorContext::wrap_with(
        Some(cause.into()),
        vec![json!("table"), json!("users")],
        &NoStack,
    );
    assert_eq!("no such table", context.to_string());

    let bare = ErrorContext::wrap_with(
        None,
        vec![json!("table"), json!("users")],
        &NoStack,
    );
    assert_eq!(r#"{"table":"users"}"#, bare.to_string());
}

#[test]
fn source_returns_cause() {
    let cause = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let context =
        ErrorContext::wrap_with(Some(cause.into()), Vec::new(), &NoStack);

    let source = std::error::Error::source(&context).unwrap();
    assert_eq!("boom", source.to_string());
}

#[test]
fn chain_walk_through_intermediate_error() {
    let context = ErrorContext::wrap_with(
        None,
        vec![json!("code"), json!(42)],
        &NoStack,
    );
    let outer = RequestError { source: context };

    let diagnostic = find_diagnostic(&outer).unwrap();
    assert_eq!(Some(&json!(42)), diagnostic.get_arg("code"));
}

#[test]
fn get_args_flattens_chain_attributes() {
    let context = ErrorContext::wrap_with(
        None,
        vec![json!("a"), json!(1), json!("b"), json!(2)],
        &NoStack,
    );
    let outer = RequestError { source: context };

    let extra = vec![json!("request_id"), json!("abc")];
    let args = get_args(&outer, extra.clone());

    assert_eq!(&extra[..], &args[args.len() - 2..]);

    let mut pairs = std::collections::HashMap::new();
    for pair in args[..args.len() - 2].chunks(2) {
        let Value::String(key) = &pair[0] else {
            panic!("key position must hold a string");
        };
        pairs.insert(key.clone(), pair[1].clone());
    }
    assert_eq!(Some(&json!(1)), pairs.get("a"));
    assert_eq!(Some(&json!(2)), pairs.get("b"));
}

#[test]
fn get_args_without_context_is_passthrough() {
    let plain = std::io::Error::new(std::io::ErrorKind::Other, "boom");
    let extra = vec![json!("request_id"), json!("abc")];
    assert_eq!(extra, get_args(&plain, extra.clone()));
}

#[test]
fn default_capture_attaches_stack() {
    let context = ErrorContext::wrap(None, Vec::new());
    let Some(Value::Array(frames)) = context.get_arg(STACK_ATTRIBUTE) else {
        panic!("stack attribute must be an array of frames");
    };
    assert!(!frames.is_empty());
}
