//! Call site capture for error contexts.

/// Captures a snapshot of the current call stack.
///
/// Injected into [crate::ErrorContext::wrap_with] so the
/// capture can be mocked in tests or replaced on platforms
/// without symbolicated backtraces.
pub trait StackCapture: Send + Sync {
    /// Capture the frames of the current call stack.
    ///
    /// Frames are rendered as `file:line - function` ordered
    /// from the call site outwards. An empty capture means
    /// no stack is available.
    fn capture(&self) -> Vec<String>;
}

/// Default capture backed by the `backtrace` crate.
///
/// Frames belonging to the standard library, the backtrace
/// machinery and this crate are filtered out so the first
/// frame is the caller of the wrap operation. Without the
/// `backtrace` feature every capture is empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallerStack;

#[cfg(feature = "backtrace")]
impl StackCapture for CallerStack {
    fn capture(&self) -> Vec<String> {
        let trace = backtrace::Backtrace::new();
        let mut frames = Vec::new();
        for frame in trace.frames() {
            for symbol in frame.symbols() {
                let (Some(file), Some(line), Some(name)) =
                    (symbol.filename(), symbol.lineno(), symbol.name())
                else {
                    continue;
                };
                let file = file.display().to_string();
                let name = name.to_string();
                if file.contains("/rustc/")
                    || file.contains("\\rustc\\")
                    || name.starts_with("backtrace::")
                    || name.starts_with("slate_errors::")
                {
                    continue;
                }
                frames.push(format!("{}:{} - {}", file, line, name));
            }
        }
        frames
    }
}

#[cfg(not(feature = "backtrace"))]
impl StackCapture for CallerStack {
    fn capture(&self) -> Vec<String> {
        Vec::new()
    }
}
