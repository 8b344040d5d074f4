//! Diagnostic reporting.
//!
//! The core never writes to stdout/stderr directly; it reports through a
//! [`Diagnostics`] instance, which holds the current file path and an
//! injected [`DiagnosticSink`]. `Severity::Fatal` renders an annotated source
//! snippet (reading the file named by the span) and then aborts — the only
//! file I/O the core performs, and only on the fatal-error path.

use crate::span::SourceSpan;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Fatal => write!(f, "fatal error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: SourceSpan,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>, span: SourceSpan) -> Self {
        Self { severity, message: message.into(), span }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.span)
    }
}

/// Sink that diagnostics are forwarded to. The default writes to stderr;
/// tests and the CLI driver supply their own (a collecting sink, a colorized
/// terminal writer, etc).
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic, snippet: Option<&str>);
}

/// Sink used outside of tests: prints the diagnostic and, for fatal errors,
/// the rendered snippet, to stderr.
#[derive(Default)]
pub struct StderrSink;

impl DiagnosticSink for StderrSink {
    fn report(&mut self, diagnostic: &Diagnostic, snippet: Option<&str>) {
        eprintln!("{diagnostic}");
        if let Some(snippet) = snippet {
            eprintln!("{snippet}");
        }
    }
}

/// Sink that records every diagnostic instead of printing it; used by tests
/// that want to assert on reported messages without touching stderr.
#[derive(Default)]
pub struct CollectingSink {
    pub recorded: Vec<Diagnostic>,
}

impl DiagnosticSink for CollectingSink {
    fn report(&mut self, diagnostic: &Diagnostic, _snippet: Option<&str>) {
        self.recorded.push(diagnostic.clone());
    }
}

/// Renders the line(s) covered by `span`, with a caret line under the first
/// line's column range. Returns `None` if the file cannot be read (e.g. the
/// span belongs to a synthesized node).
fn render_snippet(span: &SourceSpan) -> Option<String> {
    let contents = std::fs::read_to_string(span.file.as_ref()).ok()?;
    let line = contents.lines().nth(span.start.line.saturating_sub(1) as usize)?;

    let col = span.start.column.saturating_sub(1) as usize;
    let width = if span.start.line == span.end.line {
        (span.end.column.saturating_sub(span.start.column)).max(1) as usize
    } else {
        1
    };

    let mut out = format!("  --> {}\n", span);
    out.push_str(&format!("   | {line}\n"));
    out.push_str("   | ");
    out.push_str(&" ".repeat(col));
    out.push_str(&"^".repeat(width));
    Some(out)
}

/// The diagnostics component threaded through every core pass. Accumulates
/// non-fatal diagnostics; `fatal` renders and aborts immediately.
pub struct Diagnostics {
    file: String,
    sink: Box<dyn DiagnosticSink>,
    recorded: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new(file: impl Into<String>, sink: Box<dyn DiagnosticSink>) -> Self {
        Self { file: file.into(), sink, recorded: Vec::new() }
    }

    pub fn with_stderr_sink(file: impl Into<String>) -> Self {
        Self::new(file, Box::new(StderrSink))
    }

    pub fn current_file(&self) -> &str {
        &self.file
    }

    pub fn set_current_file(&mut self, file: impl Into<String>) {
        self.file = file.into();
    }

    fn emit(&mut self, diagnostic: Diagnostic) {
        let snippet = matches!(diagnostic.severity, Severity::Fatal).then(|| render_snippet(&diagnostic.span)).flatten();
        self.sink.report(&diagnostic, snippet.as_deref());
        self.recorded.push(diagnostic);
    }

    pub fn info(&mut self, message: impl Into<String>, span: SourceSpan) {
        self.emit(Diagnostic::new(Severity::Info, message, span));
    }

    pub fn warning(&mut self, message: impl Into<String>, span: SourceSpan) {
        self.emit(Diagnostic::new(Severity::Warning, message, span));
    }

    pub fn error(&mut self, message: impl Into<String>, span: SourceSpan) {
        self.emit(Diagnostic::new(Severity::Error, message, span));
    }

    /// Reports a fatal diagnostic, rendering the offending source, and aborts
    /// compilation. Never returns.
    pub fn fatal(&mut self, message: impl Into<String>, span: SourceSpan) -> ! {
        let text = message.into();
        self.emit(Diagnostic::new(Severity::Fatal, text.clone(), span.clone()));
        panic!("fatal error: {text} at {span}");
    }

    pub fn has_errors(&self) -> bool {
        self.recorded.iter().any(|d| matches!(d.severity, Severity::Error | Severity::Fatal))
    }

    pub fn error_count(&self) -> usize {
        self.recorded.iter().filter(|d| matches!(d.severity, Severity::Error | Severity::Fatal)).count()
    }

    pub fn recorded(&self) -> &[Diagnostic] {
        &self.recorded
    }
}
