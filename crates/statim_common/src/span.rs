//! Source location tracking.
//!
//! A [`SourceSpan`] identifies a half-open range of an input file by line and
//! column. It carries the file path rather than an interned file id: the core
//! never opens files itself, so the path travels with the span for whatever
//! component (the diagnostics renderer) eventually needs to read it back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A single position within a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl SourcePos {
    pub fn new(line: u32, column: u32, offset: u32) -> Self {
        Self { line, column, offset }
    }

    pub fn start() -> Self {
        Self::new(1, 1, 0)
    }
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span of source text, from `start` to `end`, within `file`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: SourcePos,
    pub end: SourcePos,
    pub file: Arc<str>,
}

impl SourceSpan {
    pub fn new(file: impl Into<Arc<str>>, start: SourcePos, end: SourcePos) -> Self {
        Self { start, end, file: file.into() }
    }

    /// A zero-width span at `pos`, for synthesized nodes with no real source.
    pub fn point(file: impl Into<Arc<str>>, pos: SourcePos) -> Self {
        Self::new(file, pos, pos)
    }

    /// A span covering neither of two real files; used for declarations the
    /// lowerer invents (e.g. implicit shells) that never need to report.
    pub fn synthetic() -> Self {
        Self::new("<synthetic>", SourcePos::start(), SourcePos::start())
    }

    pub fn combine(&self, other: &SourceSpan) -> SourceSpan {
        assert_eq!(self.file, other.file, "cannot combine spans from different files");
        SourceSpan::new(
            self.file.clone(),
            if self.start.offset <= other.start.offset { self.start } else { other.start },
            if self.end.offset >= other.end.offset { self.end } else { other.end },
        )
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}:{}-{}", self.file, self.start.line, self.start.column, self.end.column)
        } else {
            write!(f, "{}:{}-{}", self.file, self.start, self.end)
        }
    }
}

/// A value paired with the span of source it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: SourceSpan,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: SourceSpan) -> Self {
        Self { value, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned::new(f(self.value), self.span)
    }
}
