//! Errors as values.
//!
//! An error is an ordinary [`Value`] of kind [`Kind::Error`]. It carries a
//! message, the span it refers to, and optionally a chained note that adds
//! a second location ("last defined here"). Errors flow back through the
//! evaluator like any other result; callers check for them after every
//! sub-evaluation and return them unchanged.

use std::io::{self, Write};

use crate::heap::Heap;
use crate::source::{SourceMap, Span};
use crate::value::{DiagnosticId, Kind, Value};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Note,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Note => "note",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub span: Span,
    pub next: Option<DiagnosticId>,
}

impl Heap {
    /// A new error value located at `span`.
    pub fn error(&mut self, span: Span, message: impl Into<String>) -> Value {
        self.diagnostic_value(Severity::Error, span, message.into())
    }

    /// A new note value located at `span`, for chaining onto an error.
    pub fn note(&mut self, span: Span, message: impl Into<String>) -> Value {
        self.diagnostic_value(Severity::Note, span, message.into())
    }

    fn diagnostic_value(&mut self, severity: Severity, span: Span, message: String) -> Value {
        let id = self.alloc_diagnostic(Diagnostic {
            severity,
            message,
            span,
            next: None,
        });
        Value::new(Kind::Error(id), span)
    }

    /// Attach `next` after the last link of `error`'s chain. Values that
    /// are not diagnostics are left alone.
    pub fn chain(&mut self, error: Value, next: Value) -> Value {
        let (Kind::Error(mut id), Kind::Error(next_id)) = (error.kind, next.kind) else {
            return error;
        };
        while let Some(n) = self.diagnostic(id).next {
            id = n;
        }
        self.diagnostic_mut(id).next = Some(next_id);
        error
    }

    /// The message of an error value, if it is one.
    pub fn error_message(&self, value: Value) -> Option<&str> {
        match value.kind {
            Kind::Error(id) => Some(&self.diagnostic(id).message),
            _ => None,
        }
    }
}

/// Render an error value and everything chained after it:
///
/// ```text
/// error: file:line:column: message
/// 	<source line>
/// 	    ^~~~
/// note: ...
/// ```
///
/// Non-error values render nothing.
pub fn print_error(
    w: &mut dyn Write,
    heap: &Heap,
    sources: &SourceMap,
    value: Value,
) -> io::Result<()> {
    let Kind::Error(mut id) = value.kind else {
        return Ok(());
    };
    loop {
        let diagnostic = heap.diagnostic(id);
        render_one(w, sources, diagnostic)?;
        match diagnostic.next {
            Some(next) => id = next,
            None => return Ok(()),
        }
    }
}

fn render_one(w: &mut dyn Write, sources: &SourceMap, d: &Diagnostic) -> io::Result<()> {
    let span = d.span;
    writeln!(
        w,
        "{}: {}:{}:{}: {}",
        d.severity.label(),
        sources.name(span.source),
        span.line,
        span.column + 1,
        d.message
    )?;

    let line = sources.line_of(span);
    writeln!(w, "\t{}", line)?;

    // Keep tabs from the source line so the caret lines up under it.
    let mut underline = String::new();
    let mut chars = line.chars();
    for _ in 0..span.column {
        match chars.next() {
            Some(c) if c.is_whitespace() => underline.push(c),
            _ => underline.push(' '),
        }
    }
    underline.push('^');
    for _ in 1..span.len {
        underline.push('~');
    }
    writeln!(w, "\t{}", underline)
}

/// Render an error chain into a string.
pub fn render_error(heap: &Heap, sources: &SourceMap, value: Value) -> String {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = print_error(&mut out, heap, sources, value);
    String::from_utf8_lossy(&out).into_owned()
}
