//! User-facing messages about a compile, rendered with ariadne.
//!
//! Spans point into the front-end source the scaffolded unit was lowered
//! from. Synthesized nodes carry a dummy span; their diagnostics still
//! render, anchored at the start of the file.

use std::io;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};

use crate::span::Span;

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Short stable tag such as `non-convergence`, shown next to the kind.
    pub code: Option<&'static str>,
    pub message: String,
    pub span: Span,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn report_kind(self) -> ReportKind<'static> {
        match self {
            Self::Error => ReportKind::Error,
            Self::Warning => ReportKind::Warning,
        }
    }

    fn color(self) -> Color {
        match self {
            Self::Error => Color::Red,
            Self::Warning => Color::Yellow,
        }
    }
}

impl Diagnostic {
    fn new(severity: Severity, message: String, span: Span) -> Self {
        Self {
            severity,
            code: None,
            message,
            span,
            notes: Vec::new(),
            help: None,
        }
    }

    /// The unit produced no usable output.
    pub fn error(message: String, span: Span) -> Self {
        Self::new(Severity::Error, message, span)
    }

    /// Output was produced but some region kept its scaffolded form.
    pub fn warning(message: String, span: Span) -> Self {
        Self::new(Severity::Warning, message, span)
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_note(mut self, note: String) -> Self {
        self.notes.push(note);
        self
    }

    pub fn with_help(mut self, help: String) -> Self {
        self.help = Some(help);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Byte range of the span, cut down to fit `source_len`.
    fn clamped_range(&self, source_len: usize) -> std::ops::Range<usize> {
        let start = (self.span.start as usize).min(source_len);
        let end = (self.span.end as usize).clamp(start, source_len);
        start..end
    }

    fn report<'f>(
        &self,
        filename: &'f str,
        source_len: usize,
        color: bool,
    ) -> Report<'static, (&'f str, std::ops::Range<usize>)> {
        let range = self.clamped_range(source_len);
        let mut report = Report::build(self.severity.report_kind(), filename, range.start)
            .with_config(Config::default().with_color(color))
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(self.severity.color()),
            );
        if let Some(code) = self.code {
            report = report.with_code(code);
        }
        for note in &self.notes {
            report = report.with_note(note);
        }
        if let Some(help) = &self.help {
            report = report.with_help(help);
        }
        report.finish()
    }

    /// Print to stderr. A closed stderr is ignored.
    pub fn render(&self, filename: &str, source: &str) {
        let _ = self
            .report(filename, source.len(), true)
            .eprint((filename, Source::from(source)));
    }

    /// Write an uncolored rendering, for logs and snapshots.
    pub fn write_plain<W: io::Write>(&self, filename: &str, source: &str, out: W) -> io::Result<()> {
        self.report(filename, source.len(), false)
            .write((filename, Source::from(source)), out)
    }
}

pub fn render_diagnostics(diagnostics: &[Diagnostic], filename: &str, source: &str) {
    for diag in diagnostics {
        diag.render(filename, source);
    }
}
