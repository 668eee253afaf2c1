// src/error/error_reporter.rs
use crate::error::compile_error::CompileError;
use crate::location::line_tracker::LineTracker;
use crate::location::source_span::SourceSpan;
use console::style;

/// Renders accumulated diagnostics to stderr with the offending source line
/// and a caret underline.
pub struct ErrorReporter {
    line_tracker: LineTracker,
}

impl ErrorReporter {
    #[must_use]
    pub fn new(line_tracker: LineTracker) -> Self {
        Self { line_tracker }
    }

    pub fn report_errors(&self, errors: &[CompileError]) {
        for error in errors {
            match error {
                CompileError::Lexer { message, span } => self.print_error("lex", message, span),
                CompileError::Syntax { message, span } => self.print_error("syntax", message, span),
                CompileError::Semantic { message, span } => self.print_error("semantic", message, span),
                CompileError::Io(e) => {
                    eprintln!("{} {}", style("error[io]:").red().bold(), style(e).yellow());
                }
            }
        }
    }

    fn print_error(&self, category: &str, message: &str, span: &SourceSpan) {
        eprintln!(
            "{} {}",
            style(format!("error[{category}]:")).red().bold(),
            style(message).white().bold()
        );
        eprintln!(
            "  {} {}:{}:{}",
            style("-->").cyan(),
            span.file_path,
            span.start.line,
            span.start.column
        );

        if let Some(line) = self.line_tracker.line_text(span.start.line) {
            let line_no = span.start.line.to_string();
            eprintln!("{} {}", style(format!("{line_no} |")).cyan(), line);

            // Underline the span, clamped to this line.
            let start = span.start.column.saturating_sub(1);
            let width = if span.end.line == span.start.line {
                (span.end.column.saturating_sub(span.start.column)).max(1)
            } else {
                line.len().saturating_sub(start).max(1)
            };
            eprintln!(
                "{} {}{}",
                style(format!("{} |", " ".repeat(line_no.len()))).cyan(),
                " ".repeat(start),
                style("^".repeat(width)).red().bold()
            );
        }
    }
}
