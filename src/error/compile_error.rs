// src/error/compile_error.rs
use crate::location::source_span::SourceSpan;
use thiserror::Error;

/// A user error: something wrong with the input program or with reading it.
/// Every variant except I/O carries the source span it was detected at.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("{message} at {span}")]
    Lexer { message: String, span: SourceSpan },

    #[error("syntax error: {message} at {span}")]
    Syntax { message: String, span: SourceSpan },

    #[error("semantic error: {message} at {span}")]
    Semantic { message: String, span: SourceSpan },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompileError {
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            CompileError::Lexer { message, .. }
            | CompileError::Syntax { message, .. }
            | CompileError::Semantic { message, .. } => Some(message),
            CompileError::Io(_) => None,
        }
    }

    #[must_use]
    pub fn span(&self) -> Option<&SourceSpan> {
        match self {
            CompileError::Lexer { span, .. }
            | CompileError::Syntax { span, .. }
            | CompileError::Semantic { span, .. } => Some(span),
            CompileError::Io(_) => None,
        }
    }
}
