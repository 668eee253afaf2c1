// src/parser/ast.rs
use crate::location::source_span::SourceSpan;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Integer { value: u64, span: SourceSpan },
    Variable { name: String, span: SourceSpan },
    Binary { op: BinaryOp, left: Box<Expr>, right: Box<Expr>, span: SourceSpan },
    Assign { name: String, name_span: SourceSpan, value: Box<Expr>, span: SourceSpan },
}

impl Expr {
    #[must_use]
    pub fn span(&self) -> &SourceSpan {
        match self {
            Expr::Integer { span, .. }
            | Expr::Variable { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Assign { span, .. } => span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryOp::Add => f.write_str("+"),
            BinaryOp::Subtract => f.write_str("-"),
            BinaryOp::Multiply => f.write_str("*"),
            BinaryOp::Divide => f.write_str("/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block { statements: Vec<Stmt>, span: SourceSpan },
    If { condition: Expr, then_branch: Box<Stmt>, else_branch: Option<Box<Stmt>>, span: SourceSpan },
    While { condition: Expr, body: Box<Stmt>, span: SourceSpan },
    Return { value: Option<Expr>, span: SourceSpan },
    VarDecl { name: String, init: Expr, span: SourceSpan },
    Expression { expr: Expr },
}

/// A parsed `int <name>() { ... }` definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: SourceSpan,
}
