// src/isel/rules.rs
//! The declarative rewrite-rule table driving instruction selection.
//!
//! Grammar (comments `//…` run to end of line):
//!
//! ```text
//! rule    := pattern "->" pattern
//! pattern := op [":" binding] [ "(" pattern ("," pattern)* ")" ] | string
//! ```
//!
//! On the input side a parenthesized operator checks the node kind and
//! recurses; a bare identifier is a named wildcard leaf that matches any
//! input and names it for the output side. `op:binding` names the matched
//! node so a string literal in the output (currently only the payload
//! expression `imm(binding)`) can lift its constant into an immediate.
use crate::ir::node::NodeKind;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("rule table error on line {line}: {message}")]
pub struct RuleError {
    pub message: String,
    pub line: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    /// An operator pattern. `parenthesized` records whether a child list
    /// was written: `constant:c()` kind-checks a subtree position, while a
    /// bare rule root like `constant:c` only names the bucket.
    Op { kind: NodeKind, binding: Option<String>, children: Vec<Pattern>, parenthesized: bool },
    /// A bare identifier in a child position: matches any input node and
    /// names it for output wiring.
    Wildcard(String),
    /// A code literal in an output pattern; see [`parse_payload`].
    Literal(String),
}

impl Pattern {
    /// Number of parenthesized operator patterns in this tree: the tie
    /// breaker that makes more specific rules win.
    #[must_use]
    pub fn subtree_count(&self) -> u32 {
        match self {
            Pattern::Op { children, parenthesized, .. } => {
                u32::from(*parenthesized) + children.iter().map(Pattern::subtree_count).sum::<u32>()
            }
            Pattern::Wildcard(_) | Pattern::Literal(_) => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    /// Declaration index within the operator's bucket.
    pub id: u32,
    pub input: Pattern,
    pub output: Pattern,
    pub subtree_count: u32,
}

/// All rules, bucketed by the input root's node kind and ordered within
/// each bucket by descending subtree count, declaration order breaking
/// ties.
#[derive(Debug, Default)]
pub struct RuleTable {
    buckets: HashMap<NodeKind, Vec<Rule>>,
}

impl RuleTable {
    /// Parses a rule file. Errors carry the offending line.
    pub fn parse(text: &str) -> Result<RuleTable, RuleError> {
        let mut parser = Parser { lexer: Lexer { src: text, pos: 0, line: 1 }, peeked: None };
        let mut table = RuleTable::default();

        while parser.peek()?.kind != TokKind::Eof {
            let (root, rule) = parser.parse_rule(&table)?;
            table.buckets.entry(root).or_default().push(rule);
        }

        for bucket in table.buckets.values_mut() {
            bucket.sort_by(|a, b| b.subtree_count.cmp(&a.subtree_count));
        }
        Ok(table)
    }

    #[must_use]
    pub fn rules_for(&self, kind: NodeKind) -> &[Rule] {
        self.buckets.get(&kind).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn operator_count(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Renders the compiled table back into the rule grammar, normalized:
    /// one bucket per operator, rules in match order, ids annotated. The
    /// output round-trips through [`RuleTable::parse`].
    #[must_use]
    pub fn render(&self) -> String {
        let mut kinds: Vec<NodeKind> = self.buckets.keys().copied().collect();
        kinds.sort_by_key(|k| k.label());

        let mut out = String::new();
        let _ = writeln!(
            out,
            "// generated selector table: {} operators, {} rules",
            self.operator_count(),
            self.rule_count()
        );
        for kind in kinds {
            let _ = writeln!(out);
            let _ = writeln!(out, "// {}", kind.label());
            for rule in &self.buckets[&kind] {
                let _ = writeln!(
                    out,
                    "{} -> {} // rule {}, subtrees {}",
                    rule.input, rule.output, rule.id, rule.subtree_count
                );
            }
        }
        out
    }
}

/// The table for the x86-32 target, parsed once from the embedded rule
/// file.
///
/// # Panics
/// Panics if the embedded file is malformed; that is a build defect, not a
/// runtime condition.
pub fn x64_rules() -> &'static RuleTable {
    static TABLE: OnceLock<RuleTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        RuleTable::parse(include_str!("x64.pats")).expect("embedded x64 rule table is well-formed")
    })
}

/// Parses a payload literal of the form `imm(binding)`, returning the
/// binding name.
#[must_use]
pub fn parse_payload(literal: &str) -> Option<&str> {
    let rest = literal.trim().strip_prefix("imm(")?;
    let name = rest.strip_suffix(')')?.trim();
    (!name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
        .then_some(name)
}

// Lexing.

#[derive(Debug, Clone, PartialEq)]
enum TokKind {
    Ident(String),
    Str(String),
    Arrow,
    LParen,
    RParen,
    Comma,
    Colon,
    Eof,
}

#[derive(Debug, Clone)]
struct Tok {
    kind: TokKind,
    line: u32,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
}

impl Lexer<'_> {
    fn error(&self, message: impl Into<String>) -> RuleError {
        RuleError { message: message.into(), line: self.line }
    }

    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn bump(&mut self, c: char) {
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.bump(c);
            } else if rest.starts_with("//") {
                while let Some(c) = self.rest().chars().next() {
                    if c == '\n' {
                        break;
                    }
                    self.bump(c);
                }
            } else {
                return;
            }
        }
    }

    fn next_token(&mut self) -> Result<Tok, RuleError> {
        self.skip_trivia();
        let line = self.line;

        let Some(c) = self.rest().chars().next() else {
            return Ok(Tok { kind: TokKind::Eof, line });
        };

        let kind = match c {
            '(' => {
                self.bump(c);
                TokKind::LParen
            }
            ')' => {
                self.bump(c);
                TokKind::RParen
            }
            ',' => {
                self.bump(c);
                TokKind::Comma
            }
            ':' => {
                self.bump(c);
                TokKind::Colon
            }
            '-' => {
                self.bump(c);
                if self.rest().starts_with('>') {
                    self.bump('>');
                    TokKind::Arrow
                } else {
                    return Err(self.error("expected '->'"));
                }
            }
            '"' => {
                self.bump(c);
                let start = self.pos;
                loop {
                    match self.rest().chars().next() {
                        None | Some('\n') => {
                            return Err(RuleError {
                                message: "unterminated string".to_string(),
                                line,
                            });
                        }
                        Some('"') => break,
                        Some(c) => self.bump(c),
                    }
                }
                let text = self.src[start..self.pos].to_string();
                self.bump('"');
                TokKind::Str(text)
            }
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let start = self.pos;
                while let Some(c) = self
                    .rest()
                    .chars()
                    .next()
                    .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
                {
                    self.bump(c);
                }
                TokKind::Ident(self.src[start..self.pos].to_string())
            }
            c => return Err(self.error(format!("unexpected character {c:?}"))),
        };

        Ok(Tok { kind, line })
    }
}

// Parsing.

struct Parser<'a> {
    lexer: Lexer<'a>,
    peeked: Option<Tok>,
}

impl Parser<'_> {
    fn next(&mut self) -> Result<Tok, RuleError> {
        match self.peeked.take() {
            Some(tok) => Ok(tok),
            None => self.lexer.next_token(),
        }
    }

    fn peek(&mut self) -> Result<&Tok, RuleError> {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token()?);
        }
        Ok(self.peeked.as_ref().expect("just filled"))
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, u32), RuleError> {
        let tok = self.next()?;
        match tok.kind {
            TokKind::Ident(name) => Ok((name, tok.line)),
            other => Err(RuleError {
                message: format!("expected {what}, found {other:?}"),
                line: tok.line,
            }),
        }
    }

    fn parse_rule(&mut self, table: &RuleTable) -> Result<(NodeKind, Rule), RuleError> {
        let input = self.parse_pattern(true, true)?;

        let arrow = self.next()?;
        if arrow.kind != TokKind::Arrow {
            return Err(RuleError {
                message: "expected '->' between input and output patterns".to_string(),
                line: arrow.line,
            });
        }

        let output = self.parse_pattern(false, true)?;

        let root = match &input {
            Pattern::Op { kind, .. } => *kind,
            _ => unreachable!("a root pattern always parses as an operator"),
        };
        let line = self.lexer.line;
        validate_rule(&input, &output).map_err(|message| RuleError { message, line })?;

        let id = u32::try_from(table.rules_for(root).len()).expect("rule count fits in u32");
        let subtree_count = input.subtree_count();
        Ok((root, Rule { id, input, output, subtree_count }))
    }

    fn parse_pattern(&mut self, is_input: bool, is_root: bool) -> Result<Pattern, RuleError> {
        if let TokKind::Str(_) = self.peek()?.kind {
            let tok = self.next()?;
            let TokKind::Str(text) = tok.kind else { unreachable!() };
            if is_input {
                return Err(RuleError {
                    message: "string literals are only allowed in output patterns".to_string(),
                    line: tok.line,
                });
            }
            return Ok(Pattern::Literal(text));
        }

        let (name, line) = self.expect_ident("an operator name")?;

        let binding = if self.peek()?.kind == TokKind::Colon {
            self.next()?;
            Some(self.expect_ident("a binding name")?.0)
        } else {
            None
        };

        let mut parenthesized = false;
        let mut children = Vec::new();
        if self.peek()?.kind == TokKind::LParen {
            self.next()?;
            parenthesized = true;
            while self.peek()?.kind != TokKind::RParen {
                if !children.is_empty() {
                    let comma = self.next()?;
                    if comma.kind != TokKind::Comma {
                        return Err(RuleError {
                            message: "expected ',' between child patterns".to_string(),
                            line: comma.line,
                        });
                    }
                }
                children.push(self.parse_pattern(is_input, false)?);
            }
            self.next()?; // ')'
        }

        if is_root || parenthesized {
            let kind = NodeKind::from_rule_name(&name).ok_or_else(|| RuleError {
                message: format!("unknown operator '{name}'"),
                line,
            })?;
            Ok(Pattern::Op { kind, binding, children, parenthesized })
        } else {
            if binding.is_some() {
                return Err(RuleError {
                    message: format!(
                        "wildcard leaf '{name}' cannot carry a binding; write '{name}:b()' to \
                         match an operator"
                    ),
                    line,
                });
            }
            Ok(Pattern::Wildcard(name))
        }
    }
}

/// Structural checks tying a rule's two sides together: unique leaf and
/// binding names on the input side; output wildcards referring to input
/// leaves; payload literals referring to input bindings; output
/// constructors being target operators with the right number of inputs and
/// at most one payload.
fn validate_rule(input: &Pattern, output: &Pattern) -> Result<(), String> {
    let mut leaves = HashSet::new();
    let mut bindings = HashSet::new();
    collect_input_names(input, &mut leaves, &mut bindings)?;

    if let Pattern::Op { kind, .. } = input {
        if kind.is_target() {
            return Err(format!("input root {} is already a target operator", kind.label()));
        }
    }

    check_output(output, &leaves, &bindings)
}

fn collect_input_names(
    pattern: &Pattern,
    leaves: &mut HashSet<String>,
    bindings: &mut HashSet<String>,
) -> Result<(), String> {
    match pattern {
        Pattern::Op { binding, children, .. } => {
            if let Some(binding) = binding {
                if !bindings.insert(binding.clone()) {
                    return Err(format!("duplicate binding '{binding}'"));
                }
            }
            for child in children {
                collect_input_names(child, leaves, bindings)?;
            }
            Ok(())
        }
        Pattern::Wildcard(name) => {
            if !leaves.insert(name.clone()) {
                return Err(format!("duplicate leaf name '{name}'"));
            }
            Ok(())
        }
        Pattern::Literal(_) => Err("string literals are only allowed in output patterns".into()),
    }
}

fn check_output(
    pattern: &Pattern,
    leaves: &HashSet<String>,
    bindings: &HashSet<String>,
) -> Result<(), String> {
    match pattern {
        Pattern::Wildcard(name) => {
            if !leaves.contains(name) {
                return Err(format!("output refers to unknown input leaf '{name}'"));
            }
            Ok(())
        }
        Pattern::Literal(text) => {
            let binding = parse_payload(text)
                .ok_or_else(|| format!("malformed payload literal \"{text}\""))?;
            if !bindings.contains(binding) {
                return Err(format!("payload refers to unknown binding '{binding}'"));
            }
            Ok(())
        }
        Pattern::Op { kind, children, .. } => {
            if !kind.is_target() {
                return Err(format!("output constructor {} is not a target operator", kind.label()));
            }
            let literals = children.iter().filter(|c| matches!(c, Pattern::Literal(_))).count();
            if literals > 1 {
                return Err(format!("{} takes at most one payload literal", kind.label()));
            }
            let inputs = children.len() - literals;
            if inputs != kind.target_input_count() {
                return Err(format!(
                    "{} takes {} inputs, rule supplies {inputs}",
                    kind.label(),
                    kind.target_input_count()
                ));
            }
            for child in children {
                check_output(child, leaves, bindings)?;
            }
            Ok(())
        }
    }
}

fn rule_name(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::X64Mov32Ri => "mov32_ri",
        NodeKind::X64Mov32Rr => "mov32_rr",
        NodeKind::X64Mov32Rm => "mov32_rm",
        NodeKind::X64Mov32Mr => "mov32_mr",
        NodeKind::X64Mov32Mi => "mov32_mi",
        NodeKind::X64Add32Ri => "add32_ri",
        NodeKind::X64Add32Rr => "add32_rr",
        NodeKind::X64Sub32Rr => "sub32_rr",
        NodeKind::X64Mul32Rr => "mul32_rr",
        NodeKind::X64Idiv32Rr => "idiv32_rr",
        NodeKind::X64Kill32 => "kill32",
        NodeKind::X64Branch32 => "branch32",
        NodeKind::X64End32 => "end32",
        NodeKind::Start => "start",
        NodeKind::StartCtrl => "start_ctrl",
        NodeKind::StartMem => "start_mem",
        NodeKind::End => "end",
        NodeKind::Region => "region",
        NodeKind::Phi => "phi",
        NodeKind::Branch => "branch",
        NodeKind::BranchTrue => "branch_true",
        NodeKind::BranchFalse => "branch_false",
        NodeKind::Constant => "constant",
        NodeKind::Alloca => "alloca",
        NodeKind::Load => "load",
        NodeKind::Store => "store",
        NodeKind::Add => "add",
        NodeKind::Sub => "sub",
        NodeKind::Mul => "mul",
        NodeKind::Sdiv => "sdiv",
        NodeKind::Uninitialized => "uninitialized",
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Wildcard(name) => f.write_str(name),
            Pattern::Literal(text) => write!(f, "\"{text}\""),
            Pattern::Op { kind, binding, children, parenthesized } => {
                f.write_str(rule_name(*kind))?;
                if let Some(binding) = binding {
                    write!(f, ":{binding}")?;
                }
                if *parenthesized {
                    f.write_char('(')?;
                    for (i, child) in children.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{child}")?;
                    }
                    f.write_char(')')?;
                }
                Ok(())
            }
        }
    }
}
