//! Lock strings: parsing and structure
//!
//! ```text
//! cmd: perm(Builder) or id(#3); get, drop: not holds(anchor)
//! ```
//!
//! A lock string is a `;`-separated list of clauses. Each clause names one or
//! more access types before the `:` and a boolean expression after it. The
//! expression is a flat chain of predicate calls joined by `and`/`or`, each
//! optionally negated with `not` (keywords are case-insensitive). `not` binds
//! tightest, then `and`, then `or`.
//!
//! Parsing never fails as a whole. A clause whose expression is malformed is
//! kept as [`ClauseBody::Malformed`] so that evaluating it denies, and a
//! segment without an access-type header is recorded in
//! [`LockString::errors`] and otherwise ignored.

use crate::error::{LockError, LockResult};
use crate::lexer::{Lexer, Token, TokenKind};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// One predicate call, `name(arg, key=value, ...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateCall {
    /// Lowercased predicate name
    pub name: String,
    pub args: Vec<String>,
    pub kwargs: BTreeMap<String, String>,
}

/// Boolean expression over predicate calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockExpr {
    Call(PredicateCall),
    Not(Box<LockExpr>),
    And(Box<LockExpr>, Box<LockExpr>),
    Or(Box<LockExpr>, Box<LockExpr>),
}

impl LockExpr {
    /// Parse an expression (the part after `access_type:`)
    pub fn parse(source: &str) -> LockResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        let mut parser = ExprParser {
            source,
            tokens,
            pos: 0,
        };
        let expr = parser.parse_or()?;
        let trailing = parser.peek();
        if trailing.kind != TokenKind::Eof {
            return Err(LockError::parse(
                source,
                trailing.offset,
                format!("expected 'and', 'or' or end of lock, found '{}'", trailing.text),
            ));
        }
        Ok(expr)
    }

    /// Every predicate call in the expression, left to right
    pub fn calls(&self) -> Vec<&PredicateCall> {
        let mut calls = Vec::new();
        self.collect_calls(&mut calls);
        calls
    }

    fn collect_calls<'a>(&'a self, out: &mut Vec<&'a PredicateCall>) {
        match self {
            Self::Call(call) => out.push(call),
            Self::Not(inner) => inner.collect_calls(out),
            Self::And(lhs, rhs) | Self::Or(lhs, rhs) => {
                lhs.collect_calls(out);
                rhs.collect_calls(out);
            }
        }
    }

    /// Evaluate with short-circuiting, left to right
    pub fn evaluate<F>(&self, eval_call: &mut F) -> LockResult<bool>
    where
        F: FnMut(&PredicateCall) -> LockResult<bool>,
    {
        match self {
            Self::Call(call) => eval_call(call),
            Self::Not(inner) => Ok(!inner.evaluate(eval_call)?),
            Self::And(lhs, rhs) => Ok(lhs.evaluate(eval_call)? && rhs.evaluate(eval_call)?),
            Self::Or(lhs, rhs) => Ok(lhs.evaluate(eval_call)? || rhs.evaluate(eval_call)?),
        }
    }
}

struct ExprParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser<'_> {
    fn peek(&self) -> &Token {
        // tokenize() always ends with Eof
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, token: &Token, message: impl Into<String>) -> LockError {
        LockError::parse(self.source, token.offset, message)
    }

    fn parse_or(&mut self) -> LockResult<LockExpr> {
        let mut lhs = self.parse_and()?;
        while self.peek().is_keyword("or") {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = LockExpr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> LockResult<LockExpr> {
        let mut lhs = self.parse_unary()?;
        while self.peek().is_keyword("and") {
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = LockExpr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> LockResult<LockExpr> {
        if self.peek().is_keyword("not") {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(LockExpr::Not(Box::new(inner)));
        }
        self.parse_call().map(LockExpr::Call)
    }

    fn parse_call(&mut self) -> LockResult<PredicateCall> {
        let name_tok = self.advance();
        if name_tok.kind != TokenKind::Word || !is_identifier(&name_tok.text) {
            return Err(self.error(
                &name_tok,
                format!("expected predicate name, found {}", describe(&name_tok)),
            ));
        }
        if ["and", "or"].iter().any(|kw| name_tok.is_keyword(kw)) {
            return Err(self.error(&name_tok, format!("dangling '{}'", name_tok.text)));
        }

        let open = self.advance();
        if open.kind != TokenKind::OpenParen {
            return Err(self.error(
                &open,
                format!("expected '(' after '{}', found {}", name_tok.text, describe(&open)),
            ));
        }

        let mut call = PredicateCall {
            name: name_tok.text.to_lowercase(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
        };

        if self.peek().kind == TokenKind::CloseParen {
            self.advance();
            return Ok(call);
        }

        loop {
            self.parse_argument(&mut call)?;
            let sep = self.advance();
            match sep.kind {
                TokenKind::Comma => continue,
                TokenKind::CloseParen => break,
                _ => {
                    return Err(self.error(
                        &sep,
                        format!(
                            "expected ',' or ')' in call to '{}', found {}",
                            call.name,
                            describe(&sep)
                        ),
                    ))
                }
            }
        }
        Ok(call)
    }

    /// One argument: a quoted string, or a run of words joined by single spaces
    fn parse_argument(&mut self, call: &mut PredicateCall) -> LockResult<()> {
        let first = self.peek().clone();
        match first.kind {
            TokenKind::Quoted => {
                self.advance();
                call.args.push(first.text);
                Ok(())
            }
            TokenKind::Word => {
                let mut words = Vec::new();
                while self.peek().kind == TokenKind::Word {
                    words.push(self.advance().text);
                }
                let raw = words.join(" ");
                match raw.split_once('=') {
                    Some((key, value)) if is_identifier(key.trim()) => {
                        let mut value = value.trim().to_string();
                        if value.is_empty() && self.peek().kind == TokenKind::Quoted {
                            value = self.advance().text;
                        }
                        call.kwargs.insert(key.trim().to_lowercase(), value);
                    }
                    _ => call.args.push(raw),
                }
                Ok(())
            }
            _ => Err(self.error(
                &first,
                format!("expected argument to '{}', found {}", call.name, describe(&first)),
            )),
        }
    }
}

fn describe(token: &Token) -> String {
    match token.kind {
        TokenKind::Word | TokenKind::Quoted => format!("'{}'", token.text),
        kind => kind.to_string(),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The body of one clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClauseBody {
    Expr(LockExpr),
    /// Kept so that evaluation of this access type denies
    Malformed(LockError),
}

/// `access_type: expression`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockClause {
    /// Lowercased access type
    pub access_type: String,
    /// Expression text as written, trimmed
    pub source: String,
    pub body: ClauseBody,
}

impl LockClause {
    fn new(access_type: &str, source: &str) -> Self {
        let source = source.trim().to_string();
        let body = match LockExpr::parse(&source) {
            Ok(expr) => ClauseBody::Expr(expr),
            Err(err) => ClauseBody::Malformed(err),
        };
        Self {
            access_type: access_type.to_lowercase(),
            source,
            body,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self.body, ClauseBody::Malformed(_))
    }
}

/// A parsed lock string
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockString {
    clauses: Vec<LockClause>,
    errors: Vec<LockError>,
}

impl LockString {
    /// Parse a lock string, keeping malformed clauses as denials
    pub fn parse(raw: &str) -> Self {
        let mut lock = Self::default();
        for (segment, offset) in split_outside(raw, ';') {
            if segment.trim().is_empty() {
                continue;
            }
            let Some((header, expr)) = split_once_outside(segment, ':') else {
                let err = LockError::parse(raw, offset, "clause has no 'access_type:' header");
                warn!(lock = %raw, error = %err, "Ignoring lock clause");
                lock.errors.push(err);
                continue;
            };

            for access_type in header.split(',').map(str::trim) {
                if !is_identifier(access_type) {
                    let err = LockError::parse(
                        raw,
                        offset,
                        format!("invalid access type '{}'", access_type),
                    );
                    warn!(lock = %raw, error = %err, "Ignoring lock clause");
                    lock.errors.push(err);
                    continue;
                }
                let clause = LockClause::new(access_type, expr);
                if let ClauseBody::Malformed(err) = &clause.body {
                    warn!(lock = %raw, access_type, error = %err, "Malformed lock clause will deny");
                }
                lock.insert(clause);
            }
        }
        lock
    }

    /// Parse, failing on the first problem of any kind
    pub fn parse_strict(raw: &str) -> LockResult<Self> {
        let lock = Self::parse(raw);
        if let Some(err) = lock.errors.first() {
            return Err(err.clone());
        }
        for clause in &lock.clauses {
            if let ClauseBody::Malformed(err) = &clause.body {
                return Err(err.clone());
            }
        }
        Ok(lock)
    }

    fn insert(&mut self, clause: LockClause) {
        if let Some(existing) = self
            .clauses
            .iter_mut()
            .find(|c| c.access_type == clause.access_type)
        {
            warn!(
                access_type = %clause.access_type,
                replaced = %existing.source,
                "Duplicate access type in lock string, later clause wins"
            );
            *existing = clause;
        } else {
            self.clauses.push(clause);
        }
    }

    /// Clause governing `access_type`, if any
    pub fn clause(&self, access_type: &str) -> Option<&LockClause> {
        self.clauses
            .iter()
            .find(|c| c.access_type.eq_ignore_ascii_case(access_type))
    }

    pub fn has(&self, access_type: &str) -> bool {
        self.clause(access_type).is_some()
    }

    pub fn access_types(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|c| c.access_type.as_str())
    }

    pub fn clauses(&self) -> &[LockClause] {
        &self.clauses
    }

    /// Problems with clause headers found while parsing
    pub fn errors(&self) -> &[LockError] {
        &self.errors
    }

    /// Add or replace the clause for `access_type`
    pub fn set(&mut self, access_type: &str, expr: &str) -> LockResult<()> {
        if !is_identifier(access_type.trim()) {
            return Err(LockError::parse(access_type, 0, "invalid access type"));
        }
        let expr = LockExpr::parse(expr.trim())?;
        let clause = LockClause {
            access_type: access_type.trim().to_lowercase(),
            source: render(&expr),
            body: ClauseBody::Expr(expr),
        };
        self.insert(clause);
        Ok(())
    }

    /// Remove the clause for `access_type`. Returns false if there was none.
    pub fn remove(&mut self, access_type: &str) -> bool {
        let before = self.clauses.len();
        self.clauses
            .retain(|c| !c.access_type.eq_ignore_ascii_case(access_type));
        self.clauses.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl fmt::Display for LockString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, clause) in self.clauses.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", clause.access_type, clause.source)?;
        }
        Ok(())
    }
}

fn render(expr: &LockExpr) -> String {
    match expr {
        LockExpr::Call(call) => {
            let mut parts: Vec<String> = call.args.iter().map(|a| quote_if_needed(a)).collect();
            parts.extend(
                call.kwargs
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, quote_if_needed(v))),
            );
            format!("{}({})", call.name, parts.join(", "))
        }
        LockExpr::Not(inner) => format!("not {}", render(inner)),
        LockExpr::And(lhs, rhs) => format!("{} and {}", render(lhs), render(rhs)),
        LockExpr::Or(lhs, rhs) => format!("{} or {}", render(lhs), render(rhs)),
    }
}

/// Quote `arg` whenever a bare word would parse back differently
///
/// Parsed arguments never hold both quote characters, so one of them is
/// always free to delimit.
fn quote_if_needed(arg: &str) -> String {
    let special = |c: char| {
        c.is_whitespace() || matches!(c, '(' | ')' | ',' | '\'' | '"' | ';' | ':' | '=')
    };
    if !arg.is_empty() && !arg.contains(special) {
        return arg.to_string();
    }
    let quote = if arg.contains('"') { '\'' } else { '"' };
    format!("{quote}{arg}{quote}")
}

/// Split on `sep` where it is not inside quotes or parentheses, returning each
/// piece with its byte offset
fn split_outside(raw: &str, sep: char) -> Vec<(&str, usize)> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, ch) in raw.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, c) if c == sep && depth == 0 => {
                pieces.push((&raw[start..i], start));
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push((&raw[start..], start));
    pieces
}

fn split_once_outside(raw: &str, sep: char) -> Option<(&str, &str)> {
    let pieces = split_outside(raw, sep);
    if pieces.len() < 2 {
        return None;
    }
    let (_, second_offset) = pieces[1];
    Some((&raw[..second_offset - sep.len_utf8()], &raw[second_offset..]))
}
