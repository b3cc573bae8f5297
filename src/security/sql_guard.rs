//! Gate for caller-supplied and generated SQL.
//!
//! Only a single read-only query is let through, and every statement that
//! leaves the guard is bounded by a row limit. The limit is appended to the
//! caller's own text rather than to a re-serialized AST so vendor syntax and
//! formatting reach the server mostly untouched.
//!
//! Before parsing, the text is lexed the way the MySQL server lexes it and
//! normalized so the parser and the server cannot read it differently:
//! comments are removed and a `--` that MySQL treats as two minus signs is
//! spaced out to `- -`. The normalized text is what gets executed.

use std::iter::Peekable;
use std::str::CharIndices;

use serde::Serialize;
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Row bound applied to statements that carry no `LIMIT` of their own.
pub const DEFAULT_ROW_LIMIT: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("SQL query is required")]
    SqlRequired,

    #[error("SQL query cannot be empty")]
    SqlEmpty,

    #[error("Multiple SQL statements are not allowed")]
    MultipleStatementsNotAllowed,

    #[error("Invalid SQL syntax: {0}")]
    InvalidSqlSyntax(String),

    #[error("Only SELECT statements are allowed")]
    OnlySelectStatementsAllowed,

    #[error("SELECT ... INTO is not allowed")]
    SelectIntoNotAllowed,

    #[error("Locking reads (FOR UPDATE / FOR SHARE) are not allowed")]
    LockingReadNotAllowed,

    #[error("Executable comments (/*! ... */) are not allowed")]
    ExecutableCommentNotAllowed,

    #[error("Use LIMIT to bound rows; FETCH and OFFSET without LIMIT are not supported")]
    UnsupportedRowBound,
}

/// A validated, limit-bounded statement ready for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSql {
    pub sql: String,
    pub had_existing_limit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlGuard {
    row_limit: u64,
}

impl Default for SqlGuard {
    fn default() -> Self {
        Self::new(DEFAULT_ROW_LIMIT)
    }
}

impl SqlGuard {
    pub fn new(row_limit: u64) -> Self {
        Self { row_limit }
    }

    pub fn row_limit(&self) -> u64 {
        self.row_limit
    }

    /// Validate `sql` and bound its result size.
    pub fn parse_sql(&self, sql: &str) -> Result<ParsedSql, GuardError> {
        if sql.is_empty() {
            return Err(GuardError::SqlRequired);
        }
        if sql.trim().is_empty() {
            return Err(GuardError::SqlEmpty);
        }

        let statements = split_statements(sql)?;
        let statement = match statements.as_slice() {
            [] => return Err(GuardError::SqlEmpty),
            [single] => single.as_str(),
            _ => return Err(GuardError::MultipleStatementsNotAllowed),
        };

        let mut parsed = Parser::parse_sql(&MySqlDialect {}, statement)
            .map_err(|e| GuardError::InvalidSqlSyntax(e.to_string()))?;
        if parsed.len() != 1 {
            return Err(GuardError::MultipleStatementsNotAllowed);
        }

        let query = match parsed.remove(0) {
            Statement::Query(query) => query,
            _ => return Err(GuardError::OnlySelectStatementsAllowed),
        };
        ensure_read_only(&query)?;
        if query.fetch.is_some() || (query.limit.is_none() && query.offset.is_some()) {
            return Err(GuardError::UnsupportedRowBound);
        }

        if query.limit.is_some() {
            return Ok(ParsedSql {
                sql: statement.to_string(),
                had_existing_limit: true,
            });
        }

        Ok(ParsedSql {
            sql: format!("{statement} LIMIT {}", self.row_limit),
            had_existing_limit: false,
        })
    }
}

type CharStream<'a> = Peekable<CharIndices<'a>>;

/// Split `sql` on top-level semicolons the way the MySQL server lexes it.
///
/// Comments are dropped (a comment between tokens leaves one space behind),
/// a `--` that does not open a comment becomes `- -`, and quoted text is
/// copied verbatim. Each statement is trimmed; empty ones are skipped.
fn split_statements(sql: &str) -> Result<Vec<String>, GuardError> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = sql.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        match c {
            ';' => finish_statement(&mut statements, &mut current),
            '#' => {
                skip_line(&mut chars);
                separate(&mut current);
            }
            '-' if starts_dash_comment(sql, idx) => {
                skip_line(&mut chars);
                separate(&mut current);
            }
            '-' if matches!(chars.peek(), Some((_, '-'))) => current.push_str("- "),
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                if is_executable_comment(&sql[idx + 2..]) {
                    return Err(GuardError::ExecutableCommentNotAllowed);
                }
                skip_block_comment(&mut chars);
                separate(&mut current);
            }
            '\'' | '"' | '`' => {
                let end = skip_quoted(&mut chars, c).unwrap_or(sql.len());
                current.push_str(&sql[idx..end]);
            }
            c => current.push(c),
        }
    }

    finish_statement(&mut statements, &mut current);
    Ok(statements)
}

fn finish_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}

/// Keep the tokens on either side of a removed comment apart.
fn separate(current: &mut String) {
    if current.chars().last().is_some_and(|c| !c.is_whitespace()) {
        current.push(' ');
    }
}

/// `/*!` (MySQL) and `/*M!` (MariaDB) bodies are executed by the server.
fn is_executable_comment(body: &str) -> bool {
    body.starts_with('!') || body.starts_with("M!")
}

/// MySQL only treats `--` as a comment when followed by whitespace or end of input.
fn starts_dash_comment(sql: &str, idx: usize) -> bool {
    let rest = &sql[idx..];
    rest.starts_with("--")
        && rest[2..]
            .chars()
            .next()
            .map_or(true, |c| c.is_whitespace() || c.is_control())
}

fn skip_line(chars: &mut CharStream<'_>) {
    for (_, c) in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn skip_block_comment(chars: &mut CharStream<'_>) {
    while let Some((_, c)) = chars.next() {
        if c == '*' && matches!(chars.peek(), Some((_, '/'))) {
            chars.next();
            break;
        }
    }
}

/// Byte offset just past the closing quote, or `None` when unterminated.
fn skip_quoted(chars: &mut CharStream<'_>, quote: char) -> Option<usize> {
    while let Some((idx, c)) = chars.next() {
        if c == '\\' && quote != '`' {
            chars.next();
            continue;
        }
        if c == quote {
            return Some(idx + c.len_utf8());
        }
    }
    None
}

fn ensure_read_only(query: &Query) -> Result<(), GuardError> {
    if !query.locks.is_empty() {
        return Err(GuardError::LockingReadNotAllowed);
    }
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            ensure_read_only(&cte.query)?;
        }
    }
    ensure_read_only_body(&query.body)
}

fn ensure_read_only_body(body: &SetExpr) -> Result<(), GuardError> {
    match body {
        SetExpr::Select(select) => match select.into {
            Some(_) => Err(GuardError::SelectIntoNotAllowed),
            None => Ok(()),
        },
        SetExpr::Query(inner) => ensure_read_only(inner),
        SetExpr::SetOperation { left, right, .. } => {
            ensure_read_only_body(left)?;
            ensure_read_only_body(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => Ok(()),
        _ => Err(GuardError::OnlySelectStatementsAllowed),
    }
}
