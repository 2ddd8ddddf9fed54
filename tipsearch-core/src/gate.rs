//! Read-only safety gate for generated SQL.
//!
//! The generation model is untrusted input: the prompt asks it for a single
//! SELECT statement, but nothing it promises is believed here. Approval
//! requires all of:
//!
//! 1. the trimmed text begins with the keyword `SELECT` (case-insensitive);
//! 2. the text parses under the Postgres dialect into exactly one statement,
//!    and that statement is a plain query — multiple statements, DDL, DML,
//!    and transaction control all fail this;
//! 3. no write/DDL keyword appears anywhere outside a string literal, which
//!    catches writable CTEs and clauses smuggled past the first token.
//!
//! A statement sqlparser cannot parse is rejected (fail closed). The second
//! independent layer is deployment-side: the execution pool connects with a
//! read-only, single-table credential, so even a gate bypass cannot mutate
//! data (see `DatabaseConfig`).

use sqlparser::ast::Statement;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

use crate::error::TipsearchError;

/// Keywords that must never appear in an approved statement.
const DENIED_KEYWORDS: &[Keyword] = &[
    Keyword::INSERT,
    Keyword::UPDATE,
    Keyword::DELETE,
    Keyword::DROP,
    Keyword::ALTER,
    Keyword::CREATE,
    Keyword::TRUNCATE,
    Keyword::GRANT,
    Keyword::REVOKE,
    Keyword::MERGE,
    Keyword::CALL,
    Keyword::COPY,
    Keyword::EXECUTE,
    Keyword::INTO,
    Keyword::SET,
    Keyword::DO,
];

/// Approve a generated statement for execution, or reject it with
/// `TipsearchError::UnsafeQuery`. Never mutates the statement text.
pub fn approve(sql: &str) -> Result<(), TipsearchError> {
    let trimmed = sql.trim();

    if !trimmed
        .get(..6)
        .map(|s| s.eq_ignore_ascii_case("select"))
        .unwrap_or(false)
    {
        return Err(TipsearchError::UnsafeQuery(
            "generated statement does not begin with SELECT".to_string(),
        ));
    }

    let dialect = PostgreSqlDialect {};

    let statements = Parser::parse_sql(&dialect, trimmed).map_err(|e| {
        TipsearchError::UnsafeQuery(format!("generated statement could not be parsed: {e}"))
    })?;

    if statements.len() != 1 {
        return Err(TipsearchError::UnsafeQuery(format!(
            "expected exactly one statement, found {}",
            statements.len()
        )));
    }

    if !matches!(statements[0], Statement::Query(_)) {
        return Err(TipsearchError::UnsafeQuery(
            "only read-only SELECT statements are allowed".to_string(),
        ));
    }

    // Keyword scan over non-literal tokens. String literals tokenize as
    // their own token kind, so 'delete' inside a search term is fine.
    let tokens = Tokenizer::new(&dialect, trimmed).tokenize().map_err(|e| {
        TipsearchError::UnsafeQuery(format!("generated statement could not be tokenized: {e}"))
    })?;

    for token in &tokens {
        if let Token::Word(word) = token {
            if DENIED_KEYWORDS.contains(&word.keyword) && word.quote_style.is_none() {
                return Err(TipsearchError::UnsafeQuery(format!(
                    "forbidden keyword '{}' in generated statement",
                    word.value
                )));
            }
        }
    }

    Ok(())
}
