//! SQL Dialect definitions and formatting rules.
//!
//! The compiler only emits SELECT statements with joins, `IN` lists and
//! ordering, so the dialect surface is limited to quoting and literal
//! formatting:
//!
//! - Identifier quoting: `"` for both SQLite and PostgreSQL
//! - Boolean literals: `true`/`false` (PostgreSQL) vs `1`/`0` (SQLite)
//! - String literals: single quotes with `''` escaping
//! - Decode casts: PostgreSQL converts `NUMERIC`/`UUID`-like columns in the
//!   SELECT list so the driver can read them as `f64`/`String`

mod helpers;
mod postgres;
mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

/// Conversion applied to a selected column before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarCast {
    /// Read as a double-precision float.
    Float,
    /// Read as text.
    Text,
}

/// SQL dialect trait - defines how SQL constructs are rendered.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    /// Quote an identifier (table, column, alias).
    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    /// Format a boolean literal.
    fn format_bool(&self, b: bool) -> &'static str;

    /// Format a NULL literal.
    fn format_null(&self) -> &'static str {
        "NULL"
    }

    /// Postfix cast appended to a selected column. Empty by default.
    fn cast_suffix(&self, _cast: ScalarCast) -> &'static str {
        ""
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
        }
    }
}

impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_null(&self) -> &'static str {
        self.dialect().format_null()
    }

    fn cast_suffix(&self, cast: ScalarCast) -> &'static str {
        self.dialect().cast_suffix(cast)
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(format!("unsupported dialect: {}", other)),
        }
    }
}
