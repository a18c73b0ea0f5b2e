//! PostgreSQL SQL dialect.

use super::helpers;
use super::{ScalarCast, SqlDialect};

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    // sqlx only reads NUMERIC into f64 and uuid into String after a cast.
    fn cast_suffix(&self, cast: ScalarCast) -> &'static str {
        match cast {
            ScalarCast::Float => "::double precision",
            ScalarCast::Text => "::text",
        }
    }
}
