//! SQL generation module.
//!
//! A small type-safe builder for the statements the query compiler emits.
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - Expression AST and builder DSL
//! - [`token`] - Token types for SQL generation
//! - [`dialect`] - SQL dialect implementations

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, ScalarCast, SqlDialect};
pub use expr::{table_col, BinaryOperator, Expr, ExprExt, Literal};
pub use query::{Join, OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
