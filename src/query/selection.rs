//! Nested field-selection requests.
//!
//! A request is rooted at one top-level field (a table) and carries an
//! ordered tree of field names. It can be written as text:
//!
//! ```text
//! {
//!   customers {
//!     id
//!     address { street }   # commas between fields are optional
//!   }
//! }
//! ```
//!
//! or deserialized from JSON as `{"name": "customers", "selection": [...]}`.

use chumsky::prelude::*;
use serde::{Deserialize, Serialize};

use super::error::{QueryError, QueryResult};

/// One requested field and its nested selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub selection: Vec<Selection>,
}

impl Selection {
    /// A leaf field.
    pub fn field(name: &str) -> Self {
        Self {
            name: name.into(),
            selection: vec![],
        }
    }

    /// A field with a nested selection.
    pub fn nested(name: &str, selection: Vec<Selection>) -> Self {
        Self {
            name: name.into(),
            selection,
        }
    }

    /// Parse the text form.
    pub fn parse(source: &str) -> QueryResult<Self> {
        parser().parse(source).into_result().map_err(|errs| {
            QueryError::MalformedSelection(
                errs.iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.selection.is_empty()
    }
}

impl std::str::FromStr for Selection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selection::parse(s)
    }
}

/// Parser for `{ root { field field { ... } } }`.
fn parser<'src>() -> impl Parser<'src, &'src str, Selection, extra::Err<Rich<'src, char>>> {
    // Comments: # ... until newline
    let comment = just('#')
        .then(any().and_is(just('\n').not()).repeated())
        .padded();
    let trivia = comment.repeated();

    let lbrace = just('{').padded_by(trivia.clone()).padded();
    let rbrace = just('}').padded_by(trivia.clone()).padded();
    let comma = just(',').padded_by(trivia.clone()).padded();

    let name = text::ident()
        .map(|s: &str| s.to_string())
        .padded_by(trivia)
        .padded()
        .labelled("field name");

    let selection = recursive(|selection| {
        let block = selection
            .then_ignore(comma.or_not())
            .repeated()
            .at_least(1)
            .collect::<Vec<_>>()
            .delimited_by(lbrace.clone(), rbrace.clone());

        name.then(block.or_not()).map(|(name, children)| Selection {
            name,
            selection: children.unwrap_or_default(),
        })
    });

    selection
        .delimited_by(lbrace, rbrace)
        .then_ignore(end())
}
