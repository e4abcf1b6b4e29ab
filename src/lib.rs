//! # litemodel
//!
//! > **Declare the schema. Skip the SQL.**
//!
//! litemodel binds a static schema descriptor to an SQLite file and turns
//! keyword-style filters into parameterized SQL.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use litemodel::prelude::*;
//!
//! let schema = DbSchema::new("reviews.db").with_table(
//!     TableSchema::new("reviews")
//!         .field("rid", "uuid")
//!         .field("header", "text")
//!         .field("rating", "int")
//!         .field("desc", "text")
//!         .primary_key("rid")
//!         .default_table(),
//! );
//!
//! let mut model = Model::open(schema).await?;
//! model.write(&Record::new().set("rid", 1).set("header", "good").set("rating", 5)).await?;
//!
//! let rows = model.read(&Filter::new().eq("rid", 1)).await?;
//! // => [(1, 'good', 5, '')]
//! model.close().await?;
//! ```
//!
//! ## Filters
//!
//! | Builder            | SQL                     |
//! |--------------------|-------------------------|
//! | `eq(c, v)`         | `c = ?` / `c IS NULL`   |
//! | `ne(c, v)`         | `c <> ?`                |
//! | `gt/gte/lt/lte`    | `>`, `>=`, `<`, `<=`    |
//! | `between(c, a, b)` | `c BETWEEN ? AND ?`     |
//! | `limit/offset`     | `LIMIT ? OFFSET ?`      |

pub mod browse;
pub mod catalog;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod model;
pub mod parser;
pub mod paths;
pub mod row;
pub mod schema;
pub mod transpiler;
pub mod value;

pub mod prelude {
    pub use crate::catalog::{Catalog, TableRows};
    pub use crate::error::*;
    pub use crate::filter::{Condition, Filter};
    pub use crate::model::{Model, ModelOptions};
    pub use crate::parser::parse_filter;
    pub use crate::row::Row;
    pub use crate::schema::{Affinity, ColumnType, DbSchema, TableSchema};
    pub use crate::transpiler::ToSql;
    pub use crate::value::{Record, Value};
}

/// Parse a filter expression such as `rating>=3,rid=1..5`.
///
/// # Example
///
/// ```
/// use litemodel::parse;
///
/// let filter = parse("rating>=3, header='good'").unwrap();
/// assert_eq!(filter.len(), 2);
/// ```
pub fn parse(input: &str) -> Result<filter::Filter, error::ModelError> {
    parser::parse_filter(input)
}
