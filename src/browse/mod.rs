//! Read-only HTTP browsing of a database file.
//!
//! ```text
//! GET /                 welcome
//! GET /tables           table names
//! GET /tables/{name}    rows, as JSON or an HTML table
//! ```

pub mod error;
pub mod handler;
pub mod html;
pub mod router;
pub mod server;

pub use error::BrowseError;
pub use server::{BrowseServer, BrowseState};
