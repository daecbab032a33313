//! SQL Console Core - collaborator contracts shared by the console engine
//!
//! This crate defines the pieces that sit at the boundary between the
//! console engine and a concrete database driver:
//!
//! - `Connection` - A single server connection able to run raw SQL
//! - `ConnectionFactory` - Opens short-lived administrative connections
//! - `Dialect` - Per-server syntax that the engine has to generate or recognize
//! - Common types like `Value`, `ColumnMeta`, `RowSet`, etc.

mod connection;
mod dialect;
mod error;
mod types;

pub use connection::*;
pub use dialect::*;
pub use error::*;
pub use types::*;
