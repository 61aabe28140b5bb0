//! Persistence layer — store traits and the libSQL backend.

pub mod libsql_backend;
mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{CheckInPatch, CheckInStore, NewCheckIn, UserStore};
