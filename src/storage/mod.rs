pub mod db;
mod links;
pub mod models;
mod sessions;
mod tables;

pub use db::{Database, DatabaseError};
pub use models::{Link, LinkKind, Session};
pub use tables::*;
