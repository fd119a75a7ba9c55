pub mod database;
pub mod migration;
pub mod repositories;

pub use crate::data::database::{ConnectionPool, Database};
pub use crate::data::repositories::*;
