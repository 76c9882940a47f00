// Library root: shared data model, the persistence contract and its SQLite
// implementation, and configuration loading for the suggestion engine.

pub mod config;
pub mod db;
pub mod model;
pub mod store;
