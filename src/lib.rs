pub mod aggregate;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod gitlab;
pub mod logging;
pub mod model;
pub mod table;
pub mod walker;
