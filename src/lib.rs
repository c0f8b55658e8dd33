pub mod aggregate;
pub mod branch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod files;
pub mod model;
pub mod parsers;
pub mod report;
pub mod wildcard;
