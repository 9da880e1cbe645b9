//! Crawl a paginated API reference site into JSON catalogues of namespaces,
//! types, static members and method signatures.

pub mod config;
pub mod crawler;
pub mod error;
pub mod fetch;
pub mod model;
pub mod parser;
pub mod pool;
pub mod sink;
