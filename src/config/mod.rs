//! Configuration module for zsxq-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and resolving them into the immutable [`CrawlConfig`] a run consumes.
//!
//! # Example
//!
//! ```no_run
//! use zsxq_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Harvesting group {}", config.crawl.group);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ConflictSettings, CrawlConfig, CrawlSection, CrawlerSettings, DuplicatePolicy,
    ExistingDocumentPolicy,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
