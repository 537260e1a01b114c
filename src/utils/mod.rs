//! Utility functions shared by the indexing driver and the CLI.
//!
//! ## Modules
//!
//! - [`app_data`] - Application data directory and `config.json` (XDG-compliant)
//! - [`progress`] - Progress bars that compile to no-ops without the `progress` feature
//! - [`tokenizer`] - Term extraction (camelCase, snake_case) and binary detection
//!
//! ## Key Functions
//!
//! ```no_run
//! use dlocate::utils::{is_binary, term_frequencies};
//!
//! let content = "fn getUserById() {}";
//! if !is_binary(content.as_bytes()) {
//!     // [("by", ..), ("fn", ..), ("get", ..), ("getuserbyid", ..), ...]
//!     let terms = term_frequencies(content, true);
//! }
//! ```

pub mod app_data;
pub mod progress;
pub mod tokenizer;

pub use app_data::*;
pub use tokenizer::*;
