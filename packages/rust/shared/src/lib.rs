//! Shared types, error model, and configuration for the Stundenplan crawler.
//!
//! This crate is the foundation depended on by all other crawler crates.
//! It provides:
//! - [`StundenplanError`] and [`SessionError`], the error taxonomy
//! - Domain types ([`Axis`], [`Context`], [`SessionDescriptor`], [`NodeKind`], [`Record`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, Credentials, DEFAULT_LOGIN_URL, DefaultsConfig,
    MarkupPayload, config_dir, config_file_path, init_config, load_config, load_config_from,
    resolve_password,
};
pub use error::{Result, SessionError, StundenplanError};
pub use types::{
    Axis, Context, NodeKind, Payload, Record, RecordScope, SESSION_TOKEN_LEN, SessionDescriptor,
    node_id,
};
