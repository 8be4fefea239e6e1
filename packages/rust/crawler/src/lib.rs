//! Crawl engine for myStundenplan.
//!
//! This crate provides:
//! - [`request`]: the endpoint table and the session-stamping request builder
//! - [`traversal`]: the crawl tree and the per-node visit step
//! - [`engine`]: the concurrent fetch loop feeding a [`RecordSink`]

pub mod engine;
pub mod request;
pub mod traversal;

pub use engine::{CrawlSummary, Crawler, NodeFailure, RecordSink, VecSink};
pub use request::{CrawlRequest, Endpoint, Format, Param, build, endpoint, request_for};
pub use traversal::{Fanout, IdSource, SemesterPolicy, Traversal, Visit, compute_hash, fanouts};
