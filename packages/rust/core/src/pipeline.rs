//! End-to-end crawl run: credentials → session → crawl tree → sink.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};
use url::Url;
use uuid::Uuid;

use stundenplan_crawler::{CrawlSummary, Crawler, RecordSink, Traversal};
use stundenplan_session::{authenticate, build_client};
use stundenplan_shared::{CrawlConfig, Credentials, NodeKind, Record, Result};

/// Configuration for one crawl run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub login_url: Url,
    pub credentials: Credentials,
    pub crawl: CrawlConfig,
}

/// Result of a crawl run.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub tenant: String,
    pub user_id: String,
    pub summary: CrawlSummary,
}

/// Progress callback for reporting run status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after a record reached the sink.
    fn record_emitted(&self, kind: NodeKind, id: &str, count: usize);
    /// Called when the run completes.
    fn done(&self, result: &RunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn record_emitted(&self, _kind: NodeKind, _id: &str, _count: usize) {}
    fn done(&self, _result: &RunResult) {}
}

/// Log in and crawl everything reachable from the semester listing.
///
/// A failed login aborts before any crawl request is sent. After that, node
/// failures only show up in the returned summary.
#[instrument(skip_all, fields(tenant = %config.credentials.tenant))]
pub async fn run_crawl(
    config: &RunConfig,
    sink: &mut dyn RecordSink,
    progress: &dyn ProgressReporter,
) -> Result<RunResult> {
    let start = Instant::now();
    let run_id = Uuid::now_v7();
    let started_at = Utc::now();

    info!(%run_id, login_url = %config.login_url, "starting crawl run");

    progress.phase("Logging in");
    let client = build_client(&config.crawl)?;
    let session = Arc::new(authenticate(&client, &config.login_url, &config.credentials).await?);

    progress.phase("Crawling");
    let traversal = Traversal::new(session.clone(), &config.crawl);
    let crawler = Crawler::with_client(config.crawl.clone(), client);
    let mut reporting = ReportingSink {
        inner: sink,
        progress,
        count: 0,
    };
    let summary = crawler.crawl(&traversal, &mut reporting).await?;

    let result = RunResult {
        run_id,
        started_at,
        tenant: session.tenant.clone(),
        user_id: session.user_id.clone(),
        summary,
    };

    progress.done(&result);

    info!(
        %run_id,
        records = result.summary.records_emitted,
        failures = result.summary.failures.len(),
        elapsed_ms = start.elapsed().as_millis(),
        "crawl run complete"
    );

    Ok(result)
}

/// Forwards records and reports each successful emit.
struct ReportingSink<'a> {
    inner: &'a mut dyn RecordSink,
    progress: &'a dyn ProgressReporter,
    count: usize,
}

impl RecordSink for ReportingSink<'_> {
    fn emit(&mut self, record: Record) -> Result<()> {
        let kind = record.content_kind;
        let id = record.id.clone();
        self.inner.emit(record)?;
        self.count += 1;
        self.progress.record_emitted(kind, &id, self.count);
        Ok(())
    }
}
