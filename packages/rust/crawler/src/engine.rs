//! Concurrent fetch engine driving a [`Traversal`].
//!
//! Requests are drained from a FIFO queue in batches of up to `concurrency`,
//! fetched in parallel, and visited in queue order. A node that fails to fetch,
//! decode or emit is logged and counted; the rest of the tree continues.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use stundenplan_session::build_client;
use stundenplan_shared::{CrawlConfig, Record, Result, StundenplanError};

use crate::request::CrawlRequest;
use crate::traversal::Traversal;

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination of emitted records.
pub trait RecordSink: Send {
    fn emit(&mut self, record: Record) -> Result<()>;
}

/// Collects records in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    pub records: Vec<Record>,
}

impl RecordSink for VecSink {
    fn emit(&mut self, record: Record) -> Result<()> {
        self.records.push(record);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CrawlSummary
// ---------------------------------------------------------------------------

/// A node whose subtree was skipped.
#[derive(Debug, Clone)]
pub struct NodeFailure {
    /// Node identifier, e.g. `courseData(semester=2023W,course=7)`.
    pub node: String,
    pub error: String,
}

/// Summary of a completed crawl.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// Responses received and visited, failed visits included.
    pub nodes_visited: usize,
    pub records_emitted: usize,
    pub failures: Vec<NodeFailure>,
    pub duration: Duration,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Executes crawl requests against the application.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
}

impl Crawler {
    /// Create a crawler with its own HTTP client.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = build_client(&config)?;
        Ok(Self { config, client })
    }

    /// Create a crawler reusing an existing client (e.g. the one that logged in).
    pub fn with_client(config: CrawlConfig, client: Client) -> Self {
        Self { config, client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Walk the tree from the traversal's root, emitting every record into
    /// `sink`. Only a root that cannot be built is an error; node failures
    /// end up in the summary.
    #[instrument(skip_all, fields(tenant = %traversal.session().tenant))]
    pub async fn crawl(
        &self,
        traversal: &Traversal,
        sink: &mut dyn RecordSink,
    ) -> Result<CrawlSummary> {
        let start_time = Instant::now();
        let concurrency = self.config.concurrency.max(1) as usize;
        let semaphore = Arc::new(Semaphore::new(concurrency));

        let mut queue: VecDeque<CrawlRequest> = VecDeque::from([traversal.root()?]);
        let mut summary = CrawlSummary::default();

        info!(
            concurrency,
            rate_limit_ms = self.config.rate_limit_ms,
            retries = self.config.retries,
            "starting crawl"
        );

        while !queue.is_empty() {
            let batch: Vec<CrawlRequest> = {
                let drain_count = queue.len().min(concurrency);
                queue.drain(..drain_count).collect()
            };

            let mut handles = Vec::with_capacity(batch.len());
            for request in batch {
                let client = self.client.clone();
                let sem = semaphore.clone();
                let rate_limit = self.config.rate_limit_ms;
                let retries = self.config.retries;

                let node = request.id();
                let handle = tokio::spawn(async move {
                    let body = match sem.acquire().await {
                        Ok(_permit) => {
                            if rate_limit > 0 {
                                tokio::time::sleep(Duration::from_millis(rate_limit)).await;
                            }
                            fetch(&client, &request, retries).await
                        }
                        Err(e) => Err(StundenplanError::Network(format!("semaphore closed: {e}"))),
                    };
                    (request, body)
                });
                handles.push((node, handle));
            }

            for (node, handle) in handles {
                let (request, body) = match join_fetch(node, handle).await {
                    Ok(done) => done,
                    Err(failure) => {
                        summary.failures.push(failure);
                        continue;
                    }
                };

                let node = request.id();
                let visit = body.and_then(|body| {
                    summary.nodes_visited += 1;
                    traversal.visit(&request, &body)
                });

                match visit {
                    Ok(visit) => {
                        queue.extend(visit.children);
                        match sink.emit(visit.record) {
                            Ok(()) => summary.records_emitted += 1,
                            Err(e) => {
                                warn!(%node, error = %e, "failed to emit record");
                                summary.failures.push(NodeFailure {
                                    node,
                                    error: e.to_string(),
                                });
                            }
                        }
                    }
                    Err(e) => {
                        warn!(%node, error = %e, "skipping node and its subtree");
                        summary.failures.push(NodeFailure {
                            node,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        summary.duration = start_time.elapsed();

        info!(
            nodes_visited = summary.nodes_visited,
            records_emitted = summary.records_emitted,
            failures = summary.failures.len(),
            duration_ms = summary.duration.as_millis(),
            "crawl completed"
        );

        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Fetching
// ---------------------------------------------------------------------------

type FetchOutcome = (CrawlRequest, Result<String>);

/// Await a fetch task. A task that panicked or was cancelled is reported
/// under the node it was fetching.
async fn join_fetch(
    node: String,
    handle: JoinHandle<FetchOutcome>,
) -> std::result::Result<FetchOutcome, NodeFailure> {
    handle.await.map_err(|e| {
        warn!(%node, error = %e, "fetch task failed");
        NodeFailure {
            node,
            error: e.to_string(),
        }
    })
}

/// POST `request`, retrying transport failures up to `retries` times.
async fn fetch(client: &Client, request: &CrawlRequest, retries: u32) -> Result<String> {
    let mut attempt = 0;
    loop {
        match fetch_once(client, request).await {
            Ok(body) => return Ok(body),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(node = %request.id(), attempt, error = %e, "retrying");
            }
            Err(e) => return Err(e),
        }
    }
}

async fn fetch_once(client: &Client, request: &CrawlRequest) -> Result<String> {
    debug!(node = %request.id(), "fetching");

    let response = client
        .post(request.url.as_str())
        .form(&request.form)
        .send()
        .await
        .map_err(|e| StundenplanError::Network(format!("{}: {e}", request.kind)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StundenplanError::Network(format!(
            "{}: HTTP {status}",
            request.kind
        )));
    }

    response
        .text()
        .await
        .map_err(|e| StundenplanError::Network(format!("{}: body read failed: {e}", request.kind)))
}
