//! End-to-end ingestion run: scan, parse, embed and upsert.
//!
//! A scanner thread walks the source tree and feeds a bounded work queue.
//! A pool of blocking workers, each owning its own [`ParserRegistry`], turns
//! targets into code units and sends them to the orchestrator over a second
//! bounded channel. The orchestrator restores discovery order, batches units,
//! embeds one batch at a time and hands upserts to a small task pool. Point
//! ids are assigned here and nowhere else.
//!
//! Files dispatched but not yet accepted in order are capped at the queue
//! capacity, so one slow file stalls the scanner instead of growing the
//! reorder buffer.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kodex_parser::{CodeUnit, ParserRegistry};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::batcher::Batcher;
use crate::config::IngestConfig;
use crate::embedder::{Embedder, check_count};
use crate::error::{EmbedError, FailureKind, RunFailure, StoreError};
use crate::extractor::{FileOutcome, extract};
use crate::filter::{Discovered, IngestFilter, ScanTarget};
use crate::payload::build_payload;
use crate::retry::RetryPolicy;
use crate::store::{Point, VectorStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ScanningAndParsing,
    Indexing,
    Completed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::ScanningAndParsing => "scanning-and-parsing",
            Self::Indexing => "indexing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        })
    }
}

/// Counters of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Regular files inspected, skipped ones included.
    pub files_seen: usize,
    /// Ignored, binary, unreadable or non-source files.
    pub files_skipped: usize,
    pub files_failed: usize,
    pub units_extracted: usize,
    pub units_indexed: usize,
    /// Units dropped with a batch whose embedding failed.
    pub units_failed: usize,
    /// Batches sent to the embedder.
    pub batches: usize,
    pub collection: String,
    pub elapsed: Duration,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "files: {} seen, {} skipped, {} failed; units: {} extracted, {} indexed, {} failed; \
             {} batches into `{}` in {:.1}s",
            self.files_seen,
            self.files_skipped,
            self.files_failed,
            self.units_extracted,
            self.units_indexed,
            self.units_failed,
            self.batches,
            self.collection,
            self.elapsed.as_secs_f64()
        )
    }
}

enum Event {
    Skipped,
    File { seq: u64, outcome: FileOutcome },
    ScanComplete { targets: u64 },
}

struct UpsertOutcome {
    batch: usize,
    units: usize,
    result: Result<(), StoreError>,
}

type Fatal = (FailureKind, String);

/// Run one full ingestion into `config.store.collection_name`.
///
/// The collection is deleted if present and recreated before any unit is
/// upserted. File and batch failures are counted in the summary; only
/// run-level failures are returned as errors.
///
/// # Errors
///
/// Returns a [`RunFailure`] for invalid configuration, collection setup
/// failure, a store that stays unreachable after retries, or vectors of the
/// wrong dimension.
pub async fn run_ingestion<E: Embedder>(
    config: &IngestConfig,
    store: Arc<dyn VectorStore>,
    embedder: &E,
) -> Result<RunSummary, RunFailure> {
    let started = Instant::now();
    let mut state = RunState::Idle;
    let mut indexer = Indexer::new(config, store, embedder);
    transition(&mut state, RunState::Idle);

    if let Err(message) = config.validate() {
        let fatal = (FailureKind::InvalidConfig, message);
        return Err(fail(&indexer.summary, started, &mut state, fatal));
    }
    let filter = match IngestFilter::new(
        &config.source_dir,
        &config.ignore_spec,
        config.languages.clone(),
    ) {
        Ok(filter) => filter,
        Err(e) => {
            let fatal = (FailureKind::InvalidConfig, format!("ignore spec: {e}"));
            return Err(fail(&indexer.summary, started, &mut state, fatal));
        }
    };

    tracing::info!(
        source = %config.source_dir.display(),
        collection = %config.store.collection_name,
        workers = config.workers,
        batch_size = config.embedding.batch_size,
        "ingestion started"
    );

    if let Err(fatal) = indexer.setup_collection().await {
        return Err(fail(&indexer.summary, started, &mut state, fatal));
    }

    transition(&mut state, RunState::ScanningAndParsing);
    let cancel = CancellationToken::new();
    let window = Arc::new(Semaphore::new(config.queue_capacity));
    let (mut out_rx, tasks) = spawn_extraction(filter, config, &cancel, &window);

    match indexer.consume(&mut out_rx, &window, &mut state).await {
        Ok(()) => {
            if let Err(e) = join_all(tasks).await {
                let fatal = (FailureKind::Internal, format!("extraction task failed: {e}"));
                indexer.drain_after_failure().await;
                return Err(fail(&indexer.summary, started, &mut state, fatal));
            }
            if let Err(fatal) = indexer.finish().await {
                indexer.drain_after_failure().await;
                return Err(fail(&indexer.summary, started, &mut state, fatal));
            }
        }
        Err(fatal) => {
            cancel.cancel();
            window.close();
            drop(out_rx);
            let _ = join_all(tasks).await;
            indexer.drain_after_failure().await;
            return Err(fail(&indexer.summary, started, &mut state, fatal));
        }
    }

    transition(&mut state, RunState::Completed);
    let mut summary = indexer.summary;
    summary.elapsed = started.elapsed();
    tracing::info!(%summary, "ingestion finished");
    Ok(summary)
}

fn transition(state: &mut RunState, next: RunState) {
    *state = next;
    tracing::info!(state = %next, "ingestion state");
}

fn fail(
    summary: &RunSummary,
    started: Instant,
    state: &mut RunState,
    (kind, message): Fatal,
) -> RunFailure {
    transition(state, RunState::Failed);
    tracing::error!(kind = %kind, %message, "ingestion failed");
    let mut progress = summary.clone();
    progress.elapsed = started.elapsed();
    RunFailure::new(kind, message, progress)
}

/// Spawn the scanner and the extraction workers. The returned receiver
/// closes once every one of them has exited.
fn spawn_extraction(
    filter: IngestFilter,
    config: &IngestConfig,
    cancel: &CancellationToken,
    window: &Arc<Semaphore>,
) -> (mpsc::Receiver<Event>, Vec<JoinHandle<()>>) {
    let (work_tx, work_rx) = mpsc::channel::<(u64, ScanTarget)>(config.queue_capacity);
    let (out_tx, out_rx) = mpsc::channel::<Event>(config.queue_capacity);
    let work_rx = Arc::new(Mutex::new(work_rx));
    let mut tasks = Vec::with_capacity(config.workers + 1);

    let scan_out = out_tx.clone();
    let scan_cancel = cancel.clone();
    let scan_window = Arc::clone(window);
    let runtime = tokio::runtime::Handle::current();
    tasks.push(tokio::task::spawn_blocking(move || {
        let acquire = || runtime.block_on(scan_window.acquire()).is_ok_and(|p| {
            p.forget();
            true
        });
        scan(&filter, &work_tx, &scan_out, &scan_cancel, acquire);
    }));

    for worker in 0..config.workers {
        let work_rx = Arc::clone(&work_rx);
        let out_tx = out_tx.clone();
        let cancel = cancel.clone();
        tasks.push(tokio::task::spawn_blocking(move || {
            extract_worker(worker, &work_rx, &out_tx, &cancel);
        }));
    }
    (out_rx, tasks)
}

/// Walk the filter and dispatch targets. `acquire` blocks until the
/// in-order window has room and returns false once it has been closed.
fn scan(
    filter: &IngestFilter,
    work_tx: &mpsc::Sender<(u64, ScanTarget)>,
    out_tx: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
    mut acquire: impl FnMut() -> bool,
) {
    let mut seq = 0u64;
    for discovered in filter.eligible() {
        if cancel.is_cancelled() {
            tracing::debug!("scan cancelled");
            return;
        }
        let sent = match discovered {
            Discovered::Target(target) => {
                if !acquire() {
                    tracing::debug!("scan window closed");
                    return;
                }
                let sent = work_tx.blocking_send((seq, target)).is_ok();
                seq += 1;
                sent
            }
            Discovered::Skipped { .. } => out_tx.blocking_send(Event::Skipped).is_ok(),
        };
        if !sent {
            return;
        }
    }
    let _ = out_tx.blocking_send(Event::ScanComplete { targets: seq });
}

fn extract_worker(
    worker: usize,
    work_rx: &Mutex<mpsc::Receiver<(u64, ScanTarget)>>,
    out_tx: &mpsc::Sender<Event>,
    cancel: &CancellationToken,
) {
    let mut registry = ParserRegistry::new();
    let mut files = 0usize;
    while !cancel.is_cancelled() {
        let next = {
            let mut rx = match work_rx.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            rx.blocking_recv()
        };
        let Some((seq, target)) = next else {
            break;
        };
        let outcome = extract(&target, &mut registry);
        files += 1;
        if out_tx.blocking_send(Event::File { seq, outcome }).is_err() {
            break;
        }
    }
    tracing::debug!(worker, files, parsers = ?registry.loaded(), "worker finished");
}

async fn join_all(tasks: Vec<JoinHandle<()>>) -> Result<(), JoinError> {
    let mut first_err = None;
    for task in tasks {
        if let Err(e) = task.await {
            first_err.get_or_insert(e);
        }
    }
    first_err.map_or(Ok(()), Err)
}

/// Wraps a store call in the per-call timeout and the retry policy.
async fn store_call<T, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    operation: &str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    policy
        .run(operation, StoreError::is_transient, || {
            let fut = call();
            async move {
                tokio::time::timeout(timeout, fut)
                    .await
                    .unwrap_or_else(|_| Err(StoreError::Timeout(timeout)))
            }
        })
        .await
}

fn setup_failure(e: &StoreError, what: &str) -> Fatal {
    let kind = if e.is_transient() {
        FailureKind::StoreUnreachable
    } else {
        FailureKind::CollectionSetup
    };
    (kind, format!("{what}: {e}"))
}

/// Single-threaded indexing stage: owns the counters and the id sequence.
struct Indexer<'a, E> {
    config: &'a IngestConfig,
    store: Arc<dyn VectorStore>,
    embedder: &'a E,
    summary: RunSummary,
    batcher: Batcher<CodeUnit>,
    reorder: BTreeMap<u64, FileOutcome>,
    next_seq: u64,
    next_id: u64,
    upserts: JoinSet<UpsertOutcome>,
}

impl<'a, E: Embedder> Indexer<'a, E> {
    fn new(config: &'a IngestConfig, store: Arc<dyn VectorStore>, embedder: &'a E) -> Self {
        Self {
            config,
            store,
            embedder,
            summary: RunSummary {
                collection: config.store.collection_name.clone(),
                ..RunSummary::default()
            },
            batcher: Batcher::new(config.embedding.batch_size),
            reorder: BTreeMap::new(),
            next_seq: 0,
            next_id: 0,
            upserts: JoinSet::new(),
        }
    }

    /// Delete-then-create. Runs to completion before any upsert is spawned.
    async fn setup_collection(&self) -> Result<(), Fatal> {
        let name = self.config.store.collection_name.as_str();
        let policy = &self.config.retry;
        let timeout = self.config.store.timeout();
        let store = &self.store;

        let existing = store_call(policy, timeout, "list_collections", || {
            store.list_collections()
        })
        .await
        .map_err(|e| setup_failure(&e, "listing collections"))?;

        if existing.iter().any(|c| c == name) {
            store_call(policy, timeout, "delete_collection", || {
                store.delete_collection(name)
            })
            .await
            .map_err(|e| setup_failure(&e, &format!("deleting collection {name}")))?;
            tracing::info!(collection = name, "existing collection deleted");
        }

        let dimension = self.config.embedding.dimension;
        let distance = self.config.store.distance;
        store_call(policy, timeout, "create_collection", || {
            store.create_collection(name, dimension, distance)
        })
        .await
        .map_err(|e| setup_failure(&e, &format!("creating collection {name}")))?;
        tracing::info!(collection = name, dimension, %distance, "collection created");
        Ok(())
    }

    async fn consume(
        &mut self,
        out_rx: &mut mpsc::Receiver<Event>,
        window: &Semaphore,
        state: &mut RunState,
    ) -> Result<(), Fatal> {
        while let Some(event) = out_rx.recv().await {
            match event {
                Event::Skipped => {
                    self.summary.files_seen += 1;
                    self.summary.files_skipped += 1;
                }
                Event::ScanComplete { targets } => {
                    tracing::debug!(targets, "scan complete");
                    transition(state, RunState::Indexing);
                }
                Event::File { seq, outcome } => {
                    self.reorder.insert(seq, outcome);
                    while let Some(outcome) = self.reorder.remove(&self.next_seq) {
                        self.next_seq += 1;
                        window.add_permits(1);
                        self.accept(outcome).await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn accept(&mut self, outcome: FileOutcome) -> Result<(), Fatal> {
        self.summary.files_seen += 1;
        if outcome.failed {
            self.summary.files_failed += 1;
        }
        self.summary.units_extracted += outcome.units.len();
        for unit in outcome.units {
            if let Some(batch) = self.batcher.push(unit) {
                self.index_batch(batch).await?;
            }
        }
        Ok(())
    }

    /// Flush what is left after the channel closed and wait for upserts.
    async fn finish(&mut self) -> Result<(), Fatal> {
        // Only non-empty if a worker died mid-file; keep the order we have.
        while let Some((_, outcome)) = self.reorder.pop_first() {
            self.accept(outcome).await?;
        }
        if let Some(batch) = self.batcher.finish() {
            self.index_batch(batch).await?;
        }
        while let Some(joined) = self.upserts.join_next().await {
            self.record(joined)?;
        }
        Ok(())
    }

    async fn index_batch(&mut self, batch: Vec<CodeUnit>) -> Result<(), Fatal> {
        let batch_no = self.summary.batches;
        self.summary.batches += 1;

        let texts: Vec<String> = batch.iter().map(|u| u.code.clone()).collect();
        let vectors = match self.embed(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!(batch = batch_no, units = batch.len(), error = %e, "embedding failed, batch dropped");
                self.summary.units_failed += batch.len();
                return Ok(());
            }
        };

        let dimension = self.config.embedding.dimension;
        if let Some(bad) = vectors.iter().find(|v| v.len() as u64 != dimension) {
            return Err((
                FailureKind::DimensionMismatch,
                format!(
                    "embedder returned {}-dimensional vectors, collection expects {dimension}",
                    bad.len()
                ),
            ));
        }

        let points: Vec<Point> = batch
            .iter()
            .zip(vectors)
            .map(|(unit, vector)| {
                let id = self.next_id;
                self.next_id += 1;
                Point {
                    id,
                    vector,
                    payload: build_payload(unit),
                }
            })
            .collect();

        while let Some(joined) = self.upserts.try_join_next() {
            self.record(joined)?;
        }
        while self.upserts.len() >= self.config.store.upsert_concurrency {
            if let Some(joined) = self.upserts.join_next().await {
                self.record(joined)?;
            }
        }
        self.spawn_upsert(batch_no, points);
        Ok(())
    }

    /// One vector per text, in order, or an error for the whole batch.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let embedder = self.embedder;
        let timeout = self.config.embedding.timeout();
        self.config
            .retry
            .run("embed", |_: &EmbedError| true, move || async move {
                let vectors = tokio::time::timeout(timeout, embedder.embed_batch(texts))
                    .await
                    .unwrap_or_else(|_| Err(EmbedError::Timeout(timeout)))?;
                check_count(vectors, texts.len())
            })
            .await
    }

    fn spawn_upsert(&mut self, batch: usize, points: Vec<Point>) {
        let store = Arc::clone(&self.store);
        let collection = self.config.store.collection_name.clone();
        let policy = self.config.retry;
        let timeout = self.config.store.timeout();
        let units = points.len();
        tracing::debug!(batch, units, first_id = points.first().map(|p| p.id), "upsert dispatched");

        self.upserts.spawn(async move {
            let result = store_call(&policy, timeout, "upsert", || {
                store.upsert(&collection, points.clone())
            })
            .await;
            UpsertOutcome {
                batch,
                units,
                result,
            }
        });
    }

    fn record(&mut self, joined: Result<UpsertOutcome, JoinError>) -> Result<(), Fatal> {
        let outcome = joined.map_err(|e| (FailureKind::Internal, format!("upsert task: {e}")))?;
        match outcome.result {
            Ok(()) => {
                self.summary.units_indexed += outcome.units;
                tracing::debug!(batch = outcome.batch, units = outcome.units, "batch upserted");
                Ok(())
            }
            Err(e) => {
                let kind = if e.is_transient() {
                    FailureKind::StoreUnreachable
                } else {
                    FailureKind::Internal
                };
                Err((kind, format!("upsert of batch {} failed: {e}", outcome.batch)))
            }
        }
    }

    /// Wait for in-flight upserts after a fatal error, counting the ones
    /// that still land.
    async fn drain_after_failure(&mut self) {
        while let Some(joined) = self.upserts.join_next().await {
            if let Ok(UpsertOutcome {
                units,
                result: Ok(()),
                ..
            }) = joined
            {
                self.summary.units_indexed += units;
            }
        }
    }
}
