//! Scan pipeline: walk, identify, hash, summarize.

use derive_builder::Builder;
use rayon::prelude::*;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use archivizm_core::{FileRecord, ScanConfig, ScanError, ScanSession, ScanWarning, ToolStatus};
use archivizm_identify::{FormatIdentifier, IdentifyConfig};
use archivizm_scan::{ProgressTracker, ScanPhase, ScanProgress, TreeWalker, WalkItem};

use crate::duplicates::{DuplicateConfig, DuplicateFinder};
use crate::hasher::{ContentHasher, Md5Hasher};
use crate::summary::summarize_session;

/// What one pipeline run does.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct PipelineConfig {
    /// Traversal settings.
    pub scan: ScanConfig,

    /// Run format identification.
    #[builder(default = "true")]
    pub identify: bool,

    /// Run duplicate detection with these settings.
    #[builder(default)]
    pub duplicates: Option<DuplicateConfig>,

    /// Files identified per batch; bounds in-flight work.
    #[builder(default = "256")]
    pub batch_size: usize,
}

impl PipelineConfig {
    /// Create a new pipeline config builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Identification only, no duplicate analysis.
    pub fn new(scan: ScanConfig) -> Self {
        Self {
            scan,
            identify: true,
            duplicates: None,
            batch_size: 256,
        }
    }
}

/// Runs one scan session.
pub struct ScanPipeline<H = Md5Hasher> {
    config: PipelineConfig,
    identifier: Option<FormatIdentifier>,
    hasher: H,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl ScanPipeline<Md5Hasher> {
    /// Create a pipeline. Without [`with_identifier`](Self::with_identifier),
    /// siegfried is located with default settings when the run starts.
    pub fn new(config: PipelineConfig) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            config,
            identifier: None,
            hasher: Md5Hasher::new(),
            progress_tx,
        }
    }
}

impl<H: ContentHasher> ScanPipeline<H> {
    /// Replace the format identifier.
    pub fn with_identifier(mut self, identifier: FormatIdentifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Replace the content hasher.
    pub fn with_hasher<H2: ContentHasher>(self, hasher: H2) -> ScanPipeline<H2> {
        ScanPipeline {
            config: self.config,
            identifier: self.identifier,
            hasher,
            progress_tx: self.progress_tx,
        }
    }

    /// Subscribe to progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Configuration this pipeline runs with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The identifier set with [`with_identifier`](Self::with_identifier), if any.
    pub fn identifier(&self) -> Option<&FormatIdentifier> {
        self.identifier.as_ref()
    }

    /// Run the session to completion.
    ///
    /// Blocking; call from a worker thread in async contexts. Returns
    /// [`ScanError::Cancelled`] as soon as `cancel` fires; partial results
    /// are dropped.
    pub fn run(&self, cancel: &CancellationToken) -> Result<ScanSession, ScanError> {
        let scan = &self.config.scan;
        let walker = TreeWalker::new(scan.clone());
        let mut items = walker.walk()?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(scan.worker_count())
            .thread_name(|i| format!("archivizm-worker-{i}"))
            .build()
            .map_err(|e| ScanError::Other {
                message: format!("failed to start worker pool: {e}"),
            })?;

        let located;
        let identifier = match (&self.identifier, self.config.identify) {
            (_, false) => None,
            (Some(identifier), true) => Some(identifier),
            (None, true) => {
                located = FormatIdentifier::new(&IdentifyConfig::default());
                Some(&located)
            }
        };
        let tool_status = match identifier {
            Some(identifier) => identifier.tool_status().clone(),
            None => ToolStatus::Unavailable {
                reason: "identification disabled".to_string(),
            },
        };

        let mut session = ScanSession::new(items.root(), scan.scope, tool_status);
        let mut tracker = ProgressTracker::new();
        let batch_size = self.config.batch_size.max(1);

        tracing::info!(
            root = %session.root.display(),
            scope = ?session.scope,
            degraded = session.is_degraded(),
            "scan started"
        );

        let mut exhausted = false;
        while !exhausted {
            let mut batch: Vec<FileRecord> = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                if cancel.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
                match items.next() {
                    Some(WalkItem::File(record)) => batch.push(record),
                    Some(WalkItem::Symlink(link)) => session.symlinks.push(link),
                    Some(WalkItem::Skipped(warning)) => {
                        tracker.record_error();
                        session.errors.push(warning);
                    }
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if let Some(identifier) = identifier {
                let warnings = identify_batch(identifier, &pool, &mut batch, cancel)?;
                for warning in warnings.into_iter().flatten() {
                    tracker.record_error();
                    session.errors.push(warning);
                }
            }

            for record in &batch {
                tracker.record_file(record.size);
            }
            if let Some(last) = batch.last() {
                tracker.set_current_path(last.path.clone());
            }
            session.records.append(&mut batch);
            let _ = self.progress_tx.send(tracker.snapshot());
        }

        if let Some(dup_config) = &self.config.duplicates {
            tracker.set_phase(ScanPhase::Hashing);
            let _ = self.progress_tx.send(tracker.snapshot());

            let finder = DuplicateFinder::with_hasher(dup_config.clone(), &self.hasher);
            let records = &mut session.records;
            let report = pool.install(|| finder.find_duplicates(records, cancel))?;

            tracker.record_hashed(report.files_hashed);
            for _ in &report.failures {
                tracker.record_error();
            }
            session.errors.extend(report.failures);
            session.duplicates = Some(report.groups);
        }

        tracker.set_phase(ScanPhase::Summarizing);
        let _ = self.progress_tx.send(tracker.snapshot());

        session.summary = summarize_session(&session);
        session.duration = tracker.elapsed();

        tracker.set_phase(ScanPhase::Done);
        let _ = self.progress_tx.send(tracker.snapshot());

        tracing::info!(
            files = session.summary.total_files,
            errors = session.summary.error_count,
            duration_ms = session.duration.as_millis() as u64,
            "scan complete"
        );

        Ok(session)
    }
}

/// Identify a batch in parallel. Warnings come back in record order.
fn identify_batch(
    identifier: &FormatIdentifier,
    pool: &rayon::ThreadPool,
    batch: &mut [FileRecord],
    cancel: &CancellationToken,
) -> Result<Vec<Option<ScanWarning>>, ScanError> {
    let warnings: Vec<Option<ScanWarning>> = pool.install(|| {
        batch
            .par_iter_mut()
            .map(|record| {
                if cancel.is_cancelled() {
                    return None;
                }
                identifier.identify_record(record)
            })
            .collect()
    });

    if cancel.is_cancelled() {
        return Err(ScanError::Cancelled);
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_pipeline_without_duplicates() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.pdf"), b"%PDF-1.4").unwrap();
        fs::write(temp.path().join("b.txt"), b"plain").unwrap();

        let pipeline = ScanPipeline::new(PipelineConfig::new(ScanConfig::new(temp.path())))
            .with_identifier(FormatIdentifier::heuristic_only());
        let session = pipeline.run(&CancellationToken::new()).unwrap();

        assert_eq!(session.records.len(), 2);
        assert!(session.duplicates.is_none());
        assert!(session.records.iter().all(|r| r.format.is_some()));
        assert!(session.records.iter().all(|r| r.digest.is_none()));
        assert_eq!(session.summary.total_files, 2);
    }

    #[test]
    fn test_identification_disabled() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.pdf"), b"%PDF-1.4").unwrap();

        let config = PipelineConfig::builder()
            .scan(ScanConfig::new(temp.path()))
            .identify(false)
            .build()
            .unwrap();
        let session = ScanPipeline::new(config)
            .run(&CancellationToken::new())
            .unwrap();

        assert!(session.records[0].format.is_none());
        assert!(session.is_degraded());
        assert_eq!(session.summary.by_format.get("Unidentified"), Some(&1));
    }

    #[test]
    fn test_identifier_not_resolved_up_front() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.pdf"), b"%PDF-1.4").unwrap();

        let pipeline = ScanPipeline::new(PipelineConfig::new(ScanConfig::new(temp.path())));
        assert!(pipeline.identifier().is_none());

        let pipeline = pipeline.with_identifier(FormatIdentifier::heuristic_only());
        let session = pipeline.run(&CancellationToken::new()).unwrap();
        assert_eq!(
            session.tool_status,
            ToolStatus::Unavailable {
                reason: "signature tool disabled".to_string()
            }
        );
        assert_eq!(session.records[0].format_label(), "PDF");
    }

    #[test]
    fn test_cancelled_run() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.bin"), b"x").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let pipeline = ScanPipeline::new(PipelineConfig::new(ScanConfig::new(temp.path())))
            .with_identifier(FormatIdentifier::heuristic_only());

        assert!(matches!(pipeline.run(&cancel), Err(ScanError::Cancelled)));
    }

    #[test]
    fn test_progress_reaches_done() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.bin"), b"x").unwrap();

        let pipeline = ScanPipeline::new(PipelineConfig::new(ScanConfig::new(temp.path())))
            .with_identifier(FormatIdentifier::heuristic_only());
        let mut rx = pipeline.subscribe();
        pipeline.run(&CancellationToken::new()).unwrap();

        let mut last = None;
        while let Ok(progress) = rx.try_recv() {
            last = Some(progress);
        }
        let last = last.unwrap();
        assert_eq!(last.phase, ScanPhase::Done);
        assert_eq!(last.files_scanned, 1);
    }
}
