use std::vec::IntoIter;
use tokio_util::sync::CancellationToken;

use crate::services::compression::{
    CompressionEngine, CompressionOutcome, CompressionStatus, MediaSource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub index: usize,
    pub outcome: CompressionOutcome,
    /// Fraction of the batch finished once this item is done, in (0, 1].
    pub progress: f64,
}

/// Runs `smart_compress` over files one at a time, in input order.
pub struct BatchCompressor<'a> {
    engine: &'a CompressionEngine,
}

impl<'a> BatchCompressor<'a> {
    pub fn new(engine: &'a CompressionEngine) -> Self {
        Self { engine }
    }

    /// Lazily compresses `files`, yielding one item per input. A file that
    /// fails is yielded with its original bytes; nothing is dropped.
    pub fn iter(
        &self,
        files: Vec<MediaSource>,
        target_size_mb: f64,
        cancel: CancellationToken,
    ) -> BatchIter<'a> {
        BatchIter {
            engine: self.engine,
            total: files.len(),
            files: files.into_iter().enumerate(),
            target_size_mb,
            cancel,
        }
    }

    pub fn compress_all<F>(
        &self,
        files: Vec<MediaSource>,
        target_size_mb: f64,
        cancel: CancellationToken,
        mut on_progress: F,
    ) -> Vec<CompressionOutcome>
    where
        F: FnMut(f64),
    {
        self.iter(files, target_size_mb, cancel)
            .map(|item| {
                on_progress(item.progress);
                item.outcome
            })
            .collect()
    }
}

pub struct BatchIter<'a> {
    engine: &'a CompressionEngine,
    files: std::iter::Enumerate<IntoIter<MediaSource>>,
    total: usize,
    target_size_mb: f64,
    cancel: CancellationToken,
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = BatchItem;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, source) = self.files.next()?;

        let outcome = if self.cancel.is_cancelled() {
            CompressionOutcome::unchanged(source.bytes, CompressionStatus::Failed("cancelled".to_string()))
        } else {
            match self
                .engine
                .smart_compress(&source, self.target_size_mb, &self.cancel)
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::warn!(index, "Batch item failed, keeping original: {}", e);
                    CompressionOutcome::unchanged(source.bytes, CompressionStatus::Failed(e.to_string()))
                }
            }
        };

        let progress = (index + 1) as f64 / self.total as f64;
        tracing::debug!(index, total = self.total, progress, status = outcome.status.as_str(), "Batch item done");

        Some(BatchItem {
            index,
            outcome,
            progress,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

impl<'a> ExactSizeIterator for BatchIter<'a> {}
