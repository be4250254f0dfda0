//! Duplicate-detection seam.
//!
//! The similarity engine itself lives outside this crate; the worker
//! only consumes this three-method contract and the two thresholds.

use anyhow::Result;
use async_trait::async_trait;

use crate::companies::Company;

/// Similarity thresholds on the engine's 0-100 scale.
#[derive(Debug, Clone, Copy)]
pub struct DedupThresholds {
    /// At or above: merge without review.
    pub auto_merge: f32,
    /// At or above (but below auto_merge): flag for manual review.
    pub candidate: f32,
}

impl Default for DedupThresholds {
    fn default() -> Self {
        Self {
            auto_merge: 90.0,
            candidate: 70.0,
        }
    }
}

/// Similarity scoring and merge operations, consumed by the worker.
#[async_trait]
pub trait DuplicateEngine: Send + Sync {
    /// Near-duplicates of `company`, with similarity scores 0-100.
    async fn find_duplicates(&self, company: &Company, limit: usize)
        -> Result<Vec<(Company, f32)>>;

    /// Merge `duplicate` into `primary`; `duplicate` ceases to exist.
    async fn merge_companies(&self, primary: &Company, duplicate: &Company) -> Result<()>;

    /// Record a candidate pair for manual review.
    async fn create_duplicate_candidate(
        &self,
        company: &Company,
        duplicate: &Company,
        similarity: f32,
    ) -> Result<()>;
}

/// Engine used when realtime dedup is configured off or no engine is wired.
pub struct NoopDuplicateEngine;

#[async_trait]
impl DuplicateEngine for NoopDuplicateEngine {
    async fn find_duplicates(
        &self,
        _company: &Company,
        _limit: usize,
    ) -> Result<Vec<(Company, f32)>> {
        Ok(vec![])
    }

    async fn merge_companies(&self, _primary: &Company, _duplicate: &Company) -> Result<()> {
        Ok(())
    }

    async fn create_duplicate_candidate(
        &self,
        _company: &Company,
        _duplicate: &Company,
        _similarity: f32,
    ) -> Result<()> {
        Ok(())
    }
}
