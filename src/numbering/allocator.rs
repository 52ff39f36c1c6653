//! Counter allocation per `(prefix, year)` scope

use tracing::{debug, instrument, warn};

use crate::config::HeraclionConfig;
use crate::numbering::document_number::{next_counter, DocumentKind, DocumentNumber, NumberingPolicy};
use crate::traits::*;
use crate::types::*;
use crate::utils::retry::{with_retry, RetryPolicy};

/// Hands out sequential document numbers backed by the stored counters
pub struct DocumentNumberer<S: BackOfficeStorage> {
    storage: S,
    policy: NumberingPolicy,
    retry: RetryPolicy,
    max_allocation_attempts: u32,
}

impl<S: BackOfficeStorage> DocumentNumberer<S> {
    /// Create a numberer with the default configuration
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, &HeraclionConfig::default())
    }

    pub fn with_config(storage: S, config: &HeraclionConfig) -> Self {
        Self {
            storage,
            policy: config.numbering.clone(),
            retry: config.retry.clone(),
            max_allocation_attempts: config.max_allocation_attempts.max(1),
        }
    }

    pub fn policy(&self) -> &NumberingPolicy {
        &self.policy
    }

    /// Counter the next allocation would get, without claiming it
    pub async fn peek_next(&self, prefix: &str, year: i32) -> HeraclionResult<u64> {
        self.policy.validate_scope(prefix, year)?;
        let storage = &self.storage;
        let last = with_retry(&self.retry, "last_counter", move || {
            storage.last_counter(prefix, year)
        })
        .await?;
        next_counter(last.unwrap_or(0))
    }

    /// Claim the next number of a scope.
    ///
    /// The stored counter is advanced with a compare-and-set, so concurrent
    /// callers never receive the same number; a lost race re-reads the
    /// counter and tries again.
    #[instrument(skip(self))]
    pub async fn allocate(&self, prefix: &str, year: i32) -> HeraclionResult<DocumentNumber> {
        self.policy.validate_scope(prefix, year)?;
        let storage = &self.storage;

        for attempt in 1..=self.max_allocation_attempts {
            let last = with_retry(&self.retry, "last_counter", move || {
                storage.last_counter(prefix, year)
            })
            .await?;
            let next = next_counter(last.unwrap_or(0))?;

            let claimed = with_retry(&self.retry, "claim_counter", move || {
                storage.compare_and_set_counter(prefix, year, last, next)
            })
            .await?;

            if claimed {
                debug!(counter = next, "document number allocated");
                return Ok(DocumentNumber::new(prefix, year, next)
                    .with_width(self.policy.counter_width));
            }

            debug!(attempt, "counter moved underneath us, re-reading");
        }

        warn!(
            attempts = self.max_allocation_attempts,
            "could not claim a document counter"
        );
        Err(HeraclionError::FatalStorage(format!(
            "could not allocate a number for {}-{} after {} attempts",
            prefix, year, self.max_allocation_attempts
        )))
    }

    /// Claim the next number for a document family
    pub async fn allocate_for(
        &self,
        kind: DocumentKind,
        year: i32,
    ) -> HeraclionResult<DocumentNumber> {
        self.allocate(kind.prefix(), year).await
    }

    /// Render a number with the configured counter width
    pub fn format(&self, number: &DocumentNumber) -> HeraclionResult<String> {
        let counter = i64::try_from(number.counter).map_err(|_| {
            HeraclionError::InvalidArgument(format!("counter {} is too large", number.counter))
        })?;
        self.policy.generate(&number.prefix, number.year, counter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::{Fault, MemoryStorage, StorageOp};
    use std::sync::Arc;

    fn numberer(storage: MemoryStorage) -> DocumentNumberer<MemoryStorage> {
        let config = HeraclionConfig::default()
            .numbering(NumberingPolicy::pinned(2024))
            .retry(RetryPolicy::fixed(3, std::time::Duration::from_millis(1)));
        DocumentNumberer::with_config(storage, &config)
    }

    #[tokio::test]
    async fn test_allocation_starts_at_one_per_scope() {
        let numberer = numberer(MemoryStorage::new());

        let first = numberer.allocate("FAC", 2024).await.unwrap();
        let second = numberer.allocate("FAC", 2024).await.unwrap();
        let other_year = numberer.allocate("FAC", 2023).await.unwrap();
        let devis = numberer.allocate_for(DocumentKind::Devis, 2024).await.unwrap();

        assert_eq!(first.to_string(), "FAC-2024-001");
        assert_eq!(second.to_string(), "FAC-2024-002");
        assert_eq!(other_year.to_string(), "FAC-2023-001");
        assert_eq!(devis.to_string(), "DEV-2024-001");
        assert_eq!(numberer.peek_next("FAC", 2024).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_allocation_rejects_bad_scope() {
        let numberer = numberer(MemoryStorage::new());
        assert!(matches!(
            numberer.allocate("", 2024).await,
            Err(HeraclionError::InvalidArgument(_))
        ));
        assert!(matches!(
            numberer.allocate("FAC", 1900).await,
            Err(HeraclionError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_lookup_failure_propagates() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::LastCounter, Fault::Fatal);
        let numberer = numberer(storage);

        let err = numberer.allocate("FAC", 2024).await.unwrap_err();
        assert!(matches!(err, HeraclionError::FatalStorage(_)));
    }

    #[tokio::test]
    async fn test_transient_lookup_failure_is_retried() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::LastCounter, Fault::Transient(2));
        let numberer = numberer(storage);

        let number = numberer.allocate("BL", 2024).await.unwrap();
        assert_eq!(number.counter, 1);
    }

    #[tokio::test]
    async fn test_allocation_follows_counter_width() {
        let mut policy = NumberingPolicy::pinned(2024);
        policy.counter_width = 5;
        let config = HeraclionConfig::default().numbering(policy);
        let numberer = DocumentNumberer::with_config(MemoryStorage::new(), &config);

        let number = numberer.allocate("FAC", 2024).await.unwrap();
        assert_eq!(number.to_string(), "FAC-2024-00001");
        assert_eq!(numberer.format(&number).unwrap(), number.to_string());
    }

    #[tokio::test]
    async fn test_lost_claim_is_retried() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::ClaimCounter, Fault::Conflict(2));
        let numberer = numberer(storage);

        // Two competing writers took 1 and 2 first
        let number = numberer.allocate("FAC", 2024).await.unwrap();
        assert_eq!(number.counter, 3);
        assert_eq!(numberer.peek_next("FAC", 2024).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_allocation_gives_up_after_max_attempts() {
        let storage = MemoryStorage::new();
        storage.inject_fault(StorageOp::ClaimCounter, Fault::Conflict(u32::MAX));
        let mut config = HeraclionConfig::default().numbering(NumberingPolicy::pinned(2024));
        config.max_allocation_attempts = 4;
        let numberer = DocumentNumberer::with_config(storage.clone(), &config);

        let err = numberer.allocate("FAC", 2024).await.unwrap_err();
        assert!(matches!(err, HeraclionError::FatalStorage(_)));
        assert_eq!(storage.last_counter("FAC", 2024).await.unwrap(), Some(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_distinct() {
        // Each lost claim means another task won, so 32 rounds always suffice
        let mut config = HeraclionConfig::default().numbering(NumberingPolicy::pinned(2024));
        config.max_allocation_attempts = 32;
        let numberer = Arc::new(DocumentNumberer::with_config(MemoryStorage::new(), &config));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let numberer = Arc::clone(&numberer);
            handles.push(tokio::spawn(async move {
                numberer.allocate("FAC", 2024).await
            }));
        }

        let mut counters = Vec::new();
        for handle in handles {
            counters.push(handle.await.unwrap().unwrap().counter);
        }
        counters.sort_unstable();
        assert_eq!(counters, (1..=32).collect::<Vec<u64>>());
    }
}
