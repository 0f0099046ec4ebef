//! Document store collaborator.
//!
//! The deployment target backs these operations with an external document
//! database; the backend here only assumes simple keyed reads and
//! version-checked writes. The in-memory implementation serves development
//! and the test suite.

pub mod memory;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::{MessageThread, StudentProfile};

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A document plus the store-side version used for compare-and-swap writes
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub doc: T,
    pub version: u64,
}

/// Keyed document operations the backend requires.
///
/// Writes are first-write-wins: `insert_*` fails on an existing key,
/// `replace_*` fails unless the caller holds the current version. Collection
/// scans return documents without versions; mutating callers re-read.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    // ==================== Profile operations ====================

    async fn get_profile(&self, member_name: &str)
        -> StoreResult<Option<Versioned<StudentProfile>>>;

    async fn insert_profile(&self, profile: &StudentProfile) -> StoreResult<u64>;

    async fn replace_profile(
        &self,
        profile: &StudentProfile,
        expected_version: u64,
    ) -> StoreResult<u64>;

    async fn list_profiles(&self) -> StoreResult<Vec<StudentProfile>>;

    // ==================== Shadow profile operations ====================

    async fn get_shadow_profile(
        &self,
        member_name: &str,
    ) -> StoreResult<Option<Versioned<StudentProfile>>>;

    async fn insert_shadow_profile(&self, profile: &StudentProfile) -> StoreResult<u64>;

    async fn replace_shadow_profile(
        &self,
        profile: &StudentProfile,
        expected_version: u64,
    ) -> StoreResult<u64>;

    // ==================== Thread operations ====================

    async fn get_thread(&self, thread_id: &str) -> StoreResult<Option<Versioned<MessageThread>>>;

    async fn insert_thread(&self, thread: &MessageThread) -> StoreResult<u64>;

    async fn replace_thread(
        &self,
        thread: &MessageThread,
        expected_version: u64,
    ) -> StoreResult<u64>;

    async fn list_threads(&self) -> StoreResult<Vec<MessageThread>>;
}

// Re-export
pub use memory::MemoryStore;
