//! In-memory store implementation.
//!
//! Thread-safe map-backed storage used for development and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreResult, Versioned};
use crate::error::StoreError;
use crate::models::{MessageThread, StudentProfile};

type Shelf<T> = RwLock<HashMap<String, Versioned<T>>>;

/// Map-backed document store protected by RwLocks, one per collection
#[derive(Debug, Default)]
pub struct MemoryStore {
    profiles: Shelf<StudentProfile>,
    shadow_profiles: Shelf<StudentProfile>,
    threads: Shelf<MessageThread>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every document (test isolation)
    pub async fn clear(&self) {
        self.profiles.write().await.clear();
        self.shadow_profiles.write().await.clear();
        self.threads.write().await.clear();
    }
}

fn insert_into<T: Clone>(
    map: &mut HashMap<String, Versioned<T>>,
    collection: &str,
    key: &str,
    doc: &T,
) -> StoreResult<u64> {
    if map.contains_key(key) {
        return Err(StoreError::Duplicate(format!("{}/{}", collection, key)));
    }
    map.insert(
        key.to_string(),
        Versioned {
            doc: doc.clone(),
            version: 1,
        },
    );
    Ok(1)
}

fn replace_into<T: Clone>(
    map: &mut HashMap<String, Versioned<T>>,
    collection: &str,
    key: &str,
    doc: &T,
    expected_version: u64,
) -> StoreResult<u64> {
    let entry = map
        .get_mut(key)
        .ok_or_else(|| StoreError::NotFound(format!("{}/{}", collection, key)))?;
    if entry.version != expected_version {
        return Err(StoreError::VersionConflict {
            collection: collection.to_string(),
            key: key.to_string(),
        });
    }
    entry.doc = doc.clone();
    entry.version += 1;
    Ok(entry.version)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    // ==================== Profile operations ====================

    async fn get_profile(
        &self,
        member_name: &str,
    ) -> StoreResult<Option<Versioned<StudentProfile>>> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(member_name).cloned())
    }

    async fn insert_profile(&self, profile: &StudentProfile) -> StoreResult<u64> {
        let mut profiles = self.profiles.write().await;
        insert_into(&mut profiles, "profiles", &profile.member_name, profile)
    }

    async fn replace_profile(
        &self,
        profile: &StudentProfile,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let mut profiles = self.profiles.write().await;
        replace_into(
            &mut profiles,
            "profiles",
            &profile.member_name,
            profile,
            expected_version,
        )
    }

    async fn list_profiles(&self) -> StoreResult<Vec<StudentProfile>> {
        let profiles = self.profiles.read().await;
        let mut all: Vec<StudentProfile> = profiles.values().map(|v| v.doc.clone()).collect();
        all.sort_by(|a, b| a.member_name.cmp(&b.member_name));
        Ok(all)
    }

    // ==================== Shadow profile operations ====================

    async fn get_shadow_profile(
        &self,
        member_name: &str,
    ) -> StoreResult<Option<Versioned<StudentProfile>>> {
        let shadows = self.shadow_profiles.read().await;
        Ok(shadows.get(member_name).cloned())
    }

    async fn insert_shadow_profile(&self, profile: &StudentProfile) -> StoreResult<u64> {
        let mut shadows = self.shadow_profiles.write().await;
        insert_into(
            &mut shadows,
            "shadow_profiles",
            &profile.member_name,
            profile,
        )
    }

    async fn replace_shadow_profile(
        &self,
        profile: &StudentProfile,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let mut shadows = self.shadow_profiles.write().await;
        replace_into(
            &mut shadows,
            "shadow_profiles",
            &profile.member_name,
            profile,
            expected_version,
        )
    }

    // ==================== Thread operations ====================

    async fn get_thread(&self, thread_id: &str) -> StoreResult<Option<Versioned<MessageThread>>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned())
    }

    async fn insert_thread(&self, thread: &MessageThread) -> StoreResult<u64> {
        let mut threads = self.threads.write().await;
        insert_into(&mut threads, "threads", &thread.thread_id, thread)
    }

    async fn replace_thread(
        &self,
        thread: &MessageThread,
        expected_version: u64,
    ) -> StoreResult<u64> {
        let mut threads = self.threads.write().await;
        replace_into(
            &mut threads,
            "threads",
            &thread.thread_id,
            thread,
            expected_version,
        )
    }

    async fn list_threads(&self) -> StoreResult<Vec<MessageThread>> {
        let threads = self.threads.read().await;
        let mut all: Vec<MessageThread> = threads.values().map(|v| v.doc.clone()).collect();
        all.sort_by(|a, b| a.thread_id.cmp(&b.thread_id));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_rejects_duplicates() {
        let store = MemoryStore::new();
        let profile = StudentProfile::new("amy", "Ms. Frizzle", 2);
        assert_eq!(store.insert_profile(&profile).await.unwrap(), 1);
        assert!(matches!(
            store.insert_profile(&profile).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn replace_checks_version() {
        let store = MemoryStore::new();
        let mut profile = StudentProfile::new("amy", "Ms. Frizzle", 2);
        let v1 = store.insert_profile(&profile).await.unwrap();

        profile.class_period = 3;
        let v2 = store.replace_profile(&profile, v1).await.unwrap();
        assert_eq!(v2, 2);

        // Stale version loses
        profile.class_period = 4;
        assert!(matches!(
            store.replace_profile(&profile, v1).await,
            Err(StoreError::VersionConflict { .. })
        ));

        let current = store.get_profile("amy").await.unwrap().unwrap();
        assert_eq!(current.doc.class_period, 3);
        assert_eq!(current.version, v2);
    }

    #[tokio::test]
    async fn shadow_collection_is_independent() {
        let store = MemoryStore::new();
        let profile = StudentProfile::new("amy", "Ms. Frizzle", 2);
        store.insert_profile(&profile).await.unwrap();
        assert!(store.get_shadow_profile("amy").await.unwrap().is_none());

        store.insert_shadow_profile(&profile.as_shadow()).await.unwrap();
        assert!(store.get_shadow_profile("amy").await.unwrap().is_some());
        // Live profile untouched
        assert!(store.get_profile("amy").await.unwrap().is_some());
    }
}
