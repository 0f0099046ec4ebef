//! Repository for student profile documents (live and shadow)

use crate::models::StudentProfile;
use crate::store::{DocumentStore, StoreResult, Versioned};
use crate::error::StoreError;
use std::sync::Arc;

/// Bounded retries for compare-and-swap replacement
const CAS_RETRIES: usize = 5;

pub struct ProfileRepository {
    store: Arc<dyn DocumentStore>,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Live profile operations
    // =========================================================================

    /// Fetch a profile, failing if the member is unknown
    pub async fn get(&self, member_name: &str) -> StoreResult<StudentProfile> {
        self.try_get(member_name).await?.ok_or_else(|| {
            StoreError::NotFound(format!("No profile found for member '{}'", member_name))
        })
    }

    /// Fetch a profile if present
    pub async fn try_get(&self, member_name: &str) -> StoreResult<Option<StudentProfile>> {
        Ok(self
            .store
            .get_profile(member_name)
            .await?
            .map(|versioned| versioned.doc))
    }

    /// Create a fresh profile; duplicate member names are rejected
    pub async fn create(&self, profile: &StudentProfile) -> StoreResult<()> {
        self.store
            .insert_profile(profile)
            .await
            .map_err(|err| match err {
                StoreError::Duplicate(_) => StoreError::Duplicate(format!(
                    "Profile already exists for member '{}'",
                    profile.member_name
                )),
                other => other,
            })?;
        Ok(())
    }

    /// All live profiles, ordered by member name
    pub async fn list_all(&self) -> StoreResult<Vec<StudentProfile>> {
        self.store.list_profiles().await
    }

    /// The current roster of a teacher's class
    pub async fn students_of(&self, teacher: &str) -> StoreResult<Vec<StudentProfile>> {
        let all = self.store.list_profiles().await?;
        Ok(all.into_iter().filter(|p| p.teacher == teacher).collect())
    }

    /// Read-mutate-replace with bounded retry.
    ///
    /// The closure runs on a fresh copy of the document on every attempt, so
    /// it must be a pure mutation of the profile it is handed.
    pub async fn update<F>(&self, member_name: &str, mutate: F) -> StoreResult<StudentProfile>
    where
        F: Fn(&mut StudentProfile) + Send + Sync,
    {
        for _ in 0..CAS_RETRIES {
            let Versioned { mut doc, version } =
                self.store.get_profile(member_name).await?.ok_or_else(|| {
                    StoreError::NotFound(format!("No profile found for member '{}'", member_name))
                })?;
            mutate(&mut doc);
            match self.store.replace_profile(&doc, version).await {
                Ok(_) => return Ok(doc),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::VersionConflict {
            collection: "profiles".to_string(),
            key: member_name.to_string(),
        })
    }

    // =========================================================================
    // Shadow profile operations (time travel)
    // =========================================================================

    /// Fetch the shadow profile if present
    pub async fn try_get_shadow(&self, member_name: &str) -> StoreResult<Option<StudentProfile>> {
        Ok(self
            .store
            .get_shadow_profile(member_name)
            .await?
            .map(|versioned| versioned.doc))
    }

    /// Persist a brand-new shadow profile
    pub async fn create_shadow(&self, profile: &StudentProfile) -> StoreResult<()> {
        self.store.insert_shadow_profile(profile).await?;
        Ok(())
    }

    /// Read-mutate-replace on the shadow collection with bounded retry
    pub async fn update_shadow<F>(&self, member_name: &str, mutate: F) -> StoreResult<StudentProfile>
    where
        F: Fn(&mut StudentProfile) + Send + Sync,
    {
        for _ in 0..CAS_RETRIES {
            let Versioned { mut doc, version } = self
                .store
                .get_shadow_profile(member_name)
                .await?
                .ok_or_else(|| {
                    StoreError::NotFound(format!(
                        "No time travel profile found for member '{}'",
                        member_name
                    ))
                })?;
            mutate(&mut doc);
            match self.store.replace_shadow_profile(&doc, version).await {
                Ok(_) => return Ok(doc),
                Err(StoreError::VersionConflict { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::VersionConflict {
            collection: "shadow_profiles".to_string(),
            key: member_name.to_string(),
        })
    }
}
