// src/store.rs

//! Abstract artifact store.
//!
//! Durable key-value storage for deposits and guidance documents, addressed
//! by build and unit id. The store is append-only: putting a record for a
//! unit appends a new version, prior versions are retained and never
//! overwritten, preserving the full build history.
//!
//! Concrete storage backends (files, databases) are out of scope for the
//! engine; the default [`MemoryStore`] keeps everything in process, which is
//! also what the tests use.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::deposit::{Deposit, Guidance};
use crate::errors::Result;
use crate::types::{BuildId, UnitId};

/// Append-only storage for the records a build produces.
///
/// Implementations must be shareable across the engine's executor tasks, so
/// the interface takes `&self` and implementations use interior mutability.
pub trait ArtifactStore: Send + Sync {
    /// Append a new deposit version for the given unit.
    fn put_deposit(&self, build_id: &BuildId, deposit: Deposit) -> Result<()>;

    /// Latest deposit version for a unit, if any.
    fn latest_deposit(&self, build_id: &BuildId, unit_id: &UnitId) -> Option<Deposit>;

    /// All deposit versions for a unit, oldest first.
    fn deposit_versions(&self, build_id: &BuildId, unit_id: &UnitId) -> Vec<Deposit>;

    /// Append a guidance document for the checkpoint that wrote it.
    /// Returns the store key usable as a `guidance_ref`.
    fn put_guidance(&self, build_id: &BuildId, guidance: Guidance) -> Result<String>;

    /// Latest guidance written by the given checkpoint, if any.
    fn latest_guidance(&self, build_id: &BuildId, checkpoint_id: &UnitId) -> Option<Guidance>;
}

/// In-memory append-only store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    deposits: Mutex<HashMap<(BuildId, UnitId), Vec<Deposit>>>,
    guidance: Mutex<HashMap<(BuildId, UnitId), Vec<Guidance>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn put_deposit(&self, build_id: &BuildId, deposit: Deposit) -> Result<()> {
        let key = (build_id.clone(), deposit.unit_id.clone());
        let mut deposits = self.deposits.lock().expect("deposit map poisoned");
        deposits.entry(key).or_default().push(deposit);
        Ok(())
    }

    fn latest_deposit(&self, build_id: &BuildId, unit_id: &UnitId) -> Option<Deposit> {
        let deposits = self.deposits.lock().expect("deposit map poisoned");
        deposits
            .get(&(build_id.clone(), unit_id.clone()))
            .and_then(|versions| versions.last().cloned())
    }

    fn deposit_versions(&self, build_id: &BuildId, unit_id: &UnitId) -> Vec<Deposit> {
        let deposits = self.deposits.lock().expect("deposit map poisoned");
        deposits
            .get(&(build_id.clone(), unit_id.clone()))
            .cloned()
            .unwrap_or_default()
    }

    fn put_guidance(&self, build_id: &BuildId, guidance: Guidance) -> Result<String> {
        let checkpoint_id = guidance.checkpoint_id.clone();
        let key = (build_id.clone(), checkpoint_id.clone());
        let mut map = self.guidance.lock().expect("guidance map poisoned");
        let versions = map.entry(key).or_default();
        versions.push(guidance);
        Ok(format!(
            "{build_id}/{checkpoint_id}/guidance/{}",
            versions.len()
        ))
    }

    fn latest_guidance(&self, build_id: &BuildId, checkpoint_id: &UnitId) -> Option<Guidance> {
        let map = self.guidance.lock().expect("guidance map poisoned");
        map.get(&(build_id.clone(), checkpoint_id.clone()))
            .and_then(|versions| versions.last().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit::DepositStatus;

    #[test]
    fn deposits_are_versioned_not_overwritten() {
        let store = MemoryStore::new();
        let build = "build-1".to_string();

        store
            .put_deposit(&build, Deposit::drop_pass(&build, "D1", vec!["a".into()]))
            .unwrap();
        store
            .put_deposit(&build, Deposit::execution_error(&build, "D1", "boom"))
            .unwrap();

        let versions = store.deposit_versions(&build, &"D1".to_string());
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].status, DepositStatus::Pass);
        assert_eq!(versions[1].status, DepositStatus::Fail);

        let latest = store.latest_deposit(&build, &"D1".to_string()).unwrap();
        assert_eq!(latest.status, DepositStatus::Fail);
    }
}
