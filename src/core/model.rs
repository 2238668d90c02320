//! A named family of versioned model instances
//!
//! The version map is ordered by version. Lifecycle writers (add, reload,
//! retire) coordinate through the map's write lock and per-instance state
//! claims: adds reserve their slot under one write-lock acquisition and
//! retires claim the UNLOADING transition atomically, so racing calls cannot
//! double-insert or double-retire. Lookups clone the tracked entry under the
//! read lock and release it before touching guards. No lock is ever held
//! across an await.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::{
    config::ModelConfig,
    core::{
        custom_loader::CustomLoader,
        error::{ServingError, ServingResult},
        instance::{
            ModelInstanceFactory, ModelInstanceState, ModelVersion, TrackedInstance,
        },
    },
};

/// One model name and the set of versions loaded for it.
pub struct Model {
    name: String,
    versions: RwLock<BTreeMap<ModelVersion, Arc<TrackedInstance>>>,
    /// 0 means no version is available.
    default_version: AtomicU64,
    custom_loader: RwLock<Option<Arc<dyn CustomLoader>>>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            versions: RwLock::new(BTreeMap::new()),
            default_version: AtomicU64::new(0),
            custom_loader: RwLock::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version resolved for lookups that do not pin one, or `None` when
    /// no version is available.
    pub fn default_version(&self) -> Option<ModelVersion> {
        match self.default_version.load(Ordering::Acquire) {
            0 => None,
            v => Some(ModelVersion::new(v)),
        }
    }

    /// Attach a custom loader capability. Its lifetime is the Model's.
    pub fn set_custom_loader(&self, loader: Arc<dyn CustomLoader>) {
        *self.custom_loader.write() = Some(loader);
    }

    pub fn custom_loader(&self) -> Option<Arc<dyn CustomLoader>> {
        self.custom_loader.read().clone()
    }

    /// Construct, load, and insert instances for each listed version.
    ///
    /// Partially inserted versions remain on failure; the first error is
    /// returned. Versions already present are left untouched.
    pub async fn add_versions(
        &self,
        versions: &[ModelVersion],
        config: &ModelConfig,
        factory: &dyn ModelInstanceFactory,
    ) -> ServingResult<()> {
        let mut first_error = None;

        for &version in versions {
            // Reserve the slot in LOADING state under a single write-lock
            // acquisition; a racing add of the same version loses the
            // reservation here and skips instead of clobbering the entry.
            let reserved = {
                let mut map = self.versions.write();
                if map.contains_key(&version) {
                    None
                } else {
                    let tracked = TrackedInstance::new(factory.create(&self.name, version));
                    map.insert(version, Arc::clone(&tracked));
                    Some(tracked)
                }
            };
            let Some(tracked) = reserved else {
                warn!(model = %self.name, %version, "version already loaded, skipping");
                continue;
            };

            match tracked.instance().load(config).await {
                Ok(()) => {
                    tracked.set_state(ModelInstanceState::Available);
                    debug!(model = %self.name, %version, "version loaded");
                }
                Err(e) => {
                    // Failed loads stay in the map in LOADING state; they
                    // never resolve and a later reload can recover them.
                    warn!(model = %self.name, %version, error = %e, "version failed to load");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.update_default_version();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reload already-present versions under a new configuration.
    ///
    /// Each version is quiesced first: the state leaves AVAILABLE so new
    /// lookups fail, outstanding guards drain on the old state, then the
    /// instance reloads and becomes AVAILABLE again. Returns the first error
    /// encountered; remaining versions are still processed.
    pub async fn reload_versions(
        &self,
        versions: &[ModelVersion],
        config: &ModelConfig,
    ) -> ServingResult<()> {
        let mut first_error = None;

        for (version, tracked) in self.snapshot(versions) {
            let Some(tracked) = tracked else {
                warn!(model = %self.name, %version, "cannot reload version that was never loaded");
                if first_error.is_none() {
                    first_error = Some(ServingError::ModelVersionMissing {
                        name: self.name.clone(),
                        version: version.get(),
                    });
                }
                continue;
            };
            if tracked.state() == ModelInstanceState::Retired {
                warn!(model = %self.name, %version, "cannot reload retired version");
                continue;
            }

            // Quiesce before waiting, and re-elect immediately: the default
            // must never point at a version that is no longer AVAILABLE.
            tracked.set_state(ModelInstanceState::Loading);
            self.update_default_version();
            tracked.wait_drained().await;

            match tracked.instance().reload(config).await {
                Ok(()) => {
                    tracked.set_state(ModelInstanceState::Available);
                    debug!(model = %self.name, %version, "version reloaded");
                }
                Err(e) => {
                    warn!(model = %self.name, %version, error = %e, "version failed to reload");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        self.update_default_version();
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Transition the listed versions to RETIRED.
    ///
    /// Once this returns, no lookup resolves those versions. Versions with
    /// outstanding guards are drained first; entries stay in the map. Listed
    /// versions that were never loaded are skipped with a warning.
    pub async fn retire_versions(&self, versions: &[ModelVersion]) -> ServingResult<()> {
        for (version, tracked) in self.snapshot(versions) {
            let Some(tracked) = tracked else {
                warn!(model = %self.name, %version, "cannot retire version that was never loaded");
                continue;
            };

            // Flip the state before waiting: no new guard can be acquired
            // from this point on, so the drain is monotonic. A lost claim
            // means another retirement already owns this version.
            if !tracked.begin_unloading() {
                debug!(model = %self.name, %version, "version already retiring or retired");
                continue;
            }
            self.update_default_version();

            tracked.wait_drained().await;
            tracked.instance().retire().await;
            tracked.set_state(ModelInstanceState::Retired);
            debug!(model = %self.name, %version, "version retired");
        }

        self.update_default_version();
        Ok(())
    }

    /// Retire every version currently in the map.
    pub async fn retire_all_versions(&self) -> ServingResult<()> {
        let all: Vec<ModelVersion> = self.versions.read().keys().copied().collect();
        self.retire_versions(&all).await
    }

    /// The tracked instance at an exact version, if present.
    ///
    /// Does not acquire a guard; callers combine this with
    /// [`TrackedInstance::acquire_guard`].
    pub fn get_model_instance_by_version(
        &self,
        version: ModelVersion,
    ) -> Option<Arc<TrackedInstance>> {
        self.versions.read().get(&version).cloned()
    }

    /// The tracked instance at the default version, or `None` when the
    /// default is unset.
    pub fn get_default_model_instance(&self) -> Option<Arc<TrackedInstance>> {
        let version = self.default_version()?;
        self.get_model_instance_by_version(version)
    }

    /// Snapshot of (version, state) pairs, for status reporting.
    pub fn version_states(&self) -> Vec<(ModelVersion, ModelInstanceState)> {
        self.versions
            .read()
            .iter()
            .map(|(v, t)| (*v, t.state()))
            .collect()
    }

    /// Elect the default: the greatest version whose instance is AVAILABLE,
    /// or 0 when none is.
    fn update_default_version(&self) {
        let elected = {
            let versions = self.versions.read();
            versions
                .iter()
                .rev()
                .find(|(_, tracked)| tracked.is_available())
                .map(|(v, _)| v.get())
                .unwrap_or(0)
        };
        let previous = self.default_version.swap(elected, Ordering::AcqRel);
        if previous != elected {
            debug!(model = %self.name, from = previous, to = elected, "default version changed");
        }
    }

    /// Clone the tracked entries for the listed versions under one read
    /// lock acquisition, so awaits never overlap the lock.
    fn snapshot(
        &self,
        versions: &[ModelVersion],
    ) -> Vec<(ModelVersion, Option<Arc<TrackedInstance>>)> {
        let map = self.versions.read();
        versions.iter().map(|v| (*v, map.get(v).cloned())).collect()
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("versions", &self.version_states())
            .field("default_version", &self.default_version())
            .finish()
    }
}
