//! Model instance contract and lifecycle tracking
//!
//! A [`ModelInstance`] is the collaborator that owns artifact I/O and tensor
//! compute for one (name, version) pair. The core wraps every instance in a
//! [`TrackedInstance`] that carries the lifecycle state machine and the
//! unload-guard accounting; the collaborator never sees either.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::{
    config::ModelConfig,
    core::{
        error::{ServingError, ServingResult},
        tensor::{TensorMap, TensorSchema},
    },
};

/// Version identifier of a model artifact. Strictly positive, dense but not
/// necessarily contiguous; higher is newer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ModelVersion(u64);

impl ModelVersion {
    pub fn new(version: u64) -> Self {
        debug_assert!(version > 0, "model versions are strictly positive");
        Self(version)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inference executor for one (name, version) pair.
///
/// Implementations own artifact loading and tensor compute. The core drives
/// the lifecycle callbacks and guarantees `execute` is never called after
/// `retire` has completed.
#[async_trait]
pub trait ModelInstance: Send + Sync {
    /// Model name this instance belongs to.
    fn name(&self) -> &str;

    /// Version this instance serves.
    fn version(&self) -> ModelVersion;

    /// Configuration the instance was loaded (or last reloaded) under.
    fn model_config(&self) -> ModelConfig;

    /// Input tensor schema: name to shape+dtype descriptor.
    fn inputs_info(&self) -> &TensorSchema;

    /// Output tensor schema: name to shape+dtype descriptor.
    fn outputs_info(&self) -> &TensorSchema;

    /// Load the artifact under the given configuration.
    async fn load(&self, config: &ModelConfig) -> ServingResult<()>;

    /// Reload under a new configuration. Called only after all outstanding
    /// guards have drained; new lookups resolve the post-reload state.
    async fn reload(&self, config: &ModelConfig) -> ServingResult<()>;

    /// Release artifact resources. Called exactly once, after drain.
    async fn retire(&self);

    /// Run inference over the bound inputs.
    async fn execute(&self, inputs: &TensorMap) -> ServingResult<TensorMap>;
}

/// Factory constructing collaborator instances for the registry.
///
/// Construction is cheap and synchronous; artifact I/O happens in
/// [`ModelInstance::load`].
pub trait ModelInstanceFactory: Send + Sync {
    fn create(&self, name: &str, version: ModelVersion) -> Arc<dyn ModelInstance>;
}

impl fmt::Debug for dyn ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// Lifecycle state of a tracked instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelInstanceState {
    /// Artifact load or reload in progress; lookups fail.
    Loading,
    /// Serving; lookups succeed and guards can be acquired.
    Available,
    /// Retirement requested; draining outstanding guards.
    Unloading,
    /// Terminal. The entry stays in the version map but never resolves.
    Retired,
}

/// An instance plus the lifecycle accounting the core keeps for it.
///
/// Guard acquisition takes the state lock briefly; retirement flips the state
/// first (so no new guards appear) and then awaits the drain notification.
/// The state lock is never held across an await point.
pub struct TrackedInstance {
    instance: Arc<dyn ModelInstance>,
    state: RwLock<ModelInstanceState>,
    guard_count: AtomicUsize,
    drained: Notify,
}

impl TrackedInstance {
    pub fn new(instance: Arc<dyn ModelInstance>) -> Arc<Self> {
        Arc::new(Self {
            instance,
            state: RwLock::new(ModelInstanceState::Loading),
            guard_count: AtomicUsize::new(0),
            drained: Notify::new(),
        })
    }

    pub fn instance(&self) -> Arc<dyn ModelInstance> {
        Arc::clone(&self.instance)
    }

    pub fn name(&self) -> &str {
        self.instance.name()
    }

    pub fn version(&self) -> ModelVersion {
        self.instance.version()
    }

    pub fn state(&self) -> ModelInstanceState {
        *self.state.read()
    }

    pub fn is_available(&self) -> bool {
        self.state() == ModelInstanceState::Available
    }

    pub(crate) fn set_state(&self, state: ModelInstanceState) {
        let mut current = self.state.write();
        tracing::debug!(
            model = self.name(),
            version = %self.version(),
            from = ?*current,
            to = ?state,
            "model instance state transition"
        );
        *current = state;
    }

    /// Number of outstanding unload guards. Exposed for status reporting.
    pub fn guard_count(&self) -> usize {
        self.guard_count.load(Ordering::Acquire)
    }

    /// Claim the UNLOADING transition. Returns false when another retirement
    /// already owns it or the instance is terminal, so the collaborator's
    /// `retire` runs exactly once.
    pub(crate) fn begin_unloading(&self) -> bool {
        let mut state = self.state.write();
        if matches!(
            *state,
            ModelInstanceState::Unloading | ModelInstanceState::Retired
        ) {
            return false;
        }
        tracing::debug!(
            model = self.name(),
            version = %self.version(),
            from = ?*state,
            "model instance state transition to Unloading"
        );
        *state = ModelInstanceState::Unloading;
        true
    }

    /// Acquire a do-not-retire pin on this instance.
    ///
    /// Fails unless the instance is AVAILABLE. The increment happens under
    /// the state read lock so a concurrent retire observes either the old
    /// state (and waits for this guard) or a count that already includes it.
    pub fn acquire_guard(self: &Arc<Self>) -> ServingResult<ModelInstanceUnloadGuard> {
        let state = self.state.read();
        if *state != ModelInstanceState::Available {
            return Err(ServingError::ModelVersionNotLoaded {
                name: self.name().to_string(),
                version: self.version().get(),
            });
        }
        self.guard_count.fetch_add(1, Ordering::AcqRel);
        drop(state);
        Ok(ModelInstanceUnloadGuard {
            tracked: Arc::clone(self),
        })
    }

    /// Wait until every outstanding guard has been dropped.
    pub(crate) async fn wait_drained(&self) {
        loop {
            let notified = self.drained.notified();
            if self.guard_count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn release_guard(&self) {
        if self.guard_count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }
}

impl fmt::Debug for TrackedInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedInstance")
            .field("model", &self.name())
            .field("version", &self.version())
            .field("state", &self.state())
            .field("guards", &self.guard_count())
            .finish()
    }
}

/// Scoped pin preventing retirement of a specific instance.
///
/// Purely a lifecycle lock: it is not a handle to the instance, and dropping
/// it on any exit path (normal, error, panic unwind) releases the pin.
/// Concurrent guards on one instance coexist freely; collectively they defer
/// the transition to RETIRED until the last one drops.
pub struct ModelInstanceUnloadGuard {
    tracked: Arc<TrackedInstance>,
}

impl Drop for ModelInstanceUnloadGuard {
    fn drop(&mut self) {
        self.tracked.release_guard();
    }
}

impl fmt::Debug for ModelInstanceUnloadGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstanceUnloadGuard")
            .field("model", &self.tracked.name())
            .field("version", &self.tracked.version())
            .finish()
    }
}
