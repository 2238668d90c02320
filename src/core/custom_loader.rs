//! Custom loader capability
//!
//! A polymorphic hook a Model can carry for artifact sourcing that the
//! built-in path cannot express (encrypted stores, remote vaults). Only the
//! attachment contract lives here; concrete loaders are external plugins.

use async_trait::async_trait;

use crate::core::{error::ServingResult, instance::ModelVersion};

/// Capability object registered against a Model. Shared by the Model that
/// registers it; lifetime is the Model's lifetime.
#[async_trait]
pub trait CustomLoader: Send + Sync {
    /// Loader identity, for logging and config wiring.
    fn loader_name(&self) -> &str;

    /// One-time initialization from the loader's own config blob.
    async fn initialize(&self, loader_config: &str) -> ServingResult<()>;

    /// Source the artifact for one version into the given base path.
    async fn load(
        &self,
        model_name: &str,
        version: ModelVersion,
        base_path: &str,
    ) -> ServingResult<()>;

    /// Release loader-side resources for one version.
    async fn unload(&self, model_name: &str, version: ModelVersion) -> ServingResult<()>;

    /// Whether the loader currently refuses to serve this version.
    fn is_blacklisted(&self, _model_name: &str, _version: ModelVersion) -> bool {
        false
    }

    /// Final teardown when the owning Model is dropped.
    async fn deinitialize(&self) {}
}
