//! Local layout and remote store seams.

pub mod artifact_store;
pub mod paths;
pub mod results_store;

pub use artifact_store::{HttpArtifactStore, ModelArtifactStore};
pub use paths::EdgePaths;
pub use results_store::{HttpResultsStore, RemoteResultsStore};
