//! Error types for world generation and the core façade.

use thiserror::Error;

use crate::geometry::Bounds;
use crate::pipeline::ModuleKind;

/// Errors surfaced by the generation pipeline and configuration layer.
#[derive(Debug, Error)]
pub enum WorldError {
    /// A module failed while generating; downstream modules were skipped.
    #[error("generation of {module} failed: {cause}")]
    Generation { module: ModuleKind, cause: String },

    /// A module was registered (or regenerated) without one of its predecessors.
    #[error("{module} depends on {dependency}, which is not registered")]
    DependencyMissing {
        module: ModuleKind,
        dependency: ModuleKind,
    },

    /// Registering the module would introduce a dependency cycle.
    #[error("registering {module} would create a dependency cycle")]
    DependencyCycle { module: ModuleKind },

    #[error("{0} is already registered")]
    DuplicateModule(ModuleKind),

    #[error("{0} is not registered")]
    UnknownModule(ModuleKind),

    /// The configured bounds are inverted.
    #[error("region {0:?} contains no cells")]
    EmptyRegion(Bounds),

    #[error("unknown module name '{0}'")]
    UnknownModuleName(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WorldError>;
