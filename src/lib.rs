// addonpack - Addon capacity allocation and drawable numbering
// Packs clothing/prop drawables into capacity-bounded addons

#![warn(rust_2018_idioms)]

pub mod allocation;
pub mod config;
pub mod loader;
pub mod project;

// Re-exports for convenience
pub use allocation::{
    Addon, AllocationManager, DeleteReport, DeleteScope, Drawable, DrawableId, ImportReport,
    LoadPolicy, PartitionKey, Placement, Sex,
};
pub use config::AllocatorConfig;
pub use loader::{AssetParser, DetailsLoader, DrawableDetails, LoadState};

/// Allocation error types
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum Error {
        #[error("Capacity exceeded: {addon} cannot fit {requested} more {key} drawable(s) (limit {limit})")]
        CapacityExceeded {
            addon: String,
            key: String,
            requested: usize,
            limit: usize,
        },

        #[error("Unresolved drawable type: {0}")]
        UnresolvedType(String),

        #[error("Drawable not found: {0}")]
        DrawableNotFound(String),

        #[error("Addon not found: {0}")]
        AddonNotFound(usize),

        #[error("Texture limit reached: {0}")]
        TextureLimit(String),

        #[error("No backing file: {0}")]
        NoBackingFile(String),

        #[error("Parse error: {0}")]
        Parse(String),

        #[error("Load timed out: {0}")]
        LoadTimeout(String),

        #[error("Config error: {0}")]
        Config(String),

        #[error("Serialization error: {0}")]
        SerializationError(String),

        #[error("I/O error: {0}")]
        Io(String),

        #[error("Invalid argument: {0}")]
        InvalidArgument(String),
    }

    pub type Result<T> = std::result::Result<T, Error>;
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::error::Error;

    #[test]
    fn test_capacity_error_message() {
        let err = Error::CapacityExceeded {
            addon: "Addon 1".to_string(),
            key: "male/component/uppr(3)".to_string(),
            requested: 1,
            limit: 128,
        };
        let message = err.to_string();
        assert!(message.contains("Addon 1"));
        assert!(message.contains("limit 128"));
    }
}
