use common_lib::error::ErrorKind;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("resource '{}' not found", name))]
    ResourceNotFound { name: String },

    #[snafu(display("dynamic resource lifecycle '{}' not found", resource_type))]
    LifeCycleNotFound { resource_type: String },

    #[snafu(display("resource '{}' already exists", name))]
    ResourceExists { name: String },

    #[snafu(display("dynamic resource lifecycle '{}' already exists", resource_type))]
    LifeCycleExists { resource_type: String },

    #[snafu(display(
        "optimistic lock lost writing '{}': expected version {}, found {}",
        name,
        expected,
        found
    ))]
    VersionConflict {
        name: String,
        expected: u64,
        found: u64,
    },

    #[snafu(display("failed to persist snapshot to '{}': {}", path, source))]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[snafu(display("failed to (de)serialise snapshot: {}", source))]
    Serde { source: serde_json::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ResourceNotFound { .. } | Error::LifeCycleNotFound { .. } => ErrorKind::NotFound,
            Error::ResourceExists { .. }
            | Error::LifeCycleExists { .. }
            | Error::VersionConflict { .. } => ErrorKind::Conflict,
            Error::Persist { .. } | Error::Serde { .. } => ErrorKind::Internal,
        }
    }
}
