use common_lib::error::ErrorKind;
use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("resource '{}' not found", name))]
    NotFound { name: String },

    #[snafu(display("no resource of type '{}' in state '{}' is free", resource_type, state))]
    NoCandidate { resource_type: String, state: String },

    #[snafu(display(
        "request '{}' is not at the head of the queue for ({}, {})",
        request_id,
        resource_type,
        state
    ))]
    NotHeadOfQueue {
        resource_type: String,
        state: String,
        request_id: String,
    },

    #[snafu(display("request '{}' has expired", request_id))]
    RequestExpired { request_id: String },

    #[snafu(display(
        "resource '{}' is owned by '{}', not '{}'",
        name,
        actual_owner,
        owner
    ))]
    Unauthorized {
        name: String,
        owner: String,
        actual_owner: String,
    },

    #[snafu(display(
        "resource '{}' is in state '{}', expected '{}'",
        name,
        actual_state,
        expected_state
    ))]
    StateMismatch {
        name: String,
        expected_state: String,
        actual_state: String,
    },

    #[snafu(display("resource '{}' is currently owned by '{}' and cannot be removed", name, owner))]
    ResourceBusy { name: String, owner: String },

    #[snafu(display(
        "dynamic resource lifecycle for type '{}' still has {} live resources",
        resource_type,
        remaining
    ))]
    LifeCycleDraining { resource_type: String, remaining: usize },

    #[snafu(display(
        "type '{}' is declared both as a static resource and as a dynamic resource lifecycle",
        resource_type
    ))]
    TypeCollision { resource_type: String },

    #[snafu(display("invalid config: {}", reason))]
    InvalidConfig { reason: String },

    #[snafu(display("store error: {}", source))]
    Store { source: store::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } | Error::NoCandidate { .. } => ErrorKind::NotFound,
            Error::NotHeadOfQueue { .. }
            | Error::RequestExpired { .. }
            | Error::StateMismatch { .. }
            | Error::ResourceBusy { .. }
            | Error::LifeCycleDraining { .. } => ErrorKind::Conflict,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::TypeCollision { .. } | Error::InvalidConfig { .. } => ErrorKind::BadRequest,
            Error::Store { source } => source.kind(),
        }
    }
}

impl From<store::Error> for Error {
    fn from(source: store::Error) -> Self {
        Error::Store { source }
    }
}
