//! Error types for event transport.
//!
//! Expected outcomes (a denylisted or unclassifiable object) are errors too.
//! They are told apart by the context they carry: see
//! [`TransportError::object_key`] and [`TransportError::workload`].

use crate::event::EventShapeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The invocation payload is not a replication or object-created event
    #[error("Event is not an accepted type")]
    NotAccepted(#[source] EventShapeError),

    /// The object key matched the denylist
    #[error("Workload is unsupported")]
    UnsupportedWorkload { object_key: String },

    /// No classification rule matched; the event was sent to the DLQ
    #[error("Unsupported workload sent to DLQ")]
    UnknownWorkload {
        object_key: String,
        workload: Option<String>,
    },

    #[error("Failed to resolve CBS ID for account '{}'", .account_id.as_deref().unwrap_or("None"))]
    PartnerNotFound { account_id: Option<String> },

    #[error("Couldn't find accelerator being used by '{cbs_id}' (recorded as '{accelerator}')")]
    UnknownAccelerator { cbs_id: String, accelerator: String },

    #[error("Unknown accelerator metadata: '{metadata}'")]
    MalformedAcceleratorMetadata { metadata: String },

    /// Registry, object store or messaging failure
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl TransportError {
    /// Object key context, present only for per-object outcomes
    pub fn object_key(&self) -> Option<&str> {
        match self {
            Self::UnsupportedWorkload { object_key } | Self::UnknownWorkload { object_key, .. } => {
                Some(object_key)
            }
            _ => None,
        }
    }

    /// Workload context, present only when a workload was inferred
    pub fn workload(&self) -> Option<&str> {
        match self {
            Self::UnknownWorkload { workload, .. } => workload.as_deref(),
            _ => None,
        }
    }
}

impl From<ObjectStoreError> for TransportError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::Other(source) => Self::Collaborator(source),
            not_found => Self::Collaborator(anyhow::Error::new(not_found)),
        }
    }
}

/// Errors returned by [`crate::ports::ObjectStore`]
#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Object 's3://{bucket}/{key}' does not exist")]
    NotFound { bucket: String, key: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
