// cbs-core - Platform-agnostic transport logic
//
// Everything needed to decide what happens to one replicated log object:
// which partner sent it, what workload it is, whether it goes downstream or
// to the dead-letter queue, and how dead letters are grouped afterwards.
//
// I/O is reached only through the traits in `ports`; AWS implementations
// live in cbs-aws and the Lambda wiring in cbs-lambda.

pub mod classify;
pub mod error;
pub mod event;
pub mod message;
pub mod partner;
pub mod ports;
pub mod sanitize;
pub mod transport;
pub mod triage;
pub mod vpc;

// Re-export commonly used types
pub use classify::{classify, is_supported_workload, TableClassifier, Workload, WorkloadClassifier};
pub use error::{ObjectStoreError, TransportError};
pub use event::{AcceleratorChange, CbsEvent, EventInterpreter, EventShapeError};
pub use partner::{Accelerator, Partner, PartnerSnapshot, PartnerUpdate};
pub use sanitize::sanitize;
pub use transport::{
    AlarmSuppression, AlarmType, InvocationContext, Transport, TransportPorts, TransportSettings,
};
pub use triage::{Triage, TriageOutcome, UnknownWorkloadEntry};
