//! Transfer coordination
//!
//! Upload, download, copy, delete and the two render operations all run as
//! transfer sessions: single-flight, cooperatively cancellable, with a
//! progress stream that ends in exactly one terminal outcome.

pub mod coordinator;
pub mod request;

pub use coordinator::{
    TransferCoordinator, TransferEvent, TransferHandle, TransferOutcome, TransferState,
};
pub use request::{TransferKind, TransferRequest, TransferResult};
