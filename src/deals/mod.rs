pub mod audit;
pub mod state_machine;
pub mod types;

pub use audit::{AuditRecorder, SYSTEM_ACTOR};
pub use state_machine::{DealStateMachine, TransitionError};
pub use types::{
    AuditEntry, CommPref, Company, Customer, Deal, DealStatus, DealType, DriveConfig, FileLabel,
    FileLink, Participant, ParticipantKind,
};
