//! Domain models for the classbank backend.
//!
//! This module contains all store-backed documents representing
//! the core entities of the classroom banking simulation.

pub mod account;
pub mod message;

// Re-export all models for convenient access
pub use account::{
    Account, AccountType, Obligation, ObligationKind, RecurrenceKind, StudentProfile, Transaction,
};
pub use message::{
    class_target, class_teacher, thread_id_for, ChatMessage, MessageThread, ThreadKind,
    CLASS_TARGET_PREFIX,
};
