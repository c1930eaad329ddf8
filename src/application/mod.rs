// Application layer - use cases and orchestration.
// The LedgerService owns the in-memory ledger, drives the repository and
// runs the interest scheduler.

pub mod error;
mod scheduler;
mod service;
pub mod statement;

pub use error::*;
pub use scheduler::*;
pub use service::*;
