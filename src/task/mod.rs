//! Task module - the research task entity, its findings and status machine.
//!
//! - All types use algebraic data types with exhaustive matching
//! - Invariants are documented and enforced by the only mutating methods
//! - Pure state changes live here; persistence lives in `store`

mod finding;
pub mod task;

pub use finding::Finding;
pub use task::{ProgressEntry, Task, TaskError, TaskId, TaskStatus, DEFAULT_PLAN};
