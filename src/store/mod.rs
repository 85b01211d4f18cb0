//! File-backed persistence: run state, history table and the run lock.
//!
//! Neither store supports concurrent writers; [`RunLock`] keeps overlapping
//! invocations apart.

mod history;
mod lock;
mod state;

pub use history::{HistoryStore, HISTORY_COLUMNS};
pub use lock::RunLock;
pub use state::StateStore;
