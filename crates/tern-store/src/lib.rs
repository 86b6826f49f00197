//! # tern-store
//!
//! SQLite-backed persistence for Tern: the user registry and the task store.

mod store;

pub use store::{Store, Task, TaskStatus, UserProfile};
