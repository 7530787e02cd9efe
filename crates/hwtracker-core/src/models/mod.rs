//! Data models for homework entities.
//!
//! - `Homework`: an item as served by the backend
//! - `NewHomework`: the body posted to create one

pub mod homework;

pub use homework::{sort_by_due_date, Homework, NewHomework};
