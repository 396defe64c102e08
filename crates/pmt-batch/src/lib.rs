//! # pmt-batch: Parallel Batch Driver
//!
//! Fans a batch of maintenance orders out over a rayon pool, runs the full
//! model → problem → solver → analyzer pipeline per order, and assembles a
//! priority-ordered schedule with the error side-channel. Storage is a seam
//! ([`Storage`]) so the driver never touches a concrete backing store.

pub mod job;
pub mod runner;
pub mod storage;

pub use job::{BatchOutcome, OrderFailure, OrderFrontier, ScheduleRow};
pub use runner::{optimize_orders, BatchOptions};
pub use storage::Storage;
