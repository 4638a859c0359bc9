//! Core types for the squeal-sync framework.
//!
//! This crate provides the foundational types shared by the document source
//! and the relational sink:
//!
//! - [`Value`] - Scalar value written into a relational column
//! - [`Row`] / [`ForeignKey`] - A mapped relational row and its parent link
//! - [`ProgressSink`] - Receiver of "advance by N" ticks
//! - [`RetryPolicy`] - Bounded exponential backoff for transient failures
//!
//! # Architecture
//!
//! ```text
//! sync-core (this crate)
//!    │
//!    ├─── mongodb-types               (BSON → Value)
//!    ├─── squeal-sync-mongodb-source  (documents in, counters, progress ticks)
//!    └─── sql-sink                    (Row → SQL statements)
//! ```

pub mod progress;
pub mod retry;
pub mod row;
pub mod value;

pub use progress::{LogProgress, NoopProgress, ProgressSink};
pub use retry::RetryPolicy;
pub use row::{ForeignKey, Row, ROW_ID_COLUMN};
pub use value::Value;
