//! Storage layer for sensor readings.
//!
//! [`history::TimePartitionedLog`] appends every fresh reading to an
//! append-only CSV file per topic and UTC calendar day and answers range
//! queries across partitions. [`cache::LastValueCache`] keeps the most
//! recent reading per topic in memory for rule evaluation and status
//! display.

pub mod cache;
pub mod error;
pub mod history;


pub use cache::LastValueCache;
pub use history::TimePartitionedLog;
