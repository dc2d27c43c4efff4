//! Command implementations.

pub mod day;
