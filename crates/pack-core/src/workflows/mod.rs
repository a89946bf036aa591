//! # Workflows Module
//!
//! The user-facing layer: complete procedures that tie the `core` data
//! models and the `engine` machinery together. [`pack::run`] takes a
//! validated problem description and returns the best assignment found by
//! simulated annealing.

pub mod pack;
