//! taskmill scheduler.
//!
//! Periodic-task automation against a Redmine-style tracker: a rollover
//! check that spawns successor issues for completed recurring tasks, a
//! one-time catalog seeding pass, and CSV snapshots of reference data.

pub mod config;
pub mod db;
pub mod engine;
pub mod export;
pub mod redmine;
