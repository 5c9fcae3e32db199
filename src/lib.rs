//! wyrd - Personal Time Tracker Core
//!
//! This library provides the in-memory model and persistence round-trip of
//! a personal time tracker: projects and tasks, boolean prerequisite
//! groupings over them, and work slots - continuous recorded stretches of
//! work on one task.
//!
//! # Core Concepts
//!
//! - **Intervals**: time spans with optionally open ends
//! - **Work slots**: an interval bound to a task; open until its end is set
//! - **Groupings**: and/or/list combinations of tasks and subgroups,
//!   expressing prerequisites over a shared graph
//! - **Session**: the in-memory universe, loaded from and flushed back to
//!   an XML store plus a plain-text project list, with backup-on-write
//!
//! # Module Organization
//!
//! - `config`: configuration loading from `wyrd.toml`
//! - `error`: error types and result aliases
//! - `ident`: per-entity-kind id allocation
//! - `timerepr`: timestamp and duration wire formats
//! - `worktime`: intervals and work slots
//! - `task`: the task entity
//! - `grouping`: and/or/list groupings of tasks and subgroups
//! - `xml`: the XML persistence backend
//! - `backup`: backup-before-write file discipline
//! - `store`: the session store coordinating memory and disk

pub mod backup;
pub mod config;
pub mod error;
pub mod grouping;
pub mod ident;
pub mod store;
pub mod task;
pub mod timerepr;
pub mod worktime;
pub mod xml;

pub use error::{Error, Result};
