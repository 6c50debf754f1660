//! zen - personal task manager library
//!
//! Clients (projects) own ordered tasks. Every reversible change is
//! recorded in a linear undo history, and progress (streaks, points,
//! levels, achievements) is derived from the current state on demand.
//!
//! # Core Concepts
//!
//! - **Entity store**: projects in id order, each owning its tasks
//! - **History log**: typed, reversible entries plus a cursor
//! - **Derived pipeline**: stats, achievements and levels recomputed from scratch
//! - **Persistence gateway**: primary JSON file with a key/value fallback,
//!   written through a debounced single-flight writer
//!
//! # Module Organization
//!
//! - `model`: value types and their JSON shape
//! - `store`: the entity store and its mutators
//! - `history` / `undo`: the log and the engine applying it
//! - `session`: store + history + focus + achievements for one run
//! - `stats`, `gamification`, `analytics`, `scoring`: derived views
//! - `focus`: focus session tracking
//! - `normalize`: per-record validation of loaded data
//! - `storage`, `lock`, `writer`: persistence
//! - `config`: `zen.toml` loading
//! - `cli`, `output`: the command-line surface

pub mod analytics;
pub mod cli;
pub mod config;
pub mod error;
pub mod focus;
pub mod gamification;
pub mod history;
pub mod lock;
pub mod model;
pub mod normalize;
pub mod output;
pub mod scoring;
pub mod session;
pub mod stats;
pub mod storage;
pub mod store;
pub mod undo;
pub mod writer;

pub use error::{Error, Result};
