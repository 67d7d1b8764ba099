//! Task Recur Library
//!
//! A personal task tracker core whose main subsystem is the recurring-task
//! engine: lazy instance generation, due-date advancement, limit/enable
//! gating, sibling propagation and integrity checks.

pub mod advance;
pub mod cli;
pub mod clock;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod format;
pub mod gate;
pub mod integrity;
pub mod logging;
pub mod materialize;
pub mod period;
pub mod propagate;
pub mod types;
