//! inigrid: grid construction from INI parameter files
//!
//! Layers, innermost first:
//! - [`domain`]: parameter trees, backend tags, strategies, grids, comparison
//! - [`application`]: backend builders and services (factory, recorder, comparison)
//! - [`infrastructure`]: filesystem boundary and service wiring
//! - [`cli`]: argument parsing and command handlers

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
