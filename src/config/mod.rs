//! Configuration constants
//!
//! - [`defaults`] - Default values, file names and component lists
//! - [`urls`] - Download locations for the Viper tools bundles

pub mod defaults;
pub mod urls;
