//! Core setup logic
//!
//! Side effects are delegated to [`crate::infra`]; the modules here decide
//! what to do and in which order.
//!
//! # Submodules
//!
//! - [`platform`] - OS family detection and native dependency tables
//! - [`toolchain`] - Toolchain pin file parsing and rustup commands
//! - [`viper`] - Viper tools bundle selection and install stamp
//! - [`setup`] - The bootstrapper running all setup phases
//! - [`doctor`] - Read-only environment checks

pub mod doctor;
pub mod platform;
pub mod setup;
pub mod toolchain;
pub mod viper;
