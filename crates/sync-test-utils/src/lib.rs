//! Shared test utilities for the artefact-sync workspace.
//!
//! This crate provides standardised test fixtures to eliminate duplication
//! across crate test suites. It is a dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`registry`]: [`registry::TestRegistry`] builder for temporary content
//!   trees with definition files and engine configuration

pub mod registry;
