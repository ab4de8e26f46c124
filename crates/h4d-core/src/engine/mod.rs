//! # Engine Module
//!
//! This module implements the logic core of the H4D campaign driver: the
//! machinery that turns a solute batch and a parameter cascade into the exact
//! command documents the external Monte Carlo engine consumes, and that reads
//! the engine's state and results back from disk.
//!
//! ## Architecture
//!
//! The module is organized into specialized submodules:
//!
//! - **Configuration** ([`config`]) - Resolution of user-supplied, persisted,
//!   and mode-dependent default parameters into one immutable [`config::RunConfig`]
//! - **Water Models** ([`water`]) - The closed table of supported water
//!   force-field presets and their reduced constants
//! - **Checkpoint Indexing** ([`checkpoint`]) - Derivation of per-solute
//!   resumption indices from on-disk checkpoint artifacts
//! - **Protocol Encoding** ([`protocol`]) - Phase-specific serialization of a
//!   run configuration into the engine's positional command grammar
//! - **Output Analysis** ([`analysis`]) - Marker-based extraction of
//!   free-energy estimates from engine output, and result tabulation
//! - **Scheduling** ([`scheduler`]) - The seam to the cluster scheduler and to
//!   synchronous local engine invocation
//! - **Progress Monitoring** ([`progress`]) - Campaign progress callbacks
//! - **Error Handling** ([`error`]) - The campaign-level error umbrella

pub mod analysis;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod progress;
pub mod protocol;
pub mod scheduler;
pub mod water;
