//! # Workflows Module
//!
//! This module provides the high-level campaign workflows that drive a batch
//! of solutes through the H4D pipeline end to end.
//!
//! ## Overview
//!
//! Workflows are the top-level entry points for users of the library. Each
//! one iterates the solute catalog in order, resolves the per-solute
//! resumption index, encodes the phase documents, and hands them to the
//! scheduler or the engine. Per-solute failures are isolated and reported;
//! one bad solute never blocks the batch.
//!
//! - **Campaign workflows** ([`campaign`]) - initialisation, production,
//!   analysis, and the structure-only variants.
//! - **Workspace staging** ([`workspace`]) - creation and population of the
//!   per-solute working directories the engine runs in.

pub mod campaign;
pub mod workspace;
