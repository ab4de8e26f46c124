//! # H4D Core Library
//!
//! A campaign driver for computing hydration free energies (HFEs) of batches of
//! chemical solutes with an external 4D-insertion Monte Carlo engine (H4D-MC).
//! The engine is a black box: it consumes positional, fixed-format command
//! documents on standard input, tracks its progress through numbered checkpoint
//! artifacts on disk, and reports free-energy estimates as free text. This
//! library owns everything around that black box.
//!
//! ## Architectural Philosophy
//!
//! The library is designed with a strict three-layer architecture to ensure a clear
//! separation of concerns, making it modular, testable, and extensible.
//!
//! - **[`core`]: The Foundation.** Contains stateless data models (the solute
//!   catalog) and the physical constants shared by the upper layers.
//!
//! - **[`engine`]: The Logic Core.** This layer resolves the cascading parameter
//!   set into an immutable run configuration, probes checkpoint artifacts to
//!   derive resumption indices, encodes phase-specific protocol documents in the
//!   engine's exact wire format, parses the engine's textual output, and
//!   abstracts over the cluster scheduler.
//!
//! - **[`workflows`]: The Public API.** This is the highest-level, user-facing
//!   layer. It iterates the solute batch, stages per-solute workspaces, and
//!   drives the initialisation, production, and analysis campaigns end to end.

pub mod core;
pub mod engine;
pub mod workflows;
