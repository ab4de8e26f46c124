//! # Core Module
//!
//! This module provides the stateless foundations of the H4D campaign driver:
//! the solute catalog that defines which molecules a campaign covers, and the
//! physical constants used when reducing force-field parameters to the
//! engine's internal units.
//!
//! ## Overview
//!
//! Everything in this layer is a plain value: records are immutable once
//! loaded and carry no behavior beyond validation at load time. The upper
//! layers ([`crate::engine`], [`crate::workflows`]) combine these values with
//! filesystem state and user-supplied parameters.

pub mod catalog;
pub mod constants;
