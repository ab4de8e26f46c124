//! Closed table of supported water force-field presets.
//!
//! The engine receives water geometry and charge as opaque numbers; this
//! module is the only place where model names map to those numbers. Well
//! depths are tabulated in kJ/mol and reduced by kT at resolve time
//! ([`crate::engine::config`]).

/// Raw constants for one named water model, before unit reduction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterModelData {
    /// Lennard-Jones sigma of the oxygen site, in Å.
    pub sigma: f64,
    /// Lennard-Jones well depth, in kJ/mol.
    pub well_depth_kj_mol: f64,
    /// O-H bond length, in Å.
    pub bond_length: f64,
    /// H-O-H angle, in degrees.
    pub bond_angle: f64,
    /// Partial charge of each hydrogen site, in e.
    pub hydrogen_charge: f64,
    /// Dielectric constant code expected by the engine.
    pub dielectric_code: u32,
}

pub const TIP3P: WaterModelData = WaterModelData {
    sigma: 3.15061,
    well_depth_kj_mol: 0.6364,
    bond_length: 0.9572,
    bond_angle: 104.52,
    hydrogen_charge: 0.4170,
    dielectric_code: 99,
};

pub const SPCE: WaterModelData = WaterModelData {
    sigma: 3.166,
    well_depth_kj_mol: 0.65,
    bond_length: 1.0000,
    bond_angle: 109.47,
    hydrogen_charge: 0.4238,
    dielectric_code: 72,
};

/// Looks up a model by its catalog name. Returns `None` for unknown names;
/// the resolver turns that into a configuration error.
pub fn lookup(name: &str) -> Option<WaterModelData> {
    match name {
        "TIP3P" => Some(TIP3P),
        "SPCE" => Some(SPCE),
        _ => None,
    }
}
