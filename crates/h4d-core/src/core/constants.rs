//! Physical constants used to reduce force-field parameters to engine units.

/// Boltzmann constant in J/K.
pub const BOLTZMANN: f64 = 1.3806e-23;

/// Avogadro's number in 1/mol.
pub const AVOGADRO: f64 = 6.0221409e23;

/// Thermal energy kT at the given temperature, in kJ/mol.
///
/// The engine expects well depths reduced by this quantity.
pub fn thermal_energy_kj_mol(temperature: f64) -> f64 {
    temperature * BOLTZMANN * 1e-3 * AVOGADRO
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thermal_energy_at_room_temperature() {
        let kt = thermal_energy_kj_mol(298.15);
        assert!((kt - 2.4786).abs() < 1e-3);
    }
}
