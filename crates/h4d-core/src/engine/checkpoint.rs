//! Derivation of per-solute resumption indices from checkpoint artifacts.
//!
//! The engine encodes its progress purely through which files exist: after a
//! successful run at index `i` the artifact pair `acc_{solute}_{tag}{i}` /
//! `r_{solute}_{tag}{i}` is present in the solute's working directory. No
//! index metadata is stored anywhere else, so the current index is always
//! recomputed by probing the filesystem.

use std::path::{Path, PathBuf};

/// Prefix of the accumulation checkpoint artifact.
pub const ACCUMULATION_PREFIX: &str = "acc_";
/// Prefix of the companion restart artifact.
pub const RESTART_PREFIX: &str = "r_";

/// Path of the accumulation artifact for a given checkpoint label.
pub fn accumulation_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("{ACCUMULATION_PREFIX}{label}"))
}

/// Path of the restart artifact for a given checkpoint label.
pub fn restart_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("{RESTART_PREFIX}{label}"))
}

/// Probes the solute's working directory for the highest existing checkpoint
/// index.
///
/// Counts `acc_{solute}_des{i}` artifacts upward from zero, then continues
/// the same counter over the structure-workflow tag `acc_{solute}_s{i}`.
/// Returns the last index confirmed present, or `None` when no artifact
/// exists at all. Side-effect free and idempotent: calling it twice without
/// filesystem changes returns the same value.
pub fn current_index(dir: &Path, solute: &str) -> Option<u64> {
    let mut i: u64 = 0;
    while accumulation_path(dir, &format!("{solute}_des{i}")).is_file() {
        i += 1;
    }
    while accumulation_path(dir, &format!("{solute}_s{i}")).is_file() {
        i += 1;
    }
    i.checked_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::tempdir;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[test]
    fn no_checkpoints_yields_none() {
        let dir = tempdir().unwrap();
        assert_eq!(current_index(dir.path(), "methane"), None);
    }

    #[test]
    fn contiguous_destruction_checkpoints_yield_highest_index() {
        let dir = tempdir().unwrap();
        for i in 0..=3 {
            touch(dir.path(), &format!("acc_methane_des{i}"));
        }

        assert_eq!(current_index(dir.path(), "methane"), Some(3));
    }

    #[test]
    fn probe_stops_at_first_gap() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "acc_methane_des0");
        touch(dir.path(), "acc_methane_des1");
        // index 2 missing; a later orphan must not be counted
        touch(dir.path(), "acc_methane_des5");

        assert_eq!(current_index(dir.path(), "methane"), Some(1));
    }

    #[test]
    fn structure_checkpoints_continue_the_counter() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "acc_methane_s0");
        touch(dir.path(), "acc_methane_s1");

        assert_eq!(current_index(dir.path(), "methane"), Some(1));
    }

    #[test]
    fn probe_is_idempotent() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "acc_methane_des0");

        let first = current_index(dir.path(), "methane");
        let second = current_index(dir.path(), "methane");
        assert_eq!(first, Some(0));
        assert_eq!(first, second);
    }

    #[test]
    fn other_solutes_checkpoints_are_ignored() {
        let dir = tempdir().unwrap();
        touch(dir.path(), "acc_ethanol_des0");

        assert_eq!(current_index(dir.path(), "methane"), None);
    }
}
