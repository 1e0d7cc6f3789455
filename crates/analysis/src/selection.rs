//! Hit-selection policies deciding which hits receive the recombination
//! correction.

use crate::recombination::HitEnergyRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marks each record of an ordered track sequence as correctable or not.
///
/// Implementations see the records read-only and return one flag per record.
pub trait HitSelectionPolicy: fmt::Debug + Send + Sync {
    fn select(&self, records: &[HitEnergyRecord]) -> Vec<bool>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SelectAll;

impl HitSelectionPolicy for SelectAll {
    fn select(&self, records: &[HitEnergyRecord]) -> Vec<bool> {
        vec![true; records.len()]
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SelectNone;

impl HitSelectionPolicy for SelectNone {
    fn select(&self, records: &[HitEnergyRecord]) -> Vec<bool> {
        vec![false; records.len()]
    }
}

/// Leaves the first and last `fraction` of the hits uncorrected; track ends
/// carry delta rays and the Bragg peak, where the model does not hold.
#[derive(Debug, Clone, Copy)]
pub struct ExcludeTrackEnds {
    fraction: f32,
}

impl ExcludeTrackEnds {
    /// `fraction` is clamped to [0, 0.5].
    pub fn new(fraction: f32) -> Self {
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 0.5)
        } else {
            0.0
        };
        Self { fraction }
    }

    pub fn fraction(&self) -> f32 {
        self.fraction
    }
}

impl HitSelectionPolicy for ExcludeTrackEnds {
    fn select(&self, records: &[HitEnergyRecord]) -> Vec<bool> {
        let n = records.len();
        let excluded = (n as f32 * self.fraction).floor() as usize;
        (0..n)
            .map(|i| i >= excluded && i + excluded < n)
            .collect()
    }
}

/// Serializable choice of policy
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum HitSelectionConfig {
    #[default]
    All,
    None,
    ExcludeEnds { fraction: f32 },
}

impl HitSelectionConfig {
    pub fn build(&self) -> Box<dyn HitSelectionPolicy> {
        match *self {
            HitSelectionConfig::All => Box::new(SelectAll),
            HitSelectionConfig::None => Box::new(SelectNone),
            HitSelectionConfig::ExcludeEnds { fraction } => Box::new(ExcludeTrackEnds::new(fraction)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larreco_types::HitId;

    fn records(n: u32) -> Vec<HitEnergyRecord> {
        (0..n)
            .map(|i| HitEnergyRecord {
                hit: HitId(i),
                coordinate: i as f32,
                uncorrected_energy: 0.01,
                corrected_energy: 0.011,
                apply_correction: false,
            })
            .collect()
    }

    #[test]
    fn test_all_and_none() {
        assert_eq!(SelectAll.select(&records(3)), vec![true; 3]);
        assert_eq!(SelectNone.select(&records(3)), vec![false; 3]);
        assert!(SelectAll.select(&[]).is_empty());
    }

    #[test]
    fn test_exclude_ends() {
        let flags = ExcludeTrackEnds::new(0.2).select(&records(10));
        assert_eq!(
            flags,
            vec![false, false, true, true, true, true, true, true, false, false]
        );

        // Fewer hits than one excluded slot: nothing is excluded.
        assert_eq!(ExcludeTrackEnds::new(0.2).select(&records(4)), vec![true; 4]);
    }

    #[test]
    fn test_exclude_ends_clamps_fraction() {
        assert_eq!(ExcludeTrackEnds::new(3.0).fraction(), 0.5);
        assert_eq!(ExcludeTrackEnds::new(f32::NAN).fraction(), 0.0);
        assert_eq!(ExcludeTrackEnds::new(0.5).select(&records(4)), vec![false; 4]);
    }

    #[test]
    fn test_config_parses_tagged_policy() {
        let config: HitSelectionConfig =
            serde_json::from_str(r#"{ "policy": "exclude_ends", "fraction": 0.1 }"#).unwrap();
        assert_eq!(config, HitSelectionConfig::ExcludeEnds { fraction: 0.1 });
        assert_eq!(config.build().select(&records(20)).iter().filter(|f| !**f).count(), 4);
    }
}
