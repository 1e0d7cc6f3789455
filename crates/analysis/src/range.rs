//! Energy-from-range lookup tables for stopping tracks.

use serde::{Deserialize, Serialize};

/// Half-open interval `[range_min, range_max)` of track length (cm) mapped to
/// a kinetic energy (GeV).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyFromRangeEntry {
    pub range_min: f32,
    pub range_max: f32,
    pub energy: f32,
}

impl EnergyFromRangeEntry {
    pub fn contains(&self, range: f32) -> bool {
        range >= self.range_min && range < self.range_max
    }
}

/// Entries are searched in table order and the first containing interval
/// wins, so overlapping tables still give a single answer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnergyFromRangeTable {
    entries: Vec<EnergyFromRangeEntry>,
}

impl EnergyFromRangeTable {
    pub fn new(entries: Vec<EnergyFromRangeEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[EnergyFromRangeEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, range: f32) -> Option<f32> {
        self.entries
            .iter()
            .find(|entry| entry.contains(range))
            .map(|entry| entry.energy)
    }

    /// Index pairs of entries whose intervals intersect.
    pub fn overlaps(&self) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        for (i, a) in self.entries.iter().enumerate() {
            for (j, b) in self.entries.iter().enumerate().skip(i + 1) {
                if a.range_min < b.range_max && b.range_min < a.range_max {
                    out.push((i, j));
                }
            }
        }
        out
    }

    /// Index of every entry with `range_max <= range_min` or non-finite bounds.
    pub fn malformed(&self) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                !(e.range_min.is_finite() && e.range_max.is_finite() && e.energy.is_finite())
                    || e.range_max <= e.range_min
            })
            .map(|(i, _)| i)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(range_min: f32, range_max: f32, energy: f32) -> EnergyFromRangeEntry {
        EnergyFromRangeEntry {
            range_min,
            range_max,
            energy,
        }
    }

    fn contiguous() -> EnergyFromRangeTable {
        EnergyFromRangeTable::new(vec![
            entry(0.0, 10.0, 0.05),
            entry(10.0, 20.0, 0.08),
            entry(20.0, 40.0, 0.12),
        ])
    }

    #[test]
    fn test_boundaries_are_half_open() {
        let table = contiguous();
        assert_eq!(table.lookup(0.0), Some(0.05));
        assert_eq!(table.lookup(10.0), Some(0.08));
        assert_eq!(table.lookup(19.999), Some(0.08));
        assert_eq!(table.lookup(20.0), Some(0.12));
        assert_eq!(table.lookup(40.0), None);
        assert_eq!(table.lookup(-1.0), None);
        assert_eq!(table.lookup(f32::NAN), None);
    }

    #[test]
    fn test_first_overlapping_entry_wins() {
        let table = EnergyFromRangeTable::new(vec![entry(0.0, 15.0, 1.0), entry(10.0, 20.0, 2.0)]);
        assert_eq!(table.lookup(12.0), Some(1.0));
        assert_eq!(table.lookup(15.0), Some(2.0));
        assert_eq!(table.overlaps(), vec![(0, 1)]);
        assert!(contiguous().overlaps().is_empty());
    }

    #[test]
    fn test_malformed_entries() {
        let table = EnergyFromRangeTable::new(vec![
            entry(0.0, 10.0, 1.0),
            entry(5.0, 5.0, 1.0),
            entry(0.0, f32::INFINITY, 1.0),
        ]);
        assert_eq!(table.malformed(), vec![1, 2]);
    }

    proptest! {
        #[test]
        fn lookup_matches_the_containing_interval(range in 0.0f32..40.0) {
            let table = contiguous();
            let expected = table.entries().iter().find(|e| range >= e.range_min && range < e.range_max).map(|e| e.energy);
            prop_assert_eq!(table.lookup(range), expected);
            prop_assert!(table.lookup(range).is_some());
        }
    }
}
