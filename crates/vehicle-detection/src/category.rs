//! Vehicle categories and class-id mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Vehicle classification bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleCategory {
    Car,
    Truck,
    Motorcycle,
    Bus,
    /// Ambulances and other preempting vehicles
    Emergency,
}

impl VehicleCategory {
    pub const ALL: [VehicleCategory; 5] = [
        VehicleCategory::Car,
        VehicleCategory::Truck,
        VehicleCategory::Motorcycle,
        VehicleCategory::Bus,
        VehicleCategory::Emergency,
    ];

    /// Dashboard label
    pub fn label(&self) -> &'static str {
        match self {
            VehicleCategory::Car => "Cars",
            VehicleCategory::Truck => "Trucks",
            VehicleCategory::Motorcycle => "Motorcycles",
            VehicleCategory::Bus => "Buses",
            VehicleCategory::Emergency => "Emergency",
        }
    }
}

impl fmt::Display for VehicleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Count per category; every category is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<VehicleCategory, u64>);

impl Default for CategoryCounts {
    fn default() -> Self {
        Self(VehicleCategory::ALL.iter().map(|c| (*c, 0)).collect())
    }
}

impl CategoryCounts {
    pub fn get(&self, category: VehicleCategory) -> u64 {
        self.0.get(&category).copied().unwrap_or(0)
    }

    pub fn add(&mut self, category: VehicleCategory, count: u64) {
        let entry = self.0.entry(category).or_insert(0);
        *entry = entry.saturating_add(count);
    }

    /// Accumulate another tally, touching only its nonzero entries
    pub fn merge(&mut self, other: &CategoryCounts) {
        for (category, count) in other.iter().filter(|(_, count)| *count > 0) {
            self.add(category, count);
        }
    }

    pub fn reset(&mut self) {
        for count in self.0.values_mut() {
            *count = 0;
        }
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VehicleCategory, u64)> + '_ {
        self.0.iter().map(|(c, n)| (*c, *n))
    }

    /// Category with the highest count; earliest category wins ties.
    /// `None` while everything is zero.
    pub fn dominant(&self) -> Option<(VehicleCategory, u64)> {
        let mut best: Option<(VehicleCategory, u64)> = None;
        for (category, count) in self.iter() {
            if count > best.map_or(0, |(_, n)| n) {
                best = Some((category, count));
            }
        }
        best
    }
}

/// Model class id to category lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassMap(BTreeMap<u32, VehicleCategory>);

impl Default for ClassMap {
    /// COCO-derived ids with class 0 retrained as ambulance
    fn default() -> Self {
        Self(BTreeMap::from([
            (0, VehicleCategory::Emergency),
            (2, VehicleCategory::Car),
            (3, VehicleCategory::Motorcycle),
            (5, VehicleCategory::Bus),
            (7, VehicleCategory::Truck),
        ]))
    }
}

impl ClassMap {
    pub fn new(entries: impl IntoIterator<Item = (u32, VehicleCategory)>) -> Self {
        Self(entries.into_iter().collect())
    }

    pub fn category(&self, class_id: u32) -> Option<VehicleCategory> {
        self.0.get(&class_id).copied()
    }

    /// Class id the model uses for a category, if mapped
    pub fn class_id(&self, category: VehicleCategory) -> Option<u32> {
        self.0
            .iter()
            .find(|(_, c)| **c == category)
            .map(|(id, _)| *id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_class_map() {
        let map = ClassMap::default();
        assert_eq!(map.category(0), Some(VehicleCategory::Emergency));
        assert_eq!(map.category(2), Some(VehicleCategory::Car));
        assert_eq!(map.category(3), Some(VehicleCategory::Motorcycle));
        assert_eq!(map.category(5), Some(VehicleCategory::Bus));
        assert_eq!(map.category(7), Some(VehicleCategory::Truck));
        assert_eq!(map.category(1), None);
        assert_eq!(map.class_id(VehicleCategory::Bus), Some(5));
    }

    #[test]
    fn test_counts_always_hold_every_category() {
        let counts = CategoryCounts::default();
        assert_eq!(counts.iter().count(), 5);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.dominant(), None);
    }

    #[test]
    fn test_dominant_prefers_earliest_on_tie() {
        let mut counts = CategoryCounts::default();
        counts.add(VehicleCategory::Bus, 4);
        counts.add(VehicleCategory::Truck, 4);
        counts.add(VehicleCategory::Car, 1);

        assert_eq!(counts.dominant(), Some((VehicleCategory::Truck, 4)));
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut counts = CategoryCounts::default();
        counts.add(VehicleCategory::Car, 12);
        counts.reset();
        assert_eq!(counts, CategoryCounts::default());
    }

    proptest! {
        #[test]
        fn prop_merge_accumulates(tallies in proptest::collection::vec(
            proptest::collection::vec(0u64..50, 5), 0..20
        )) {
            let mut cumulative = CategoryCounts::default();
            let mut expected_total = 0u64;
            for tally in &tallies {
                let mut cycle = CategoryCounts::default();
                for (category, count) in VehicleCategory::ALL.iter().zip(tally) {
                    cycle.add(*category, *count);
                }
                let before = cumulative.clone();
                cumulative.merge(&cycle);
                expected_total += cycle.total();
                for category in VehicleCategory::ALL {
                    prop_assert!(cumulative.get(category) >= before.get(category));
                }
            }
            prop_assert_eq!(cumulative.total(), expected_total);
        }
    }
}
