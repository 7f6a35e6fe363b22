//! Lane identity

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Number of approaches at the intersection
pub const LANE_COUNT: usize = 4;

/// Lane number outside 1..=4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid lane id {0}, expected 1..=4")]
pub struct InvalidLane(pub u8);

/// One of the four intersection approaches, numbered 1 to 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LaneId(u8);

impl LaneId {
    pub const ALL: [LaneId; LANE_COUNT] = [LaneId(1), LaneId(2), LaneId(3), LaneId(4)];

    pub const fn first() -> Self {
        LaneId(1)
    }

    pub fn new(id: u8) -> Result<Self, InvalidLane> {
        if (1..=LANE_COUNT as u8).contains(&id) {
            Ok(LaneId(id))
        } else {
            Err(InvalidLane(id))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Next lane in rotation order (4 wraps to 1)
    pub fn next(self) -> Self {
        LaneId(self.0 % LANE_COUNT as u8 + 1)
    }

    /// Lanes in rotation order starting at `self`, `self` included
    pub fn rotation(self) -> impl Iterator<Item = LaneId> {
        std::iter::successors(Some(self), |lane| Some(lane.next())).take(LANE_COUNT)
    }

    /// Steps from `self` to `other` walking the rotation (0 when equal)
    pub fn distance_to(self, other: LaneId) -> usize {
        (other.0 as usize + LANE_COUNT - self.0 as usize) % LANE_COUNT
    }
}

impl TryFrom<u8> for LaneId {
    type Error = InvalidLane;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        LaneId::new(id)
    }
}

impl From<LaneId> for u8 {
    fn from(lane: LaneId) -> Self {
        lane.0
    }
}

impl fmt::Display for LaneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_ids() {
        assert!(LaneId::new(0).is_err());
        assert!(LaneId::new(5).is_err());
        assert_eq!(LaneId::new(3).unwrap().get(), 3);
    }

    #[test]
    fn test_rotation_wraps() {
        let lane = LaneId::new(3).unwrap();
        let order: Vec<u8> = lane.rotation().map(LaneId::get).collect();
        assert_eq!(order, vec![3, 4, 1, 2]);
        assert_eq!(LaneId::new(4).unwrap().next(), LaneId::first());
    }

    #[test]
    fn test_distance() {
        let one = LaneId::first();
        let four = LaneId::new(4).unwrap();
        assert_eq!(one.distance_to(one), 0);
        assert_eq!(one.distance_to(four), 3);
        assert_eq!(four.distance_to(one), 1);
    }

    proptest! {
        #[test]
        fn prop_rotation_visits_every_lane_once(a in 1u8..=4, b in 1u8..=4) {
            let from = LaneId::new(a).unwrap();
            let to = LaneId::new(b).unwrap();

            let order: Vec<LaneId> = from.rotation().collect();
            let mut sorted = order.clone();
            sorted.sort();
            prop_assert_eq!(sorted, LaneId::ALL.to_vec());
            prop_assert_eq!(order[from.distance_to(to)], to);
        }
    }
}
