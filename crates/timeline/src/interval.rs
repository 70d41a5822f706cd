use serde::{Deserialize, Serialize};

use crate::{Time, TimelineError};

/// End marker for an interval that runs through the end of the recording.
pub const OPEN_END: Time = Time::MAX;

/// Inclusive range of visibility, serialized as a `[from, to]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "(Time, Time)", into = "(Time, Time)")]
pub struct Interval {
    pub from: Time,
    pub to: Time,
}

impl Interval {
    pub fn new(from: Time, to: Time) -> Self {
        assert!(from <= to, "interval start {from} is after its end {to}");
        Self { from, to }
    }

    pub fn open(from: Time) -> Self { Self { from, to: OPEN_END } }

    pub fn is_open(&self) -> bool { self.to == OPEN_END }

    pub fn contains(&self, time: Time) -> bool { self.from <= time && time <= self.to }

    // Overlapping or adjacent; `self` must not start after `next`.
    fn touches(&self, next: &Interval) -> bool { self.to.saturating_add(1) >= next.from }
}

impl From<(Time, Time)> for Interval {
    fn from((from, to): (Time, Time)) -> Self { Self { from, to } }
}

impl From<Interval> for (Time, Time) {
    fn from(i: Interval) -> Self { (i.from, i.to) }
}

/// Sorted union of visibility intervals. No two members overlap or touch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Interval>", into = "Vec<Interval>")]
pub struct IntervalSet {
    ranges: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self { Self::default() }

    pub fn add(&mut self, interval: Interval) {
        self.ranges.push(interval);
        self.normalize();
    }

    pub fn add_range(&mut self, from: Time, to: Time) { self.add(Interval::new(from, to)); }

    pub fn add_to_end(&mut self, from: Time) { self.add(Interval::open(from)); }

    /// Removes all visibility at and after `time`.
    ///
    /// Intervals starting at or after `time` are dropped and the one
    /// straddling it ends at `time - 1`. A `time` inside a gap therefore
    /// only drops the later intervals.
    pub fn truncate_at(&mut self, time: Time) {
        self.ranges.retain(|r| r.from < time);
        if let Some(last) = self.ranges.last_mut() {
            if last.to >= time {
                last.to = time - 1;
            }
        }
    }

    pub fn contains(&self, time: Time) -> bool {
        let idx = self.ranges.partition_point(|r| r.to < time);
        self.ranges.get(idx).map_or(false, |r| r.from <= time)
    }

    pub fn is_empty(&self) -> bool { self.ranges.is_empty() }

    pub fn len(&self) -> usize { self.ranges.len() }

    pub fn iter(&self) -> impl Iterator<Item = &Interval> + '_ { self.ranges.iter() }

    /// End of the last bounded interval, or the start of a trailing open one.
    pub fn last_finite_time(&self) -> Option<Time> {
        self.ranges.last().map(|r| if r.is_open() { r.from } else { r.to })
    }

    fn normalize(&mut self) {
        self.ranges.sort();
        let mut merged: Vec<Interval> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if last.touches(&r) => last.to = last.to.max(r.to),
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }
}

impl TryFrom<Vec<Interval>> for IntervalSet {
    type Error = TimelineError;

    fn try_from(ranges: Vec<Interval>) -> Result<Self, Self::Error> {
        if let Some(bad) = ranges.iter().find(|r| r.from > r.to) {
            return Err(TimelineError::InvalidInterval { from: bad.from, to: bad.to });
        }
        let mut set = Self { ranges };
        set.normalize();
        Ok(set)
    }
}

impl From<IntervalSet> for Vec<Interval> {
    fn from(set: IntervalSet) -> Self { set.ranges }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(set: &IntervalSet) -> Vec<(Time, Time)> { set.iter().map(|r| (r.from, r.to)).collect() }

    #[test]
    fn gap_of_one_stays_split() {
        let mut set = IntervalSet::new();
        set.add_range(5, 10);
        set.add_range(12, 20);
        assert_eq!(pairs(&set), vec![(5, 10), (12, 20)]);
        assert!(!set.contains(11));
    }

    #[test]
    fn adjacent_ranges_merge() {
        let mut set = IntervalSet::new();
        set.add_range(5, 10);
        set.add_range(11, 20);
        assert_eq!(pairs(&set), vec![(5, 20)]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut set = IntervalSet::new();
        set.add_range(30, 40);
        set.add_range(0, 2);
        set.add_range(10, 12);
        set.add_range(3, 9);
        set.add_range(35, 50);
        assert_eq!(pairs(&set), vec![(0, 12), (30, 50)]);
    }

    #[test]
    fn one_insert_can_bridge_many() {
        let mut set = IntervalSet::new();
        for start in [0, 10, 20, 30] {
            set.add_range(start, start + 2);
        }
        set.add_range(2, 29);
        assert_eq!(pairs(&set), vec![(0, 32)]);
    }

    #[test]
    fn open_end_absorbs_later_ranges() {
        let mut set = IntervalSet::new();
        set.add_range(50, 60);
        set.add_to_end(4);
        assert_eq!(pairs(&set), vec![(4, OPEN_END)]);
        assert!(set.contains(OPEN_END));
        assert!(!set.contains(3));
    }

    #[test]
    fn merged_set_is_sorted_and_spaced() {
        let mut set = IntervalSet::new();
        let inserts = [(7, 9), (1, 1), (15, 22), (3, 4), (11, 13), (23, 23), (0, 0), (5, 5)];
        for (from, to) in inserts {
            set.add_range(from, to);
        }
        let ranges = pairs(&set);
        for w in ranges.windows(2) {
            assert!(w[0].1 + 1 < w[1].0, "{:?} and {:?} should have merged", w[0], w[1]);
        }
        for (from, to) in inserts {
            assert!((from..=to).all(|t| set.contains(t)));
        }
        assert!(!set.contains(2));
        assert!(!set.contains(6));
        assert!(!set.contains(10));
        assert!(!set.contains(14));
        assert!(!set.contains(24));
    }

    #[test]
    fn truncate_inside_interval() {
        let mut set = IntervalSet::new();
        set.add_range(5, 20);
        set.truncate_at(10);
        assert_eq!(pairs(&set), vec![(5, 9)]);
    }

    #[test]
    fn truncate_at_start_drops_interval_and_later() {
        let mut set = IntervalSet::new();
        set.add_range(0, 3);
        set.add_range(5, 20);
        set.add_range(30, 40);
        set.truncate_at(5);
        assert_eq!(pairs(&set), vec![(0, 3)]);
    }

    #[test]
    fn truncate_at_end_shortens() {
        let mut set = IntervalSet::new();
        set.add_range(5, 20);
        set.add_range(30, 40);
        set.truncate_at(20);
        assert_eq!(pairs(&set), vec![(5, 19)]);
    }

    #[test]
    fn truncate_in_gap_drops_later_only() {
        let mut set = IntervalSet::new();
        set.add_range(0, 3);
        set.add_range(10, 20);
        set.truncate_at(6);
        assert_eq!(pairs(&set), vec![(0, 3)]);
    }

    #[test]
    fn truncate_is_monotonic() {
        let mut set = IntervalSet::new();
        set.add_range(2, 6);
        set.add_range(9, 14);
        set.add_to_end(20);
        let before: Vec<bool> = (0..40).map(|t| set.contains(t)).collect();
        set.truncate_at(11);
        for t in 0..40 {
            if t >= 11 {
                assert!(!set.contains(t), "visible at {t}");
            } else {
                assert_eq!(set.contains(t), before[t as usize], "changed at {t}");
            }
        }
    }

    #[test]
    fn truncate_at_zero_empties() {
        let mut set = IntervalSet::new();
        set.add_to_end(0);
        set.truncate_at(0);
        assert!(set.is_empty());
    }

    #[test]
    #[should_panic]
    fn reversed_interval_is_rejected() {
        let mut set = IntervalSet::new();
        set.add_range(9, 3);
    }

    #[test]
    fn serialized_as_pairs() {
        let mut set = IntervalSet::new();
        set.add_range(1, 4);
        set.add_to_end(8);
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, format!("[[1,4],[8,{}]]", OPEN_END));
        let back: IntervalSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn deserializing_normalizes_and_validates() {
        let set: IntervalSet = serde_json::from_str("[[11,20],[5,10]]").unwrap();
        assert_eq!(pairs(&set), vec![(5, 20)]);
        assert!(serde_json::from_str::<IntervalSet>("[[6,2]]").is_err());
    }

    #[test]
    fn last_finite_time_skips_open_end() {
        let mut set = IntervalSet::new();
        set.add_range(0, 4);
        assert_eq!(set.last_finite_time(), Some(4));
        set.add_to_end(9);
        assert_eq!(set.last_finite_time(), Some(9));
    }
}
