// crates/toucan-core/src/timeline/track.rs
//
// A track holds an ordered sequence of composables (items or transitions).
// `layout()` is the one place track-local time gets assigned to children:
// items consume track duration in order; transitions don't advance the
// cursor — they describe an overlap reaching `in_offset` back into the
// previous item and `out_offset` forward into the next one, per the
// glossary's "trimmed range in parent".

use crate::time::RationalTime;
use crate::time::TimeRange;
use crate::timeline::effect::Effect;
use crate::timeline::item::Item;
use crate::timeline::Composable;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Clone, Debug)]
pub struct Track {
    pub name: String,
    pub kind: TrackKind,
    pub children: Vec<Composable>,
    pub effects: Vec<Effect>,
    pub source_range: Option<TimeRange>,
}

impl Track {
    /// The rate used to lay out this track's children: the first item's
    /// available-range rate, or 24fps if the track has no items yet.
    pub fn rate(&self) -> f64 {
        self.children
            .iter()
            .filter_map(Composable::as_item)
            .next()
            .map(|item| item.available_range().start.rate)
            .unwrap_or(24.0)
    }

    /// `trimmed_range_in_parent` for every child, in the same order as
    /// `children`. Items consume track duration sequentially; transitions
    /// occupy the overlap straddling the cut point between their neighbors
    /// without advancing the cursor themselves.
    pub fn layout(&self) -> Vec<TimeRange> {
        let rate = self.rate();
        let mut cursor = RationalTime::new(0.0, rate);
        let mut ranges = Vec::with_capacity(self.children.len());
        for child in &self.children {
            match child {
                Composable::Item(item) => {
                    let dur = item.trimmed_duration().rescaled_to(rate);
                    ranges.push(TimeRange::new(cursor, dur));
                    cursor = cursor + dur;
                }
                Composable::Transition(t) => {
                    let in_off = t.in_offset.rescaled_to(rate);
                    let out_off = t.out_offset.rescaled_to(rate);
                    let start = cursor - in_off;
                    let dur = in_off + out_off;
                    ranges.push(TimeRange::new(start, dur));
                }
            }
        }
        ranges
    }

    /// Total duration of the track: the cursor position after laying out
    /// every item (transitions don't extend it).
    pub fn duration(&self) -> RationalTime {
        let rate = self.rate();
        self.children
            .iter()
            .filter_map(Composable::as_item)
            .fold(RationalTime::new(0.0, rate), |acc, item| {
                acc + item.trimmed_duration().rescaled_to(rate)
            })
    }

    /// True if this track contains at least one `Clip` item (a Gap-only or
    /// empty track contributes nothing and is skipped by the compiler).
    pub fn has_clips(&self) -> bool {
        self.children
            .iter()
            .filter_map(Composable::as_item)
            .any(|item| matches!(item, Item::Clip(_)))
    }

    /// Find the child index whose `trimmed_range_in_parent` contains `t`,
    /// along with up to two previous and two next neighbor indices (used by
    /// the compiler for transition lookup). Returns `None` if no item
    /// contains `t` — end-exclusive semantics mean a time exactly at a
    /// track's end belongs to no item.
    pub fn item_at(&self, t: RationalTime) -> Option<TrackCursor> {
        let ranges = self.layout();
        for (i, range) in ranges.iter().enumerate() {
            if self.children[i].as_item().is_some() && range.contains(t) {
                return Some(TrackCursor {
                    index: i,
                    prev: i.checked_sub(1),
                    prev2: i.checked_sub(2),
                    next: if i + 1 < self.children.len() { Some(i + 1) } else { None },
                    next2: if i + 2 < self.children.len() { Some(i + 2) } else { None },
                    ranges,
                });
            }
        }
        None
    }
}

/// Result of locating the active item for a time: the item's index plus up
/// to two neighbors on either side, and the precomputed layout ranges (so
/// the compiler can check whether a neighboring transition actually
/// contains the query time without recomputing layout).
pub struct TrackCursor {
    pub index: usize,
    pub prev:  Option<usize>,
    pub prev2: Option<usize>,
    pub next:  Option<usize>,
    pub next2: Option<usize>,
    pub ranges: Vec<TimeRange>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::item::{Gap, ItemBase};

    fn gap(dur: f64, rate: f64) -> Composable {
        Composable::Item(Item::Gap(Gap {
            base: ItemBase {
                name: "gap".into(),
                effects: vec![],
                source_range: Some(TimeRange::new(RationalTime::new(0.0, rate), RationalTime::new(dur, rate))),
            },
        }))
    }

    #[test]
    fn layout_advances_cursor_per_item() {
        let track = Track {
            name: "V1".into(),
            kind: TrackKind::Video,
            children: vec![gap(24.0, 24.0), gap(12.0, 24.0)],
            effects: vec![],
            source_range: None,
        };
        let ranges = track.layout();
        assert_eq!(ranges[0].start.value, 0.0);
        assert_eq!(ranges[1].start.value, 24.0);
        assert_eq!(track.duration().value, 36.0);
    }

    #[test]
    fn time_at_end_exclusive_belongs_to_no_item() {
        let track = Track {
            name: "V1".into(),
            kind: TrackKind::Video,
            children: vec![gap(24.0, 24.0)],
            effects: vec![],
            source_range: None,
        };
        assert!(track.item_at(RationalTime::new(23.0, 24.0)).is_some());
        assert!(track.item_at(RationalTime::new(24.0, 24.0)).is_none());
    }
}
