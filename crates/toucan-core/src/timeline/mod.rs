// crates/toucan-core/src/timeline/mod.rs
//
// The timeline data model (§3). A `Timeline` is a `Stack` of `Track`s; each
// track holds an ordered sequence of `Composable`s (items or transitions).
// This module is pure data + layout math — no file I/O, no ffmpeg. Parsing
// the on-disk JSON document lives in `schema`; everything else (range
// containment, child layout, time-warp lookup) lives here so the compiler
// can share it with tests that build timelines by hand.

mod effect;
mod item;
mod media_reference;
pub mod schema;
mod track;
mod transition;

pub use effect::{Effect, Parameters};
pub use item::{Clip, Gap, Item, ItemBase, Stack};
pub use media_reference::{ExternalReference, GeneratorReference, ImageSequenceReference, MediaReference};
pub use track::{Track, TrackKind};
pub use transition::Transition;

use crate::time::{RationalTime, TimeRange};

/// A child of a track: either a playable item or a transition between two
/// neighboring items.
#[derive(Clone, Debug)]
pub enum Composable {
    Item(Item),
    Transition(Transition),
}

impl Composable {
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Composable::Item(i) => Some(i),
            Composable::Transition(_) => None,
        }
    }

    pub fn as_transition(&self) -> Option<&Transition> {
        match self {
            Composable::Transition(t) => Some(t),
            Composable::Item(_) => None,
        }
    }
}

/// The root of a timeline: a stack of tracks plus the timeline's nominal
/// start time in "global" (absolute) coordinates.
#[derive(Clone, Debug)]
pub struct Timeline {
    pub name: String,
    pub global_start_time: RationalTime,
    pub tracks: Stack,
}

impl Timeline {
    /// The timeline's overall time range, computed from `global_start_time`
    /// and the duration of the longest track in the root stack.
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(self.global_start_time, self.tracks.duration())
    }

    pub fn start_time(&self) -> RationalTime {
        self.global_start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::item::ItemBase;

    fn rt(v: f64, r: f64) -> RationalTime { RationalTime::new(v, r) }

    #[test]
    fn empty_timeline_has_zero_time_range() {
        let tl = Timeline {
            name: "empty".into(),
            global_start_time: rt(0.0, 24.0),
            tracks: Stack { effects: vec![], source_range: None, tracks: vec![] },
        };
        let range = tl.time_range();
        assert_eq!(range.duration.value, 0.0);
    }

    #[test]
    fn gap_item_has_duration_from_source_range() {
        let gap = Item::Gap(Gap {
            base: ItemBase {
                name: "gap".into(),
                effects: vec![],
                source_range: Some(TimeRange::new(rt(0.0, 24.0), rt(12.0, 24.0))),
            },
        });
        assert_eq!(gap.trimmed_duration().value, 12.0);
    }
}
