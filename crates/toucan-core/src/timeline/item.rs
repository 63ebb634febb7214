// crates/toucan-core/src/timeline/item.rs
//
// Items are the playable children of a track: Clip, Gap, or a nested Stack.
// Every item optionally carries a `source_range`; its `available_range` is
// derived from the media (for a Clip, from the document's own cached
// `available_range` field) or from `source_range` directly (Gap, Stack).

use crate::time::{RationalTime, TimeRange};
use crate::timeline::effect::Effect;
use crate::timeline::media_reference::MediaReference;
use crate::timeline::track::Track;

#[derive(Clone, Debug)]
pub struct ItemBase {
    pub name: String,
    pub effects: Vec<Effect>,
    pub source_range: Option<TimeRange>,
}

#[derive(Clone, Debug)]
pub struct Clip {
    pub base: ItemBase,
    pub media_reference: MediaReference,
    /// Cached intrinsic range of the media, as recorded in the timeline
    /// document (never probed here — probing is a `toucan-media` concern).
    pub available_range: Option<TimeRange>,
}

#[derive(Clone, Debug)]
pub struct Gap {
    pub base: ItemBase,
}

/// A nested composition. Reuses the same shape as the timeline's root
/// `Stack` (§3 describes Stack both as the timeline root and as a nestable
/// item type).
#[derive(Clone, Debug)]
pub struct Stack {
    pub effects: Vec<Effect>,
    pub source_range: Option<TimeRange>,
    pub tracks: Vec<Track>,
}

impl Stack {
    /// Duration of the longest video track, or zero duration at a nominal
    /// 24fps rate if the stack has no tracks.
    pub fn duration(&self) -> RationalTime {
        self.tracks
            .iter()
            .map(|t| t.duration())
            .fold(RationalTime::new(0.0, 24.0), |acc, d| {
                if d.to_seconds() > acc.to_seconds() { d } else { acc }
            })
    }
}

#[derive(Clone, Debug)]
pub enum Item {
    Clip(Clip),
    Gap(Gap),
    Stack(Stack),
}

impl Item {
    pub fn base_effects(&self) -> &[Effect] {
        match self {
            Item::Clip(c) => &c.base.effects,
            Item::Gap(g) => &g.base.effects,
            Item::Stack(s) => &s.effects,
        }
    }

    pub fn source_range(&self) -> Option<TimeRange> {
        match self {
            Item::Clip(c) => c.base.source_range,
            Item::Gap(g) => g.base.source_range,
            Item::Stack(s) => s.source_range,
        }
    }

    /// The media's (or nested composition's) intrinsic range, independent of
    /// any trimming `source_range` applies.
    pub fn available_range(&self) -> TimeRange {
        match self {
            Item::Clip(c) => c
                .available_range
                .or(c.base.source_range)
                .unwrap_or_else(|| TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(0.0, 24.0))),
            Item::Gap(g) => g
                .base
                .source_range
                .unwrap_or_else(|| TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(0.0, 24.0))),
            Item::Stack(s) => s.source_range.unwrap_or_else(|| {
                TimeRange::new(RationalTime::new(0.0, 24.0), s.duration())
            }),
        }
    }

    /// Duration the item occupies in its parent track: `source_range`'s
    /// duration if trimmed, else the full `available_range` duration.
    pub fn trimmed_duration(&self) -> RationalTime {
        self.source_range()
            .map(|r| r.duration)
            .unwrap_or_else(|| self.available_range().duration)
    }
}
