// crates/toucan-core/src/timeline/transition.rs
//
// A transition blends two neighboring items across an overlap range. Its
// `trimmed_range_in_parent` is computed by the owning track's layout pass
// (see `track::Track::layout`) from the cut point between the two items and
// `in_offset`/`out_offset` — the transition itself carries no independent
// position, only how far it reaches into each neighbor.

use crate::time::RationalTime;
use crate::timeline::effect::Parameters;

#[derive(Clone, Debug)]
pub struct Transition {
    pub transition_type: String,
    pub in_offset:  RationalTime,
    pub out_offset: RationalTime,
    pub parameters: Parameters,
}

impl Transition {
    pub fn new(
        transition_type: impl Into<String>,
        in_offset: RationalTime,
        out_offset: RationalTime,
        parameters: Parameters,
    ) -> Self {
        Self { transition_type: transition_type.into(), in_offset, out_offset, parameters }
    }
}
