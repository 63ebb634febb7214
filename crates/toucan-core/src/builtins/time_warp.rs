// crates/toucan-core/src/builtins/time_warp.rs
//
// Scales the time an input is sampled at by a constant factor. A negative
// scalar plays the input backwards: the requested time is first reflected
// across the input's duration before scaling, matching how a negative-rate
// retime reaches the same source frame whether you count from the head or
// the tail of the clip.

use crate::node::{ImageBuf, ImageNode, NodeState};
use crate::time::RationalTime;
use crate::Result;

#[derive(Debug)]
pub struct LinearTimeWarpNode {
    state: NodeState,
    inputs: Vec<Box<dyn ImageNode>>,
    time_scalar: f64,
    /// Duration of the input this node warps, in the input's own rate.
    /// Needed to reflect time for a negative scalar.
    input_duration: RationalTime,
}

impl LinearTimeWarpNode {
    pub fn new(input: Box<dyn ImageNode>, time_scalar: f64, input_duration: RationalTime) -> Self {
        Self { state: NodeState::new(), inputs: vec![input], time_scalar, input_duration }
    }

    /// Maps a time in this node's own coordinate space to the time its
    /// input should be sampled at.
    fn warp(&self, t: RationalTime) -> RationalTime {
        let rate = self.input_duration.rate;
        let offset_time = t.rescaled_to(rate);
        if self.time_scalar < 0.0 {
            let one_tick = RationalTime::new(1.0, rate);
            let reflected = self.input_duration - one_tick - offset_time;
            RationalTime::new(reflected.value * self.time_scalar, rate).floor()
        } else {
            RationalTime::new(offset_time.value * self.time_scalar, rate).floor()
        }
    }
}

impl ImageNode for LinearTimeWarpNode {
    fn label(&self) -> &str {
        "LinearTimeWarp"
    }

    fn inputs(&self) -> &[Box<dyn ImageNode>] {
        &self.inputs
    }

    fn inputs_mut(&mut self) -> &mut Vec<Box<dyn ImageNode>> {
        &mut self.inputs
    }

    fn time(&self) -> RationalTime {
        self.state.time
    }

    fn set_time(&mut self, time: RationalTime) {
        self.state.time = time;
        let warped = self.warp(self.state.effective_time());
        if let Some(input) = self.inputs.first_mut() {
            input.set_time(warped);
        }
    }

    fn time_offset(&self) -> RationalTime {
        self.state.time_offset
    }

    fn set_time_offset(&mut self, offset: RationalTime) {
        self.state.time_offset = offset;
    }

    fn exec(&mut self) -> Result<ImageBuf> {
        self.inputs[0].exec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::FillNode;

    #[test]
    fn positive_scalar_scales_time_forward() {
        let input = Box::new(FillNode::new(1, 1));
        let mut warp = LinearTimeWarpNode::new(input, 2.0, RationalTime::new(48.0, 24.0));
        warp.set_time(RationalTime::new(10.0, 24.0));
        assert_eq!(warp.inputs[0].time().value, 20.0);
    }

    #[test]
    fn negative_scalar_reflects_before_scaling() {
        let input = Box::new(FillNode::new(1, 1));
        let mut warp = LinearTimeWarpNode::new(input, -1.0, RationalTime::new(48.0, 24.0));
        warp.set_time(RationalTime::new(0.0, 24.0));
        // duration(48) - 1 - 0 = 47, scaled by -1 = -47, floored = -47
        assert_eq!(warp.inputs[0].time().value, -47.0);
    }
}
