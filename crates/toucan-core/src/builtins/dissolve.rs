// crates/toucan-core/src/builtins/dissolve.rs
//
// Fallback transition used when a timeline names a transition type no
// installed plugin claims. Cross-fades the outgoing and incoming clip
// linearly over the transition's span; at the midpoint each contributes
// equally.

use crate::node::{ImageBuf, ImageNode, ImageSpec, NodeState};
use crate::time::RationalTime;
use crate::Result;

#[derive(Debug)]
pub struct DissolveNode {
    state: NodeState,
    inputs: Vec<Box<dyn ImageNode>>,
    /// Transition span, in this node's own time coordinates: `progress()`
    /// maps `time()` linearly from 0.0 at `span.start` to 1.0 at
    /// `span.end_exclusive()`.
    span: crate::time::TimeRange,
}

impl DissolveNode {
    pub fn new(outgoing: Box<dyn ImageNode>, incoming: Box<dyn ImageNode>, span: crate::time::TimeRange) -> Self {
        Self { state: NodeState::new(), inputs: vec![outgoing, incoming], span }
    }

    fn progress(&self) -> f64 {
        if self.span.duration.to_seconds() <= 0.0 {
            return 1.0;
        }
        let elapsed = (self.state.time.to_seconds() - self.span.start.to_seconds())
            / self.span.duration.to_seconds();
        elapsed.clamp(0.0, 1.0)
    }
}

impl ImageNode for DissolveNode {
    fn label(&self) -> &str {
        "Dissolve"
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
        let effective = self.state.effective_time();
        for input in &mut self.inputs {
            input.set_time(effective);
        }
    }

    fn time_offset(&self) -> RationalTime {
        self.state.time_offset
    }

    fn set_time_offset(&mut self, offset: RationalTime) {
        self.state.time_offset = offset;
    }

    fn exec(&mut self) -> Result<ImageBuf> {
        let outgoing = self.inputs[0].exec()?;
        let incoming = self.inputs[1].exec()?;
        let t = self.progress();
        let width = outgoing.width().max(incoming.width());
        let height = outgoing.height().max(incoming.height());
        let mut out = ImageBuf::new(ImageSpec::rgba8(width, height));
        for ((o, i), dst) in outgoing
            .data
            .chunks_exact(4)
            .zip(incoming.data.chunks_exact(4))
            .zip(out.data.chunks_exact_mut(4))
        {
            for c in 0..4 {
                let blended = o[c] as f64 * (1.0 - t) + i[c] as f64 * t;
                dst[c] = blended.round().clamp(0.0, 255.0) as u8;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::FillNode;
    use crate::time::TimeRange;

    #[test]
    fn midpoint_blends_evenly() {
        let out_node = Box::new(FillNode::new(1, 1).with_color(1.0, 0.0, 0.0, 1.0));
        let in_node = Box::new(FillNode::new(1, 1).with_color(0.0, 0.0, 1.0, 1.0));
        let span = TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(24.0, 24.0));
        let mut dissolve = DissolveNode::new(out_node, in_node, span);
        dissolve.set_time(RationalTime::new(12.0, 24.0));
        let buf = dissolve.exec().unwrap();
        assert_eq!(buf.data[0], 128);
        assert_eq!(buf.data[2], 128);
    }

    /// Dissolving A->B at progress `v` must match dissolving B->A at `1-v`:
    /// swapping which clip is outgoing and mirroring progress around the
    /// midpoint shouldn't change the composited pixels.
    #[test]
    fn swapping_sources_and_mirroring_progress_is_equivalent() {
        let span = TimeRange::new(RationalTime::new(0.0, 24.0), RationalTime::new(24.0, 24.0));

        let a = Box::new(FillNode::new(1, 1).with_color(0.8, 0.2, 0.1, 1.0));
        let b = Box::new(FillNode::new(1, 1).with_color(0.1, 0.6, 0.9, 1.0));
        let mut forward = DissolveNode::new(a, b, span);
        forward.set_time(RationalTime::new(6.0, 24.0)); // progress = 0.25

        let a2 = Box::new(FillNode::new(1, 1).with_color(0.8, 0.2, 0.1, 1.0));
        let b2 = Box::new(FillNode::new(1, 1).with_color(0.1, 0.6, 0.9, 1.0));
        let mut mirrored = DissolveNode::new(b2, a2, span);
        mirrored.set_time(RationalTime::new(18.0, 24.0)); // progress = 0.75

        let forward_buf = forward.exec().unwrap();
        let mirrored_buf = mirrored.exec().unwrap();
        assert_eq!(forward_buf.data, mirrored_buf.data);
    }
}
