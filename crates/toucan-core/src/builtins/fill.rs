// crates/toucan-core/src/builtins/fill.rs
//
// Generator with no inputs: a flat-colored (default transparent black)
// plate sized to the graph's target resolution. The compiler seeds every
// stack with one of these so a track with no clip covering the query time
// still composites against something.

use crate::node::{ImageBuf, ImageNode, NodeState};
use crate::time::RationalTime;
use crate::Result;

#[derive(Debug)]
pub struct FillNode {
    state: NodeState,
    width: usize,
    height: usize,
    color: [f64; 4],
    inputs: Vec<Box<dyn ImageNode>>,
}

impl FillNode {
    pub fn new(width: usize, height: usize) -> Self {
        Self { state: NodeState::new(), width, height, color: [0.0, 0.0, 0.0, 0.0], inputs: Vec::new() }
    }

    pub fn with_color(mut self, r: f64, g: f64, b: f64, a: f64) -> Self {
        self.color = [r, g, b, a];
        self
    }
}

impl ImageNode for FillNode {
    fn label(&self) -> &str {
        "Fill"
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
    }

    fn time_offset(&self) -> RationalTime {
        self.state.time_offset
    }

    fn set_time_offset(&mut self, offset: RationalTime) {
        self.state.time_offset = offset;
    }

    fn exec(&mut self) -> Result<ImageBuf> {
        let mut buf = ImageBuf::transparent(self.width, self.height);
        let [r, g, b, a] = self.color;
        let rgba = [
            (r.clamp(0.0, 1.0) * 255.0) as u8,
            (g.clamp(0.0, 1.0) * 255.0) as u8,
            (b.clamp(0.0, 1.0) * 255.0) as u8,
            (a.clamp(0.0, 1.0) * 255.0) as u8,
        ];
        for px in buf.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transparent_fill_is_all_zero() {
        let mut node = FillNode::new(4, 4);
        let buf = node.exec().unwrap();
        assert!(buf.data.iter().all(|&b| b == 0));
    }

    #[test]
    fn colored_fill_repeats_rgba_per_pixel() {
        let mut node = FillNode::new(2, 2).with_color(1.0, 0.0, 0.0, 1.0);
        let buf = node.exec().unwrap();
        assert_eq!(&buf.data[0..4], &[255, 0, 0, 255]);
        assert_eq!(&buf.data[4..8], &[255, 0, 0, 255]);
    }
}
