// crates/toucan-core/src/builtins/comp.rs
//
// Porter-Duff "over" compositing of two inputs, B over A (inputs()[0] is
// the background, inputs()[1] the foreground). The foreground is resized
// to the background's dimensions first if they disagree — tracks of
// mismatched resolution still composite instead of erroring.

use crate::node::{ComponentType, ImageBuf, ImageNode, ImageSpec, NodeState};
use crate::time::RationalTime;
use crate::Result;

#[derive(Debug)]
pub struct CompNode {
    state: NodeState,
    inputs: Vec<Box<dyn ImageNode>>,
    premult: bool,
}

impl CompNode {
    pub fn new(background: Box<dyn ImageNode>, foreground: Box<dyn ImageNode>) -> Self {
        Self { state: NodeState::new(), inputs: vec![background, foreground], premult: true }
    }

    /// Nearest-neighbor resize to `(width, height)`. Built-in nodes only
    /// ever carry RGBA8 data, so this never needs to handle other component
    /// types.
    fn resize(src: &ImageBuf, width: usize, height: usize) -> ImageBuf {
        if src.width() == width && src.height() == height {
            return src.clone();
        }
        let mut dst = ImageBuf::new(ImageSpec::rgba8(width, height));
        for y in 0..height {
            let sy = if height == 0 { 0 } else { y * src.height() / height.max(1) };
            for x in 0..width {
                let sx = if width == 0 { 0 } else { x * src.width() / width.max(1) };
                let src_idx = (sy * src.width() + sx) * 4;
                let dst_idx = (y * width + x) * 4;
                dst.data[dst_idx..dst_idx + 4].copy_from_slice(&src.data[src_idx..src_idx + 4]);
            }
        }
        dst
    }

    fn premultiply(buf: &mut ImageBuf) {
        for px in buf.data.chunks_exact_mut(4) {
            let a = px[3] as f64 / 255.0;
            px[0] = (px[0] as f64 * a).round() as u8;
            px[1] = (px[1] as f64 * a).round() as u8;
            px[2] = (px[2] as f64 * a).round() as u8;
        }
    }

    fn over(background: &ImageBuf, foreground: &ImageBuf) -> ImageBuf {
        let mut out = ImageBuf::new(ImageSpec::rgba8(background.width(), background.height()));
        let rows = background
            .data
            .chunks_exact(4)
            .zip(foreground.data.chunks_exact(4))
            .zip(out.data.chunks_exact_mut(4));
        for ((bg, fg), dst) in rows {
            let fg_a = fg[3] as f64 / 255.0;
            let inv = 1.0 - fg_a;
            for c in 0..3 {
                dst[c] = (fg[c] as f64 + bg[c] as f64 * inv).round().clamp(0.0, 255.0) as u8;
            }
            dst[3] = (fg[3] as f64 + bg[3] as f64 * inv).round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

impl ImageNode for CompNode {
    fn label(&self) -> &str {
        "Comp"
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
        let background = self.inputs[0].exec()?;
        let mut foreground = self.inputs[1].exec()?;
        if foreground.spec.component_type != ComponentType::U8 {
            // Built-ins work in RGBA8; a read node handing back another
            // component type is expected to have already converted before
            // reaching a Comp node.
            foreground = ImageBuf::transparent(foreground.width(), foreground.height());
        }
        let foreground = Self::resize(&foreground, background.width(), background.height());
        let mut foreground = foreground;
        if self.premult {
            Self::premultiply(&mut foreground);
        }
        Ok(Self::over(&background, &foreground))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::FillNode;

    #[test]
    fn opaque_foreground_fully_replaces_background() {
        let bg = Box::new(FillNode::new(2, 2).with_color(0.0, 0.0, 1.0, 1.0));
        let fg = Box::new(FillNode::new(2, 2).with_color(1.0, 0.0, 0.0, 1.0));
        let mut comp = CompNode::new(bg, fg);
        let out = comp.exec().unwrap();
        assert_eq!(&out.data[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn transparent_foreground_leaves_background_untouched() {
        let bg = Box::new(FillNode::new(2, 2).with_color(0.0, 1.0, 0.0, 1.0));
        let fg = Box::new(FillNode::new(2, 2).with_color(1.0, 0.0, 0.0, 0.0));
        let mut comp = CompNode::new(bg, fg);
        let out = comp.exec().unwrap();
        assert_eq!(&out.data[0..4], &[0, 255, 0, 255]);
    }
}
