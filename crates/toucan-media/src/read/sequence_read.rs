// crates/toucan-media/src/read/sequence_read.rs
//
// Numbered-frame image sequence Read node (§4.D `SequenceRead`). The frame
// number for a render is derived from the node's *current* time, not from
// any state carried between calls — the same "ask again for whatever time
// you're retargeted to" contract every other node follows.

use std::path::PathBuf;
use std::sync::Arc;

use toucan_core::node::{ComponentType, ImageBuf, ImageNode, ImageSpec, NodeState};
use toucan_core::time::{RationalTime, TimeRange};
use toucan_core::util::format_sequence_frame;
use toucan_core::Result;
use tracing::warn;

use crate::archive::ZipArchive;
use crate::read::image_read::ImageReadNode;

enum SequenceLocation {
    Disk(PathBuf),
    Archive { archive: Arc<ZipArchive>, base_name: String },
}

pub struct SequenceReadNode {
    state: NodeState,
    inputs: Vec<Box<dyn ImageNode>>,
    location: SequenceLocation,
    name_prefix: String,
    name_suffix: String,
    start_frame: i64,
    frame_step: i64,
    rate: f64,
    zero_padding: usize,
    label: String,
}

impl SequenceReadNode {
    #[allow(clippy::too_many_arguments)]
    pub fn from_disk(
        base_dir: PathBuf,
        name_prefix: String,
        name_suffix: String,
        start_frame: i64,
        frame_step: i64,
        rate: f64,
        zero_padding: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            state: NodeState::new(),
            inputs: Vec::new(),
            location: SequenceLocation::Disk(base_dir),
            name_prefix,
            name_suffix,
            start_frame,
            frame_step,
            rate,
            zero_padding,
            label: label.into(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_archive(
        archive: Arc<ZipArchive>,
        base_name: String,
        name_prefix: String,
        name_suffix: String,
        start_frame: i64,
        frame_step: i64,
        rate: f64,
        zero_padding: usize,
        label: impl Into<String>,
    ) -> Self {
        Self {
            state: NodeState::new(),
            inputs: Vec::new(),
            location: SequenceLocation::Archive { archive, base_name },
            name_prefix,
            name_suffix,
            start_frame,
            frame_step,
            rate,
            zero_padding,
            label: label.into(),
        }
    }

    /// `floor(time.value)` scaled by `frame_step` and offset from
    /// `start_frame`, exactly as §4.D specifies.
    fn frame_number(&self, time: RationalTime) -> i64 {
        let local = time.rescaled_to(self.rate).frame_number();
        self.start_frame + local * self.frame_step
    }

    fn frame_name(&self, frame: i64) -> String {
        format_sequence_frame(&self.name_prefix, frame, self.zero_padding, &self.name_suffix)
    }

    fn decode(&self) -> Result<ImageBuf> {
        let frame = self.frame_number(self.state.time);
        let filename = self.frame_name(frame);
        let mut reader = match &self.location {
            SequenceLocation::Disk(dir) => ImageReadNode::from_disk(dir.join(&filename), self.label.clone()),
            SequenceLocation::Archive { archive, base_name } => {
                let entry_name = format!("{base_name}{filename}");
                ImageReadNode::from_archive(Arc::clone(archive), entry_name, self.label.clone())
            }
        };
        reader.exec()
    }

    /// `[start_frame, start_frame + 1) @ rate` for whichever frame is
    /// currently probed — the compiler scopes this to the clip's own
    /// `source_range` (§4.D: "the compiler is responsible for scoping to
    /// the clip").
    pub fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::new(self.start_frame as f64, self.rate), RationalTime::new(1.0, self.rate))
    }

    pub fn spec(&self) -> Result<ImageSpec> {
        let filename = self.frame_name(self.start_frame);
        match &self.location {
            SequenceLocation::Disk(dir) => ImageReadNode::from_disk(dir.join(&filename), self.label.clone()).spec(),
            SequenceLocation::Archive { archive, base_name } => {
                let entry_name = format!("{base_name}{filename}");
                ImageReadNode::from_archive(Arc::clone(archive), entry_name, self.label.clone()).spec()
            }
        }
    }
}

impl ImageNode for SequenceReadNode {
    fn label(&self) -> &str {
        &self.label
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
        match self.decode() {
            Ok(buf) => Ok(buf),
            Err(e) => {
                warn!(error = %e, label = %self.label, "sequence frame decode failed, returning transparent frame");
                Ok(ImageBuf::new(ImageSpec::new(1, 1, 4, ComponentType::U8)))
            }
        }
    }
}

impl std::fmt::Debug for SequenceReadNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceReadNode").field("label", &self.label).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_number_floors_and_offsets() {
        let node = SequenceReadNode::from_disk(
            PathBuf::from("/tmp"),
            "render.".into(),
            ".png".into(),
            1,
            1,
            24.0,
            4,
            "seq",
        );
        assert_eq!(node.frame_number(RationalTime::new(12.9, 24.0)), 13);
        assert_eq!(node.frame_name(13), "render.0013.png");
    }
}
