// crates/toucan-core/src/node.rs
//
// The compiled graph's vocabulary. An `ImageNode` is anything that can
// produce an `ImageBuf` for the time it's currently set to; `exec()` is
// expected to pull from `inputs()` and recurse itself when it needs upstream
// pixels (the compiler wires the DAG up front, nodes don't know they're in
// one).

use std::fmt;

/// Pixel storage component type, in increasing precision order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentType {
    U8,
    U16,
    F16,
    F32,
}

impl ComponentType {
    pub fn byte_size(self) -> usize {
        match self {
            ComponentType::U8 => 1,
            ComponentType::U16 => 2,
            ComponentType::F16 => 2,
            ComponentType::F32 => 4,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageSpec {
    pub width: usize,
    pub height: usize,
    pub channel_count: usize,
    pub component_type: ComponentType,
}

impl ImageSpec {
    pub fn new(width: usize, height: usize, channel_count: usize, component_type: ComponentType) -> Self {
        Self { width, height, channel_count, component_type }
    }

    /// RGBA8 is the format every built-in node produces and consumes; other
    /// component types exist for read nodes that decode into them directly,
    /// with conversion happening on first use by a node that needs RGBA8.
    pub fn rgba8(width: usize, height: usize) -> Self {
        Self::new(width, height, 4, ComponentType::U8)
    }

    pub fn row_stride(&self) -> usize {
        self.width * self.channel_count * self.component_type.byte_size()
    }

    pub fn byte_size(&self) -> usize {
        self.row_stride() * self.height
    }
}

/// A decoded image: a spec plus tightly packed pixel data, row-major,
/// top-to-bottom.
#[derive(Clone)]
pub struct ImageBuf {
    pub spec: ImageSpec,
    pub data: Vec<u8>,
}

impl fmt::Debug for ImageBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuf")
            .field("spec", &self.spec)
            .field("data_len", &self.data.len())
            .finish()
    }
}

impl ImageBuf {
    pub fn new(spec: ImageSpec) -> Self {
        let data = vec![0u8; spec.byte_size()];
        Self { spec, data }
    }

    /// A fully transparent black RGBA8 image of the given size — what `Fill`
    /// produces as a base plate and what the compiler substitutes when a
    /// track resolves to nothing at all.
    pub fn transparent(width: usize, height: usize) -> Self {
        Self::new(ImageSpec::rgba8(width, height))
    }

    pub fn width(&self) -> usize {
        self.spec.width
    }

    pub fn height(&self) -> usize {
        self.spec.height
    }
}

use crate::time::RationalTime;

/// A node in the compiled image graph. Every node is evaluated for a single
/// query time; `set_time`/`set_time_offset` let the compiler retarget a
/// shared node subgraph before each `exec()` without rebuilding it.
pub trait ImageNode: fmt::Debug {
    fn label(&self) -> &str;

    fn inputs(&self) -> &[Box<dyn ImageNode>];
    fn inputs_mut(&mut self) -> &mut Vec<Box<dyn ImageNode>>;

    fn time(&self) -> RationalTime;
    fn set_time(&mut self, time: RationalTime);

    /// Offset applied between this node's query time and the time it asks
    /// its inputs to render at. Time warps are the only built-in node that
    /// sets this to anything other than zero.
    fn time_offset(&self) -> RationalTime;
    fn set_time_offset(&mut self, offset: RationalTime);

    /// Evaluate this node at `time()`, recursing into inputs as needed.
    fn exec(&mut self) -> crate::Result<ImageBuf>;
}

/// Shared bookkeeping every concrete node embeds, mirroring how each
/// built-in keeps its own `label`/`time`/`time_offset` fields rather than
/// inheriting them.
#[derive(Clone, Debug, Default)]
pub struct NodeState {
    pub time: RationalTime,
    pub time_offset: RationalTime,
}

impl NodeState {
    pub fn new() -> Self {
        Self { time: RationalTime::new(0.0, 24.0), time_offset: RationalTime::new(0.0, 24.0) }
    }

    /// `time − time_offset` when `time_offset` is valid, else `time`
    /// unchanged — the time a node forwards to its inputs (§4.F).
    pub fn effective_time(&self) -> RationalTime {
        if self.time_offset.is_valid() {
            self.time - self.time_offset
        } else {
            self.time
        }
    }
}
