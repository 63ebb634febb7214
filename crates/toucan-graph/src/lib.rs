// crates/toucan-graph/src/lib.rs
//
// The compiler that turns timeline data + plugin host into an executable
// image-node graph, and the render driver that runs it for one frame.

pub mod compiler;
pub mod driver;

pub use compiler::Compiler;
pub use driver::render_frame;
