// crates/toucan-media/src/lib.rs
//
// Everything that touches a filesystem, a memory-mapped file, or ffmpeg:
// the archive-aware timeline wrapper, the three concrete Read nodes, and
// the sequence/movie writer adapters. `toucan-core` stays pure data; this
// crate is where that data meets real media.

pub mod archive;
pub mod read;
pub mod wrapper;
pub mod writer;

pub use read::{ImageReadNode, MovieDecoder, MovieReadNode, SequenceReadNode};
pub use wrapper::{MediaLocation, TimelineWrapper};
pub use writer::{MovieWriter, SequenceWriter};
