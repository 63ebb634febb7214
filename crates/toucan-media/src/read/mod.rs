// crates/toucan-media/src/read/mod.rs
//
// The three concrete Read node implementations (§4.D). Each is an
// `ImageNode` with no inputs; the wrapper decides which one a clip's media
// reference needs and constructs it in `wrapper::TimelineWrapper::make_read_node`.

pub mod image_read;
pub mod movie_read;
pub mod sequence_read;

pub use image_read::ImageReadNode;
pub use movie_read::{MovieDecoder, MovieReadNode};
pub use sequence_read::SequenceReadNode;
