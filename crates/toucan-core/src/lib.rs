// crates/toucan-core/src/lib.rs
//
// Pure data model and algorithms: time values, the property set, the
// timeline document model and its JSON parser, the image-node vocabulary,
// the host's built-in nodes, and the small utilities the compiler and
// timeline wrapper share. Nothing in this crate touches a file, a socket,
// or a dynamic library — those live in `toucan-host` and `toucan-media`.

pub mod builtins;
pub mod error;
pub mod node;
pub mod property;
pub mod registry;
pub mod time;
pub mod timeline;
pub mod util;

pub use error::{Error, Result};
pub use node::{ComponentType, ImageBuf, ImageNode, ImageSpec, NodeState};
pub use property::{PointerHandle, PropertySet, PropertyValue};
pub use registry::EffectRegistry;
pub use time::{RationalTime, TimeRange};
