// crates/toucan-host/src/lib.rs
//
// The image-effect host: plugin discovery, lifecycle, suite dispatch, and
// the one `ImageNode` implementation backed by a loaded plugin instance.

pub mod abi;
pub mod host;
pub mod loader;
pub mod node;
pub mod suites;

pub use host::{ContextDescription, Host, InstanceRecord, ParamType, PluginRecord};
pub use loader::PluginLibrary;
pub use node::{EffectContext, ImageEffectNode};
