// crates/toucan-core/src/builtins/mod.rs
//
// The small set of image nodes the host itself knows how to execute,
// without going through a plugin. These cover what the compiler always
// needs regardless of which effect plugins are installed: a background
// plate, track compositing, linear time remapping, and a fallback
// dissolve for transitions no plugin claims.

mod comp;
mod dissolve;
mod fill;
mod time_warp;

pub use comp::CompNode;
pub use dissolve::DissolveNode;
pub use fill::FillNode;
pub use time_warp::LinearTimeWarpNode;
