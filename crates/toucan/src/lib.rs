// crates/toucan/src/lib.rs
//
// Thin facade over the workspace: the library-level entry points an
// exporter or GUI collaborator actually calls (§6) — open a timeline,
// stand up a plugin host, compile and render frames, push them to a
// writer. Everything here just wires the lower crates together; no new
// behavior lives in this crate. `anyhow` sits at this edge the way it does
// for any lower crate's top-level callers that prefer `thiserror`
// internally: callers here want one error type to `?` through, not to
// match on.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use toucan_core::node::{ImageBuf, ImageNode};
pub use toucan_core::time::RationalTime;
pub use toucan_core::EffectRegistry;
pub use toucan_graph::Compiler;
pub use toucan_host::Host;
pub use toucan_media::{MovieWriter, SequenceWriter, TimelineWrapper};

/// Opens a timeline document at `path` — plain JSON, directory archive, or
/// `.otioz` zip archive, dispatched by extension (§4.C).
pub fn open_timeline(path: impl AsRef<Path>) -> Result<TimelineWrapper> {
    let path = path.as_ref();
    TimelineWrapper::open(path).with_context(|| format!("opening timeline at {}", path.display()))
}

/// Discovers and loads every plugin under `search_paths` (recursing up to
/// depth 2, §4.E), describing each for the generator/filter/transition
/// contexts the compiler dispatches into.
pub fn make_host(search_paths: &[PathBuf]) -> Result<Host> {
    Host::discover(search_paths, &["generator", "filter", "transition"]).context("discovering plugins")
}

/// Builds a compiler bound to one wrapper's probed image size, one host,
/// and one effect registry (§4.G step 1, §4.I).
pub fn make_compiler(wrapper: &TimelineWrapper, host: Host, registry: EffectRegistry) -> Compiler {
    Compiler::new(wrapper, std::rc::Rc::new(std::cell::RefCell::new(host)), registry)
}

/// Renders one frame (§4.J): compiles at `time`, executes the root,
/// resizes to `target_size` if given and different from the graph's
/// native size.
pub fn render_frame(
    compiler: &Compiler,
    wrapper: &TimelineWrapper,
    time: RationalTime,
    target_size: Option<(usize, usize)>,
) -> Result<ImageBuf> {
    toucan_graph::render_frame(compiler, wrapper, time, target_size).context("rendering frame")
}

/// Installs a `tracing-subscriber` formatter honoring `RUST_LOG`, falling
/// back to `info` — the ambient logging setup every binary-level caller of
/// this library is expected to run once at startup.
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
