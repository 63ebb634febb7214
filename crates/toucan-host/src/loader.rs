// crates/toucan-host/src/loader.rs
//
// Scoped acquisition of a native dynamic library (§4.B): open, resolve
// `plugin_count`/`get_plugin`, and release on drop. A plugin's lifetime is
// the lifetime of its loader handle — `libloading::Library` already gives
// us that via its own `Drop`, the same RAII shape this workspace uses to
// close its FFmpeg decoder contexts.

use std::path::{Path, PathBuf};

use libloading::Library;
use toucan_core::Error;

use crate::abi::{GetPluginFn, PluginCountFn, PluginDescriptor};

pub struct PluginLibrary {
    path: PathBuf,
    #[allow(dead_code)] // kept alive for its Drop; symbols below borrow from it
    library: Library,
    plugin_count: PluginCountFn,
    get_plugin: GetPluginFn,
}

impl PluginLibrary {
    /// Opens `path` and resolves the two required symbols. Either symbol
    /// missing is reported as `PluginLoad`, matching §4.B.
    pub fn open(path: &Path) -> Result<Self, Error> {
        let library = unsafe { Library::new(path) }.map_err(|e| Error::PluginLoad {
            path: path.to_path_buf(),
            cause: e.to_string(),
        })?;
        let plugin_count: PluginCountFn = unsafe {
            *library
                .get::<PluginCountFn>(b"plugin_count\0")
                .map_err(|e| Error::PluginLoad { path: path.to_path_buf(), cause: e.to_string() })?
        };
        let get_plugin: GetPluginFn = unsafe {
            *library
                .get::<GetPluginFn>(b"get_plugin\0")
                .map_err(|e| Error::PluginLoad { path: path.to_path_buf(), cause: e.to_string() })?
        };
        Ok(Self { path: path.to_path_buf(), library, plugin_count, get_plugin })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn plugin_count(&self) -> i32 {
        unsafe { (self.plugin_count)() }
    }

    /// Returns `None` if the plugin library hands back a null descriptor
    /// for this index, rather than panicking on a malformed plugin.
    pub fn get_plugin(&self, index: i32) -> Option<&PluginDescriptor> {
        let ptr = unsafe { (self.get_plugin)(index) };
        unsafe { ptr.as_ref() }
    }
}
