// crates/toucan-host/src/host.rs
//
// Plugin discovery, lifecycle dispatch, and the arenas that replace the
// source's pointer-cast plugin/instance handles with integer indices
// (§9 redesign note). `Host` owns every loaded library and every
// `PluginRecord`/`InstanceRecord`; `ImageEffectNode` (node.rs) only ever
// holds a `{plugin_index, instance_index}` pair plus a shared handle back
// to the host.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use toucan_core::{Error, PropertySet, PropertyValue, Result};
use tracing::{debug, warn};

use crate::abi::{
    self, cstr_to_string, StatusCode, ACTION_CREATE_INSTANCE, ACTION_DESCRIBE, ACTION_DESCRIBE_IN_CONTEXT,
    ACTION_DESTROY_INSTANCE, ACTION_LOAD, ACTION_RENDER, ACTION_UNLOAD,
};
use crate::loader::PluginLibrary;
use crate::suites;

/// The `HostDescriptor` every discovered plugin is handed through
/// `set_host`. A single `'static` instance suffices since `fetch_suite`
/// carries no per-host state of its own (every suite call resolves through
/// a thread-local dispatch context instead) — a plugin is free to retain
/// the pointer for its whole lifetime rather than just the `set_host` call.
static HOST_DESCRIPTOR: abi::HostDescriptor = abi::HostDescriptor { host: std::ptr::null(), fetch_suite: suites::fetch_suite };

/// Parameter value type tag, reported by a plugin at `describe_in_context`
/// time via `param_define`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    Double,
    Str,
    IntArray,
    DoubleArray,
}

impl ParamType {
    /// Maps `param_define`'s `param_type` tag (`abi::PARAM_TYPE_*`) to the
    /// enum. An unrecognized tag falls back to `Double`, matching a plugin
    /// that never calls `param_define` at all.
    fn from_tag(tag: i64) -> ParamType {
        match tag as i32 {
            abi::PARAM_TYPE_BOOL => ParamType::Bool,
            abi::PARAM_TYPE_INT => ParamType::Int,
            abi::PARAM_TYPE_STRING => ParamType::Str,
            abi::PARAM_TYPE_INT_ARRAY => ParamType::IntArray,
            abi::PARAM_TYPE_DOUBLE_ARRAY => ParamType::DoubleArray,
            _ => ParamType::Double,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ContextDescription {
    pub clip_names: Vec<String>,
    pub param_types: HashMap<String, ParamType>,
    pub param_defaults: HashMap<String, PropertySet>,
}

/// Everything the host learned about one loaded plugin after `describe`
/// and `describe_in_context`.
pub struct PluginRecord {
    pub library_index: usize,
    pub descriptor_index: i32,
    pub identifier: String,
    pub properties: PropertySet,
    pub contexts: HashMap<String, ContextDescription>,
}

/// Per-instance state: one per live `ImageEffectNode`.
#[derive(Clone, Debug, Default)]
pub struct InstanceRecord {
    pub param_values: HashMap<String, PropertyValue>,
    pub clip_bindings: HashMap<String, usize>,
}

pub struct Host {
    libraries: Vec<PluginLibrary>,
    plugins: Vec<PluginRecord>,
    instances: Vec<Option<InstanceRecord>>,
}

impl Host {
    /// Recurses `search_paths` up to depth 2 collecting plugin-library
    /// files, loading each one and running `load`/`describe`/
    /// `describe_in_context` for every supported context (§4.E).
    ///
    /// Individual load/describe failures are logged and skipped. A plugin
    /// returning `FatalError` from any lifecycle step aborts construction
    /// with `FatalPlugin`.
    pub fn discover(search_paths: &[PathBuf], contexts: &[&str]) -> Result<Self> {
        // The directory walk itself is read-only and embarrassingly
        // parallel across independent search roots (§4.E "recurse a list
        // of search paths"); loading and describing each discovered
        // library stays sequential, since `load_library` mutates the
        // host's arenas one plugin at a time (§5: plugin list is mutated
        // only during host construction, never concurrently).
        let mut host = Self { libraries: Vec::new(), plugins: Vec::new(), instances: Vec::new() };
        let candidates: Vec<PathBuf> = search_paths
            .par_iter()
            .flat_map(|root| find_plugin_files(root, 2))
            .collect();
        for path in candidates {
            match PluginLibrary::open(&path) {
                Ok(library) => host.load_library(library, contexts)?,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to open plugin library, skipping"),
            }
        }
        Ok(host)
    }

    fn load_library(&mut self, library: PluginLibrary, contexts: &[&str]) -> Result<()> {
        let library_index = self.libraries.len();
        let count = library.plugin_count();
        for i in 0..count {
            let Some(descriptor) = library.get_plugin(i) else {
                warn!(path = %library.path().display(), index = i, "null plugin descriptor, skipping");
                continue;
            };
            let identifier = unsafe { cstr_to_string(descriptor.identifier) };

            // §4.E lifecycle step 1: `set_host(&host_descriptor)` before
            // `load`, handing the plugin `fetch_suite` so it can resolve the
            // property/parameter/image-effect tables for itself.
            (descriptor.set_host)(&HOST_DESCRIPTOR as *const abi::HostDescriptor);

            let mut in_args = PropertySet::new();
            let mut out_args = PropertySet::new();
            let status = dispatch(descriptor, ACTION_LOAD, 0, &mut in_args, &mut out_args);
            if status == StatusCode::FatalError {
                return Err(Error::FatalPlugin { path: library.path().to_path_buf() });
            }
            if !status.is_success() {
                warn!(identifier, "plugin load action failed, skipping");
                continue;
            }

            let mut describe_out = PropertySet::new();
            let status = dispatch(descriptor, ACTION_DESCRIBE, 0, &mut PropertySet::new(), &mut describe_out);
            if status == StatusCode::FatalError {
                return Err(Error::FatalPlugin { path: library.path().to_path_buf() });
            }
            if !status.is_success() {
                warn!(identifier, "plugin describe action failed, skipping");
                continue;
            }

            let mut record = PluginRecord {
                library_index,
                descriptor_index: i,
                identifier: identifier.clone(),
                properties: describe_out,
                contexts: HashMap::new(),
            };

            for &context in contexts {
                let mut ctx_in = PropertySet::new();
                let _ = ctx_in.set_string("Context", 0, context);
                let mut ctx_out = PropertySet::new();
                let status = dispatch(descriptor, ACTION_DESCRIBE_IN_CONTEXT, 0, &mut ctx_in, &mut ctx_out);
                if status == StatusCode::FatalError {
                    return Err(Error::FatalPlugin { path: library.path().to_path_buf() });
                }
                if status.is_success() {
                    record.contexts.insert(context.to_string(), context_from_properties(&ctx_out));
                }
            }

            debug!(identifier, contexts = record.contexts.len(), "plugin described");
            self.plugins.push(record);
        }
        self.libraries.push(library);
        Ok(())
    }

    pub fn find_plugin(&self, identifier: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.identifier == identifier)
    }

    pub fn plugin(&self, index: usize) -> &PluginRecord {
        &self.plugins[index]
    }

    /// Creates an `InstanceRecord`, seeded with the plugin's declared
    /// parameter defaults overridden by `initial_params` (the timeline
    /// effect's own parameter dictionary, per §4.I). Returns the new
    /// instance's arena index.
    pub fn create_instance(
        &mut self,
        plugin_index: usize,
        context: &str,
        initial_params: &HashMap<String, serde_json::Value>,
    ) -> Result<usize> {
        let plugin = &self.plugins[plugin_index];
        let library = &self.libraries[plugin.library_index];
        let descriptor = library
            .get_plugin(plugin.descriptor_index)
            .expect("descriptor index recorded at discovery time must remain valid");

        let mut instance = InstanceRecord::default();
        if let Some(ctx) = plugin.contexts.get(context) {
            for (name, default_props) in &ctx.param_defaults {
                let param_type = ctx.param_types.get(name).copied().unwrap_or(ParamType::Double);
                if let Some(v) = default_property_value(param_type, default_props) {
                    instance.param_values.insert(name.clone(), v);
                }
            }
        }
        for (name, value) in initial_params {
            if let Some(v) = json_to_property(value) {
                instance.param_values.insert(name.clone(), v);
            }
        }

        // §4.E "Create instance": the seeded parameter values are the
        // instance's actual state, so the plugin needs them in `in_args` at
        // creation time, not just later during render.
        let mut in_args = PropertySet::new();
        populate_param_args(&instance.param_values, &mut in_args);
        let status = dispatch(descriptor, ACTION_CREATE_INSTANCE, 0, &mut in_args, &mut PropertySet::new());
        if status == StatusCode::FatalError {
            return Err(Error::FatalPlugin { path: library.path().to_path_buf() });
        }

        let index = self.instances.len();
        self.instances.push(Some(instance));
        Ok(index)
    }

    pub fn destroy_instance(&mut self, plugin_index: usize, instance_index: usize) {
        let plugin = &self.plugins[plugin_index];
        let library = &self.libraries[plugin.library_index];
        if let Some(descriptor) = library.get_plugin(plugin.descriptor_index) {
            let _ = dispatch(descriptor, ACTION_DESTROY_INSTANCE, instance_index, &mut PropertySet::new(), &mut PropertySet::new());
        }
        if let Some(slot) = self.instances.get_mut(instance_index) {
            *slot = None;
        }
    }

    /// Dispatches `render` for one node evaluation (§4.E "Node execution").
    /// `in_args` must already carry `Time`, `RenderWindow`, and any bound
    /// clip properties; `out_args` is filled in by the plugin (unused by
    /// any built-in consumer today, but part of the contract).
    pub fn render(
        &self,
        plugin_index: usize,
        instance_index: usize,
        in_args: &mut PropertySet,
        out_args: &mut PropertySet,
    ) -> Result<()> {
        let plugin = &self.plugins[plugin_index];
        let library = &self.libraries[plugin.library_index];
        let descriptor = library
            .get_plugin(plugin.descriptor_index)
            .expect("descriptor index recorded at discovery time must remain valid");
        let status = dispatch(descriptor, ACTION_RENDER, instance_index, in_args, out_args);
        match status {
            StatusCode::FatalError => Err(Error::FatalPlugin { path: library.path().to_path_buf() }),
            s if s.is_success() => Ok(()),
            _ => {
                warn!(identifier = %plugin.identifier, "render action failed");
                Ok(())
            }
        }
    }

    pub fn instance(&self, index: usize) -> Option<&InstanceRecord> {
        self.instances.get(index).and_then(|s| s.as_ref())
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        for (idx, plugin) in self.plugins.iter().enumerate() {
            let library = &self.libraries[plugin.library_index];
            if let Some(descriptor) = library.get_plugin(plugin.descriptor_index) {
                let status = dispatch(descriptor, ACTION_UNLOAD, 0, &mut PropertySet::new(), &mut PropertySet::new());
                if !status.is_success() {
                    warn!(identifier = %plugin.identifier, index = idx, "plugin unload reported failure");
                }
            }
        }
    }
}

fn dispatch(
    descriptor: &crate::abi::PluginDescriptor,
    action: &str,
    handle: usize,
    in_args: &mut PropertySet,
    out_args: &mut PropertySet,
) -> StatusCode {
    let Ok(action_c) = CString::new(action) else { return StatusCode::Failed };
    let in_ptr: *mut PropertySet = in_args;
    let out_ptr: *mut PropertySet = out_args;
    // `param_get_value` reads through whichever side of the call carries
    // live parameter values: `in_args` during render (populated by
    // `populate_param_args`), `out_args` everywhere else (so
    // `param_define`/`clip_define` write their declarations where
    // `context_from_properties` will look for them).
    let effect_properties = if action == ACTION_RENDER { in_ptr } else { out_ptr };
    let raw = suites::with_dispatch_context(effect_properties, || {
        (descriptor.main_entry)(action_c.as_ptr(), handle, in_ptr, out_ptr)
    });
    StatusCode::from_raw(raw)
}

/// Builds a `ContextDescription` from the `out_args` a plugin filled in
/// during `describe_in_context` via the parameter/clip suites'
/// `param_define`/`clip_define`. Each declared parameter carries its real
/// reported type and default, instead of a stubbed-out `Double`.
fn context_from_properties(props: &PropertySet) -> ContextDescription {
    let clip_count = props.get_dimension("Clips");
    let mut clip_names = Vec::with_capacity(clip_count);
    for i in 0..clip_count {
        if let Ok(name) = props.get_string("Clips", i) {
            clip_names.push(name);
        }
    }
    let param_count = props.get_dimension("Params");
    let mut param_types = HashMap::new();
    let mut param_defaults = HashMap::new();
    for i in 0..param_count {
        let Ok(name) = props.get_string("Params", i) else { continue };
        let tag = props.get_int(&format!("Param.{name}.Type"), 0).unwrap_or(0);
        let param_type = ParamType::from_tag(tag);
        let default_raw = props.get_string(&format!("Param.{name}.Default"), 0).unwrap_or_default();
        param_defaults.insert(name.clone(), encode_default(param_type, &default_raw));
        param_types.insert(name, param_type);
    }
    ContextDescription { clip_names, param_types, param_defaults }
}

/// Parses `param_define`'s text-encoded default into a one-entry
/// `PropertySet` under `"Default"`, typed per `param_type`. Array defaults
/// are comma-separated.
fn encode_default(param_type: ParamType, raw: &str) -> PropertySet {
    let mut props = PropertySet::new();
    match param_type {
        ParamType::Bool | ParamType::Int => {
            let _ = props.set_int("Default", 0, raw.trim().parse().unwrap_or(0));
        }
        ParamType::Double => {
            let _ = props.set_double("Default", 0, raw.trim().parse().unwrap_or(0.0));
        }
        ParamType::Str => {
            let _ = props.set_string("Default", 0, raw);
        }
        ParamType::IntArray => {
            let values: Vec<i64> = raw.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            let _ = props.set_int_n("Default", &values);
        }
        ParamType::DoubleArray => {
            let values: Vec<f64> = raw.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            let _ = props.set_double_n("Default", &values);
        }
    }
    props
}

/// The inverse of `encode_default` for a seeded instance value: reads
/// `"Default"` back out of `default_props` as `param_type` and returns the
/// scalar `PropertyValue` to seed the instance with. Array-typed defaults
/// aren't representable as a single instance value and are skipped.
fn default_property_value(param_type: ParamType, default_props: &PropertySet) -> Option<PropertyValue> {
    match param_type {
        ParamType::Bool | ParamType::Int => default_props.get_int("Default", 0).ok().map(PropertyValue::Int),
        ParamType::Double => default_props.get_double("Default", 0).ok().map(PropertyValue::Double),
        ParamType::Str => default_props.get_string("Default", 0).ok().map(PropertyValue::Str),
        ParamType::IntArray | ParamType::DoubleArray => None,
    }
}

/// Writes every instance parameter value into `args` under its own name,
/// typed per its `PropertyValue` variant. Shared by `create_instance` and
/// `ImageEffectNode::exec` (§4.E: both create-instance and render hand the
/// plugin its current parameter values through `in_args`).
pub fn populate_param_args(params: &HashMap<String, PropertyValue>, args: &mut PropertySet) {
    for (name, value) in params {
        match value {
            PropertyValue::Double(v) => {
                let _ = args.set_double(name, 0, *v);
            }
            PropertyValue::Int(v) => {
                let _ = args.set_int(name, 0, *v);
            }
            PropertyValue::Str(v) => {
                let _ = args.set_string(name, 0, v.clone());
            }
            PropertyValue::Pointer(_) => {}
        }
    }
}

fn json_to_property(value: &serde_json::Value) -> Option<PropertyValue> {
    match value {
        serde_json::Value::Number(n) => n.as_f64().map(PropertyValue::Double),
        serde_json::Value::String(s) => Some(PropertyValue::Str(s.clone())),
        serde_json::Value::Bool(b) => Some(PropertyValue::Int(if *b { 1 } else { 0 })),
        _ => None,
    }
}

/// Recurses `root` up to `max_depth` levels, collecting files whose
/// extension matches the platform's dynamic library convention.
fn find_plugin_files(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut out = Vec::new();
    collect(root, max_depth, &mut out);
    out
}

fn collect(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if depth > 0 {
                collect(&path, depth - 1, out);
            }
        } else if is_plugin_library(&path) {
            out.push(path);
        }
    }
}

#[cfg(target_os = "macos")]
fn is_plugin_library(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("dylib")
}

#[cfg(target_os = "windows")]
fn is_plugin_library(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("dll")
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn is_plugin_library(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("so")
}
