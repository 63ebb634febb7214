// crates/toucan-host/src/abi.rs
//
// The C ABI every plugin library exports (§4.B / §6 "Plugin ABI"): two
// library-level symbols, `plugin_count` and `get_plugin`, and a single
// `main_entry` dispatch per plugin driven by action strings instead of a
// vtable per lifecycle step.
//
// `set_host` hands the plugin a `HostDescriptor` carrying `fetch_suite`, the
// one entry point the plugin uses to resolve the property, parameter, and
// image-effect function tables it calls back through during describe and
// render (§4.E). The suite tables themselves live in `suites.rs`; this
// module only declares the shapes that cross the boundary.
//
// Plugins are expected to be built against the same `toucan-core` property
// set layout as the host (the common case for a same-language dylib plugin
// loaded with `libloading` — this is not a stable cross-language ABI, just
// a boundary narrow enough that only one struct definition crosses it).

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

use toucan_core::{ImageBuf, PointerHandle, PropertySet};

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusCode {
    Ok = 0,
    ReplyDefault = 1,
    Failed = 2,
    FatalError = 3,
}

impl StatusCode {
    pub fn from_raw(v: c_int) -> StatusCode {
        match v {
            0 => StatusCode::Ok,
            1 => StatusCode::ReplyDefault,
            2 => StatusCode::Failed,
            _ => StatusCode::FatalError,
        }
    }

    /// OK and ReplyDefault are both treated as success (§4.E).
    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::ReplyDefault)
    }
}

pub const ACTION_LOAD: &str = "load";
pub const ACTION_UNLOAD: &str = "unload";
pub const ACTION_DESCRIBE: &str = "describe";
pub const ACTION_DESCRIBE_IN_CONTEXT: &str = "describe_in_context";
pub const ACTION_CREATE_INSTANCE: &str = "create_instance";
pub const ACTION_DESTROY_INSTANCE: &str = "destroy_instance";
pub const ACTION_RENDER: &str = "render";

/// Names passed to `fetch_suite`, paired with the version a plugin asks for.
/// Only version 1 of each exists today.
pub const SUITE_PROPERTY: &str = "property";
pub const SUITE_PARAMETER: &str = "parameter";
pub const SUITE_IMAGE_EFFECT: &str = "image_effect";

/// `param_define`'s type tag, mirroring `host::ParamType`'s discriminants.
pub const PARAM_TYPE_BOOL: c_int = 0;
pub const PARAM_TYPE_INT: c_int = 1;
pub const PARAM_TYPE_DOUBLE: c_int = 2;
pub const PARAM_TYPE_STRING: c_int = 3;
pub const PARAM_TYPE_INT_ARRAY: c_int = 4;
pub const PARAM_TYPE_DOUBLE_ARRAY: c_int = 5;

/// Identifies one live ImageEffectNode's plugin-side state across the ABI
/// boundary. Opaque to the host once handed to a plugin.
pub type PluginHandle = usize;

/// Handed to a plugin through `set_host`. `host` is an opaque token a
/// plugin may log or compare by identity but must never dereference; every
/// suite call actually resolves its state through the thread-local dispatch
/// context `suites.rs` installs around each `main_entry` call, so the token
/// itself carries no payload.
#[repr(C)]
pub struct HostDescriptor {
    pub host: *const c_void,
    pub fetch_suite: extern "C" fn(name: *const c_char, version: c_int) -> *const c_void,
}

/// The property suite: typed get/set on whichever `PropertySet` pointer the
/// plugin currently holds — `in_args`/`out_args` from `main_entry`, or a
/// property set obtained from another suite. Index bounds and type
/// mismatches are reported through the return status; `get_*` return the
/// type's zero value on an unset key, matching `PropertySet`'s own
/// auto-create-on-read rule.
#[repr(C)]
pub struct PropertySuiteV1 {
    pub set_string: extern "C" fn(props: *mut PropertySet, key: *const c_char, index: c_int, value: *const c_char) -> c_int,
    pub set_double: extern "C" fn(props: *mut PropertySet, key: *const c_char, index: c_int, value: f64) -> c_int,
    pub set_int: extern "C" fn(props: *mut PropertySet, key: *const c_char, index: c_int, value: i64) -> c_int,
    pub get_string: extern "C" fn(props: *const PropertySet, key: *const c_char, index: c_int) -> *const c_char,
    pub get_double: extern "C" fn(props: *const PropertySet, key: *const c_char, index: c_int) -> f64,
    pub get_int: extern "C" fn(props: *const PropertySet, key: *const c_char, index: c_int) -> i64,
    pub get_dimension: extern "C" fn(props: *const PropertySet, key: *const c_char) -> c_int,
}

/// The parameter suite. `param_define` is called against `out_args` during
/// `describe_in_context` to declare one parameter's type and default;
/// `param_get_handle`/`param_get_value` are called during `render` to read
/// back the instance's current value for a parameter by name. A handle is
/// only valid for the `main_entry` call that produced it.
#[repr(C)]
pub struct ParameterSuiteV1 {
    pub param_define: extern "C" fn(props: *mut PropertySet, name: *const c_char, param_type: c_int, default_value: *const c_char) -> c_int,
    pub param_get_handle: extern "C" fn(name: *const c_char, out_handle: *mut PointerHandle) -> c_int,
    pub param_get_value: extern "C" fn(handle: PointerHandle, out_value: *mut PropertySet) -> c_int,
}

/// The image-effect (clip) suite. `clip_define` declares a clip during
/// `describe_in_context`, the same way `param_define` declares a parameter.
/// `clip_get_image` returns a pointer straight into the host's own render
/// buffer for the clip's current image — a plugin with the "Output" clip's
/// handle writes its result directly through it; `clip_release_image` is a
/// courtesy call, since nothing was allocated on the plugin's behalf.
#[repr(C)]
pub struct ImageEffectSuiteV1 {
    pub clip_define: extern "C" fn(props: *mut PropertySet, name: *const c_char) -> c_int,
    pub clip_get_handle: extern "C" fn(name: *const c_char, out_handle: *mut PointerHandle) -> c_int,
    pub clip_get_image: extern "C" fn(handle: PointerHandle) -> *mut ImageBuf,
    pub clip_release_image: extern "C" fn(image: *mut ImageBuf) -> c_int,
}

#[repr(C)]
pub struct PluginDescriptor {
    pub api_name: *const c_char,
    pub api_version: c_int,
    pub identifier: *const c_char,
    pub version_major: c_int,
    pub version_minor: c_int,
    pub set_host: extern "C" fn(host: *const HostDescriptor),
    pub main_entry: extern "C" fn(
        action: *const c_char,
        handle: PluginHandle,
        in_args: *mut PropertySet,
        out_args: *mut PropertySet,
    ) -> c_int,
}

pub type PluginCountFn = unsafe extern "C" fn() -> c_int;
pub type GetPluginFn = unsafe extern "C" fn(index: c_int) -> *const PluginDescriptor;

/// Reads a `*const c_char` produced by a plugin as an owned `String`. Used
/// only on bytes the plugin itself handed us, immediately after the call
/// that produced them.
pub unsafe fn cstr_to_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned()
}
