// crates/toucan-host/src/suites.rs
//
// The three function tables a plugin fetches through `fetch_suite` at
// `load` time (§4.E): property, parameter, and image-effect. A plugin calls
// back into these during `describe_in_context` to declare its parameters
// and clips, and during `render` to read current parameter values and pull
// and push clip images.
//
// Since host and plugin share the same render call stack (§5: no
// suspension points, single-threaded cooperative scheduling), every piece
// of state a suite call needs lives in a thread-local slot installed around
// the call that needs it: `ACTIVE_RENDER` for the clips bound to the render
// in progress, `DISPATCH` for the property set the current `main_entry`
// call should read/write through, and `HANDLE_NAMES` for the param/clip
// name table a `*_get_handle` call builds up over one such call. This plays
// the role the source's per-call opaque handle table plays, without a
// cross-process handle namespace.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

use toucan_core::node::{ImageBuf, ImageSpec};
use toucan_core::{PointerHandle, PropertySet, PropertyValue};

use crate::abi::{self, cstr_to_string, StatusCode};

thread_local! {
    static ACTIVE_RENDER: RefCell<Option<RenderContext>> = RefCell::new(None);
    static DISPATCH: RefCell<Option<DispatchContext>> = RefCell::new(None);
    static HANDLE_NAMES: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static STRING_SCRATCH: RefCell<Option<std::ffi::CString>> = RefCell::new(None);
}

pub struct RenderContext {
    clips: HashMap<String, ImageBuf>,
}

/// The property set a `param_define`/`clip_define`/`param_get_value` call
/// should act on for the `main_entry` call currently in progress:
/// `out_args` while describing, `in_args` while rendering.
struct DispatchContext {
    effect_properties: *mut PropertySet,
}

/// Installs the render context for the duration of `f`: `clips` are the
/// bound input images, and an `"Output"` clip of `output_spec` is seeded up
/// front so a real plugin can fetch its handle and write pixels straight
/// into it. Guaranteed to be cleared even if `f` unwinds, and always
/// returns a concrete buffer — a plugin that never touches "Output" simply
/// gets back the blank one it was seeded with.
pub fn with_render_context<R>(
    mut clips: HashMap<String, ImageBuf>,
    output_spec: ImageSpec,
    f: impl FnOnce() -> R,
) -> (R, ImageBuf) {
    clips.insert("Output".to_string(), ImageBuf::new(output_spec));
    ACTIVE_RENDER.with(|slot| *slot.borrow_mut() = Some(RenderContext { clips }));
    let result = f();
    let output = ACTIVE_RENDER
        .with(|slot| slot.borrow_mut().take())
        .and_then(|mut ctx| ctx.clips.remove("Output"))
        .unwrap_or_else(|| ImageBuf::new(output_spec));
    (result, output)
}

/// Installs the dispatch context for the duration of one `main_entry` call
/// and resets the handle table, since handles only need to stay valid for
/// that single call.
pub fn with_dispatch_context<R>(effect_properties: *mut PropertySet, f: impl FnOnce() -> R) -> R {
    HANDLE_NAMES.with(|h| h.borrow_mut().clear());
    DISPATCH.with(|slot| *slot.borrow_mut() = Some(DispatchContext { effect_properties }));
    let result = f();
    DISPATCH.with(|slot| *slot.borrow_mut() = None);
    result
}

fn register_handle(name: String) -> PointerHandle {
    HANDLE_NAMES.with(|h| {
        let mut h = h.borrow_mut();
        h.push(name);
        h.len() - 1
    })
}

fn resolve_handle(handle: PointerHandle) -> Option<String> {
    HANDLE_NAMES.with(|h| h.borrow().get(handle).cloned())
}

fn status_of(result: toucan_core::Result<()>) -> c_int {
    match result {
        Ok(()) => StatusCode::Ok as c_int,
        Err(_) => StatusCode::Failed as c_int,
    }
}

// ── property suite ──────────────────────────────────────────────────────

pub extern "C" fn prop_set_string(props: *mut PropertySet, key: *const c_char, index: c_int, value: *const c_char) -> c_int {
    if props.is_null() || index < 0 {
        return StatusCode::Failed as c_int;
    }
    let key = unsafe { cstr_to_string(key) };
    let value = unsafe { cstr_to_string(value) };
    let props = unsafe { &mut *props };
    status_of(props.set_string(&key, index as usize, value))
}

pub extern "C" fn prop_set_double(props: *mut PropertySet, key: *const c_char, index: c_int, value: f64) -> c_int {
    if props.is_null() || index < 0 {
        return StatusCode::Failed as c_int;
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &mut *props };
    status_of(props.set_double(&key, index as usize, value))
}

pub extern "C" fn prop_set_int(props: *mut PropertySet, key: *const c_char, index: c_int, value: i64) -> c_int {
    if props.is_null() || index < 0 {
        return StatusCode::Failed as c_int;
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &mut *props };
    status_of(props.set_int(&key, index as usize, value))
}

pub extern "C" fn prop_get_string(props: *const PropertySet, key: *const c_char, index: c_int) -> *const c_char {
    if props.is_null() || index < 0 {
        return std::ptr::null();
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &*props };
    let value = props.get_string(&key, index as usize).unwrap_or_default();
    let Ok(c_value) = std::ffi::CString::new(value) else { return std::ptr::null() };
    let ptr = c_value.as_ptr();
    // Valid until the next property-suite call on this thread, like errno.
    STRING_SCRATCH.with(|slot| *slot.borrow_mut() = Some(c_value));
    ptr
}

pub extern "C" fn prop_get_double(props: *const PropertySet, key: *const c_char, index: c_int) -> f64 {
    if props.is_null() || index < 0 {
        return 0.0;
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &*props };
    props.get_double(&key, index as usize).unwrap_or(0.0)
}

pub extern "C" fn prop_get_int(props: *const PropertySet, key: *const c_char, index: c_int) -> i64 {
    if props.is_null() || index < 0 {
        return 0;
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &*props };
    props.get_int(&key, index as usize).unwrap_or(0)
}

pub extern "C" fn prop_get_dimension(props: *const PropertySet, key: *const c_char) -> c_int {
    if props.is_null() {
        return 0;
    }
    let key = unsafe { cstr_to_string(key) };
    let props = unsafe { &*props };
    props.get_dimension(&key) as c_int
}

pub static PROPERTY_SUITE_V1: abi::PropertySuiteV1 = abi::PropertySuiteV1 {
    set_string: prop_set_string,
    set_double: prop_set_double,
    set_int: prop_set_int,
    get_string: prop_get_string,
    get_double: prop_get_double,
    get_int: prop_get_int,
    get_dimension: prop_get_dimension,
};

// ── parameter suite ──────────────────────────────────────────────────────

/// Declares one parameter on `props` (the context's `out_args` during
/// `describe_in_context`): appends `name` to `"Params"`, and records its
/// type tag and default under `"Param.<name>.Type"`/`"Param.<name>.Default"`
/// for `host::context_from_properties` to read back.
pub extern "C" fn param_define(props: *mut PropertySet, name: *const c_char, param_type: c_int, default_value: *const c_char) -> c_int {
    if props.is_null() {
        return StatusCode::Failed as c_int;
    }
    let name = unsafe { cstr_to_string(name) };
    let default_value = unsafe { cstr_to_string(default_value) };
    let props = unsafe { &mut *props };
    let dim = props.get_dimension("Params");
    if props.set_string("Params", dim, name.clone()).is_err() {
        return StatusCode::Failed as c_int;
    }
    let _ = props.set_int(&format!("Param.{name}.Type"), 0, param_type as i64);
    let _ = props.set_string(&format!("Param.{name}.Default"), 0, default_value);
    StatusCode::Ok as c_int
}

pub extern "C" fn param_get_handle(name: *const c_char, out_handle: *mut PointerHandle) -> c_int {
    if out_handle.is_null() {
        return StatusCode::Failed as c_int;
    }
    let name = unsafe { cstr_to_string(name) };
    let handle = register_handle(name);
    unsafe { *out_handle = handle };
    StatusCode::Ok as c_int
}

/// Reads the current value of the parameter named by `handle` out of the
/// dispatch's effect properties (render's `in_args`, already seeded with
/// every instance parameter by `host::populate_param_args`) and writes it
/// into `out_value` under `"Value"`, preserving whichever primitive type it
/// is actually stored as. `ReplyDefault` if the parameter was never set.
pub extern "C" fn param_get_value(handle: PointerHandle, out_value: *mut PropertySet) -> c_int {
    if out_value.is_null() {
        return StatusCode::Failed as c_int;
    }
    let Some(name) = resolve_handle(handle) else { return StatusCode::Failed as c_int };
    let Some(source) = DISPATCH.with(|slot| slot.borrow().as_ref().map(|ctx| ctx.effect_properties)) else {
        return StatusCode::Failed as c_int;
    };
    let source = unsafe { &*source };
    let Some(value) = source.get_any(&name, 0) else { return StatusCode::ReplyDefault as c_int };
    let out_value = unsafe { &mut *out_value };
    let result = match value {
        PropertyValue::Double(v) => out_value.set_double("Value", 0, v),
        PropertyValue::Int(v) => out_value.set_int("Value", 0, v),
        PropertyValue::Str(v) => out_value.set_string("Value", 0, v),
        PropertyValue::Pointer(v) => out_value.set_pointer("Value", 0, v),
    };
    status_of(result)
}

pub static PARAMETER_SUITE_V1: abi::ParameterSuiteV1 = abi::ParameterSuiteV1 {
    param_define,
    param_get_handle,
    param_get_value,
};

// ── image-effect (clip) suite ───────────────────────────────────────────

pub extern "C" fn clip_define(props: *mut PropertySet, name: *const c_char) -> c_int {
    if props.is_null() {
        return StatusCode::Failed as c_int;
    }
    let name = unsafe { cstr_to_string(name) };
    let props = unsafe { &mut *props };
    let dim = props.get_dimension("Clips");
    status_of(props.set_string("Clips", dim, name))
}

pub extern "C" fn clip_get_handle(name: *const c_char, out_handle: *mut PointerHandle) -> c_int {
    if out_handle.is_null() {
        return StatusCode::Failed as c_int;
    }
    let name = unsafe { cstr_to_string(name) };
    let handle = register_handle(name);
    unsafe { *out_handle = handle };
    StatusCode::Ok as c_int
}

/// Returns a pointer straight into the render in progress's own clip
/// storage — not a copy — so a plugin holding the `"Output"` handle writes
/// its result in place. Null if `handle` doesn't resolve to a bound clip
/// (a filter asking for a clip name no context declared, for instance).
pub extern "C" fn clip_get_image(handle: PointerHandle) -> *mut ImageBuf {
    let Some(name) = resolve_handle(handle) else { return std::ptr::null_mut() };
    ACTIVE_RENDER
        .with(|slot| slot.borrow_mut().as_mut().and_then(|ctx| ctx.clips.get_mut(&name)).map(|img| img as *mut ImageBuf))
        .unwrap_or(std::ptr::null_mut())
}

/// Nothing was allocated on the plugin's behalf by `clip_get_image`, so
/// this only exists to let a plugin signal it's done with the image; it
/// never frees anything.
pub extern "C" fn clip_release_image(_image: *mut ImageBuf) -> c_int {
    StatusCode::Ok as c_int
}

pub static IMAGE_EFFECT_SUITE_V1: abi::ImageEffectSuiteV1 = abi::ImageEffectSuiteV1 {
    clip_define,
    clip_get_handle,
    clip_get_image,
    clip_release_image,
};

/// The entry point handed to every plugin through `HostDescriptor`. Returns
/// null for an unknown suite name or an unsupported version, per §4.E.
pub extern "C" fn fetch_suite(name: *const c_char, version: c_int) -> *const c_void {
    let name = unsafe { cstr_to_string(name) };
    match (name.as_str(), version) {
        (abi::SUITE_PROPERTY, 1) => &PROPERTY_SUITE_V1 as *const abi::PropertySuiteV1 as *const c_void,
        (abi::SUITE_PARAMETER, 1) => &PARAMETER_SUITE_V1 as *const abi::ParameterSuiteV1 as *const c_void,
        (abi::SUITE_IMAGE_EFFECT, 1) => &IMAGE_EFFECT_SUITE_V1 as *const abi::ImageEffectSuiteV1 as *const c_void,
        _ => std::ptr::null(),
    }
}
