// crates/toucan-core/src/property.rs
//
// The property set is the one data structure that crosses every host<->plugin
// boundary (§4.A). It is deliberately dumb: a string-keyed map of typed
// vectors. Everything downstream — parameters, clip bindings, render
// arguments — is built out of one or more of these.
//
// A key is untyped until the first `set` call fixes its type; after that,
// setting a different primitive type on the same key is a `TypeMismatch`.
// Reading past the current length is `OutOfBounds`. Reading an unset key
// auto-creates it at the requested type with a zero value (an empty `get`
// returns the type's zero rather than erroring — only out-of-range indices
// on an *existing, shorter* vector fail).

use std::collections::HashMap;

use crate::error::{Error, Result};

/// An opaque handle into a host- or plugin-owned pointer table. The original
/// ABI casts raw pointers through `void*`; here we keep an integer handle so
/// no unsafe pointer ever crosses the property-set API (see design notes on
/// replacing opaque pointer casting with integer indices).
pub type PointerHandle = usize;

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Pointer(PointerHandle),
    Str(String),
    Double(f64),
    Int(i64),
}

impl PropertyValue {
    fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Pointer(_) => "pointer",
            PropertyValue::Str(_)     => "string",
            PropertyValue::Double(_)  => "double",
            PropertyValue::Int(_)     => "int",
        }
    }

    fn zero_like(&self) -> PropertyValue {
        match self {
            PropertyValue::Pointer(_) => PropertyValue::Pointer(0),
            PropertyValue::Str(_)     => PropertyValue::Str(String::new()),
            PropertyValue::Double(_)  => PropertyValue::Double(0.0),
            PropertyValue::Int(_)     => PropertyValue::Int(0),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PropertySet {
    entries: HashMap<String, Vec<PropertyValue>>,
}

impl PropertySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_dimension(&self, key: &str) -> usize {
        self.entries.get(key).map(|v| v.len()).unwrap_or(0)
    }

    pub fn reset(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Core single-value setter shared by the typed wrappers below.
    fn set_value(&mut self, key: &str, index: usize, value: PropertyValue) -> Result<()> {
        let entry = self.entries.entry(key.to_string()).or_default();
        if let Some(existing) = entry.first() {
            if existing.type_name() != value.type_name() {
                return Err(Error::TypeMismatch { key: key.to_string() });
            }
        }
        if index >= entry.len() {
            let zero = value.zero_like();
            entry.resize(index + 1, zero);
        }
        entry[index] = value;
        Ok(())
    }

    fn get_value(&self, key: &str, index: usize) -> Result<PropertyValue> {
        match self.entries.get(key) {
            Some(v) => v.get(index).cloned().ok_or_else(|| Error::OutOfBounds {
                key: key.to_string(),
                index,
                len: v.len(),
            }),
            // Unset keys auto-create on read in the type requested by the
            // caller — this is expressed per-type below since the untyped
            // `get_value` has no type to zero to.
            None => Err(Error::OutOfBounds { key: key.to_string(), index, len: 0 }),
        }
    }

    // ── pointer ──────────────────────────────────────────────────────────

    pub fn set_pointer(&mut self, key: &str, index: usize, value: PointerHandle) -> Result<()> {
        self.set_value(key, index, PropertyValue::Pointer(value))
    }

    pub fn set_pointer_n(&mut self, key: &str, values: &[PointerHandle]) -> Result<()> {
        for (i, v) in values.iter().enumerate() {
            self.set_pointer(key, i, *v)?;
        }
        Ok(())
    }

    pub fn get_pointer(&self, key: &str, index: usize) -> Result<PointerHandle> {
        match self.get_value(key, index) {
            Ok(PropertyValue::Pointer(v)) => Ok(v),
            Ok(_) => Err(Error::TypeMismatch { key: key.to_string() }),
            Err(Error::OutOfBounds { len: 0, .. }) if !self.entries.contains_key(key) => Ok(0),
            Err(e) => Err(e),
        }
    }

    // ── string ───────────────────────────────────────────────────────────

    pub fn set_string(&mut self, key: &str, index: usize, value: impl Into<String>) -> Result<()> {
        self.set_value(key, index, PropertyValue::Str(value.into()))
    }

    pub fn set_string_n(&mut self, key: &str, values: &[String]) -> Result<()> {
        for (i, v) in values.iter().enumerate() {
            self.set_string(key, i, v.clone())?;
        }
        Ok(())
    }

    pub fn get_string(&self, key: &str, index: usize) -> Result<String> {
        match self.get_value(key, index) {
            Ok(PropertyValue::Str(v)) => Ok(v),
            Ok(_) => Err(Error::TypeMismatch { key: key.to_string() }),
            Err(Error::OutOfBounds { len: 0, .. }) if !self.entries.contains_key(key) => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    // ── double ───────────────────────────────────────────────────────────

    pub fn set_double(&mut self, key: &str, index: usize, value: f64) -> Result<()> {
        self.set_value(key, index, PropertyValue::Double(value))
    }

    pub fn set_double_n(&mut self, key: &str, values: &[f64]) -> Result<()> {
        for (i, v) in values.iter().enumerate() {
            self.set_double(key, i, *v)?;
        }
        Ok(())
    }

    pub fn get_double(&self, key: &str, index: usize) -> Result<f64> {
        match self.get_value(key, index) {
            Ok(PropertyValue::Double(v)) => Ok(v),
            Ok(_) => Err(Error::TypeMismatch { key: key.to_string() }),
            Err(Error::OutOfBounds { len: 0, .. }) if !self.entries.contains_key(key) => Ok(0.0),
            Err(e) => Err(e),
        }
    }

    // ── int ──────────────────────────────────────────────────────────────

    pub fn set_int(&mut self, key: &str, index: usize, value: i64) -> Result<()> {
        self.set_value(key, index, PropertyValue::Int(value))
    }

    pub fn set_int_n(&mut self, key: &str, values: &[i64]) -> Result<()> {
        for (i, v) in values.iter().enumerate() {
            self.set_int(key, i, *v)?;
        }
        Ok(())
    }

    pub fn get_int(&self, key: &str, index: usize) -> Result<i64> {
        match self.get_value(key, index) {
            Ok(PropertyValue::Int(v)) => Ok(v),
            Ok(_) => Err(Error::TypeMismatch { key: key.to_string() }),
            Err(Error::OutOfBounds { len: 0, .. }) if !self.entries.contains_key(key) => Ok(0),
            Err(e) => Err(e),
        }
    }

    // ── untyped ──────────────────────────────────────────────────────────

    /// Reads back whichever variant is actually stored at `key`/`index`,
    /// without committing the caller to one of the typed getters above.
    /// Used at suite boundaries that forward a property from one set to
    /// another without knowing its type ahead of time. `None` for an unset
    /// key or an out-of-range index, never auto-creates.
    pub fn get_any(&self, key: &str, index: usize) -> Option<PropertyValue> {
        self.entries.get(key)?.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_double() {
        let mut p = PropertySet::new();
        p.set_double("Time", 0, 12.5).unwrap();
        assert_eq!(p.get_double("Time", 0).unwrap(), 12.5);
        assert_eq!(p.get_dimension("Time"), 1);
    }

    #[test]
    fn dimension_tracks_max_index_plus_one() {
        let mut p = PropertySet::new();
        p.set_int("RenderWindow", 3, 1080).unwrap();
        assert_eq!(p.get_dimension("RenderWindow"), 4);
        assert_eq!(p.get_int("RenderWindow", 0).unwrap(), 0);
        assert_eq!(p.get_int("RenderWindow", 3).unwrap(), 1080);
    }

    #[test]
    fn unset_key_reads_as_zero() {
        let p = PropertySet::new();
        assert_eq!(p.get_double("Nope", 0).unwrap(), 0.0);
        assert_eq!(p.get_string("Nope", 0).unwrap(), "");
    }

    #[test]
    fn out_of_bounds_on_existing_shorter_key() {
        let mut p = PropertySet::new();
        p.set_double("Value", 0, 1.0).unwrap();
        let err = p.get_double("Value", 5).unwrap_err();
        assert!(matches!(err, Error::OutOfBounds { .. }));
    }

    #[test]
    fn type_mismatch_on_second_set() {
        let mut p = PropertySet::new();
        p.set_double("Value", 0, 1.0).unwrap();
        let err = p.set_string("Value", 0, "oops").unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn reset_clears_key_and_allows_retype() {
        let mut p = PropertySet::new();
        p.set_double("Value", 0, 1.0).unwrap();
        p.reset("Value");
        assert_eq!(p.get_dimension("Value"), 0);
        p.set_string("Value", 0, "now a string").unwrap();
        assert_eq!(p.get_string("Value", 0).unwrap(), "now a string");
    }
}
