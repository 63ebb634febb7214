// crates/toucan-core/src/timeline/effect.rs
//
// An effect is a tagged record {effect_name, parameters}. The time-warp
// subset (currently just `LinearTimeWarp`) is distinguished by name and
// consumed by the compiler directly; every other effect name is dispatched
// to the plugin host by the effect registry.

use std::collections::HashMap;

use serde_json::Value;

/// Verbatim parameter dictionary, kept as JSON values so any scalar or
/// homogeneous sequence a timeline document carries survives untouched until
/// it is forwarded to the plugin host.
pub type Parameters = HashMap<String, Value>;

#[derive(Clone, Debug)]
pub struct Effect {
    pub effect_name: String,
    pub parameters:  Parameters,
}

impl Effect {
    pub fn new(effect_name: impl Into<String>, parameters: Parameters) -> Self {
        Self { effect_name: effect_name.into(), parameters }
    }

    /// True for the distinguished time-warp subset the compiler applies
    /// itself, never through the plugin host.
    pub fn is_time_warp(&self) -> bool {
        self.effect_name == "LinearTimeWarp"
    }

    /// `time_scalar` parameter of a `LinearTimeWarp`, if this effect is one.
    pub fn time_scalar(&self) -> Option<f64> {
        if !self.is_time_warp() {
            return None;
        }
        self.parameters.get("time_scalar").and_then(Value::as_f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_linear_time_warp() {
        let mut params = Parameters::new();
        params.insert("time_scalar".into(), Value::from(2.0));
        let e = Effect::new("LinearTimeWarp", params);
        assert!(e.is_time_warp());
        assert_eq!(e.time_scalar(), Some(2.0));
    }

    #[test]
    fn non_time_warp_has_no_scalar() {
        let e = Effect::new("BlurEffect", Parameters::new());
        assert!(!e.is_time_warp());
        assert_eq!(e.time_scalar(), None);
    }
}
