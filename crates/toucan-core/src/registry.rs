// crates/toucan-core/src/registry.rs
//
// Maps a timeline effect's short name (e.g. "Blur", the schema-local
// identifier a timeline document's `effect_name` field carries) to the
// plugin identifier the host looks plugins up by. Every built-in plugin
// ships under `toucan:<short name, lowercased>`; third-party plugins
// register their own identifiers and are tried first so they can shadow a
// built-in with the same short name.

use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct EffectRegistry {
    overrides: HashMap<String, String>,
}

impl EffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin identifier for an effect short name, taking
    /// priority over the default `toucan:` convention.
    pub fn register(&mut self, short_name: impl Into<String>, plugin_identifier: impl Into<String>) {
        self.overrides.insert(short_name.into(), plugin_identifier.into());
    }

    /// Resolve an effect's short name to the plugin identifier the host
    /// should instantiate. Falls back to the `toucan:` naming convention
    /// when nothing was explicitly registered.
    pub fn resolve(&self, short_name: &str) -> String {
        self.overrides
            .get(short_name)
            .cloned()
            .unwrap_or_else(|| format!("toucan:{}", short_name.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_convention_lowercases_short_name() {
        let registry = EffectRegistry::new();
        assert_eq!(registry.resolve("Blur"), "toucan:blur");
    }

    #[test]
    fn explicit_registration_overrides_convention() {
        let mut registry = EffectRegistry::new();
        registry.register("Blur", "com.example.superblur");
        assert_eq!(registry.resolve("Blur"), "com.example.superblur");
    }
}
