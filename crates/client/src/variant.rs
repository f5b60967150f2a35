//! Variant override parsing from page request parameters.

use split_core::Variant;
use std::collections::HashMap;

/// Query parameter forcing a variant for every component.
const GLOBAL_OVERRIDE_PARAM: &str = "variant";

/// Prefix for per-component overrides: `variant_<componentId>=a|b`.
const COMPONENT_OVERRIDE_PREFIX: &str = "variant_";

/// Explicit variant overrides carried by a page request.
///
/// A per-component override always wins over the global override, which in
/// turn wins over any persisted assignment. Overridden assignments are
/// recorded as forced so analysis can exclude them.
#[derive(Debug, Clone, Default)]
pub struct VariantOverrides {
    global: Option<Variant>,
    per_component: HashMap<String, Variant>,
}

impl VariantOverrides {
    /// Parses overrides from a URL query string (without the leading `?`).
    /// Unrecognized values are ignored.
    pub fn from_query(query: &str) -> Self {
        let mut overrides = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let Some(variant) = Variant::parse(&value) else {
                continue;
            };

            if key == GLOBAL_OVERRIDE_PARAM {
                overrides.global = Some(variant);
            } else if let Some(component_id) = key.strip_prefix(COMPONENT_OVERRIDE_PREFIX) {
                if !component_id.is_empty() {
                    overrides
                        .per_component
                        .insert(component_id.to_string(), variant);
                }
            }
        }

        overrides
    }

    /// The override shared across all components, if any.
    pub fn global(&self) -> Option<Variant> {
        self.global
    }

    /// The override for one specific component, if any.
    pub fn component(&self, component_id: &str) -> Option<Variant> {
        self.per_component.get(component_id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_none() && self.per_component.is_empty()
    }
}
