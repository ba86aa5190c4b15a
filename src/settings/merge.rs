//! Layered system settings: built-in defaults, then the tenant's global
//! document, then the department document.

use serde_json::{json, Map, Value};

pub fn defaults() -> Value {
    json!({
        "branding": {
            "siteName": "Intranet",
            "logoUrl": null,
            "primaryColor": "#2563eb"
        },
        "theme": {
            "mode": "light",
            "density": "comfortable"
        },
        "notifications": {
            "email": true,
            "digest": "daily",
            "ticketUpdates": true
        },
        "retention": {
            "ticketDays": 365,
            "feedDays": 90,
            "pageVersions": 50
        }
    })
}

/// Recursively overlays `overlay` onto `base`. Objects merge key by key;
/// any other value in `overlay`, including arrays, replaces the base value.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// JSON merge patch: `null` deletes a key, objects recurse.
pub fn apply_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(target) = target {
        for (key, value) in patch {
            if value.is_null() {
                target.remove(key);
            } else {
                apply_patch(target.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

pub fn effective(global: Option<&Value>, department: Option<&Value>) -> Value {
    let mut merged = defaults();
    for layer in [global, department].into_iter().flatten() {
        deep_merge(&mut merged, layer);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_department_overrides_single_leaf() {
        let global = json!({"branding": {"siteName": "Acme"}, "theme": {"mode": "dark"}});
        let dept = json!({"theme": {"density": "compact"}});
        let merged = effective(Some(&global), Some(&dept));

        assert_eq!(merged["branding"]["siteName"], "Acme");
        assert_eq!(merged["branding"]["primaryColor"], "#2563eb");
        assert_eq!(merged["theme"]["mode"], "dark");
        assert_eq!(merged["theme"]["density"], "compact");
        assert_eq!(merged["retention"]["ticketDays"], 365);
    }

    #[test]
    fn test_arrays_replace() {
        let mut base = json!({"links": [1, 2, 3]});
        deep_merge(&mut base, &json!({"links": [4]}));
        assert_eq!(base, json!({"links": [4]}));
    }

    #[test]
    fn test_patch_removes_null_keys() {
        let mut stored = json!({"theme": {"mode": "dark", "density": "compact"}});
        apply_patch(&mut stored, &json!({"theme": {"density": null}, "notifications": {"digest": "weekly"}}));
        assert_eq!(
            stored,
            json!({"theme": {"mode": "dark"}, "notifications": {"digest": "weekly"}})
        );
    }

    #[test]
    fn test_no_layers_gives_defaults() {
        assert_eq!(effective(None, None), defaults());
    }
}
