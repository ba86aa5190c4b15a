//! Role permissions as `resource:action` strings with `*` wildcards,
//! e.g. `docs:review`, `tickets:*` or `*`.

use std::collections::BTreeSet;

pub const RESOURCES: &[&str] = &[
    "docs",
    "tickets",
    "helpdesk",
    "departments",
    "feed",
    "settings",
    "users",
];

pub const ACTIONS: &[&str] = &["read", "write", "review", "admin", "*"];

pub fn is_valid(permission: &str) -> bool {
    if permission == "*" {
        return true;
    }
    match permission.split_once(':') {
        Some((resource, action)) => RESOURCES.contains(&resource) && ACTIONS.contains(&action),
        None => false,
    }
}

/// Trims, dedups and sorts; returns the first unknown permission as the error.
pub fn normalize(permissions: &[String]) -> Result<Vec<String>, String> {
    let mut out = BTreeSet::new();
    for raw in permissions {
        let permission = raw.trim().to_lowercase();
        if !is_valid(&permission) {
            return Err(format!("unknown permission '{raw}'"));
        }
        out.insert(permission);
    }
    Ok(out.into_iter().collect())
}

pub fn grants(granted: &[String], required: &str) -> bool {
    let Some((resource, action)) = required.split_once(':') else {
        return granted.iter().any(|g| g == "*");
    };
    granted.iter().any(|g| {
        g == "*" || g == required || g.split_once(':').is_some_and(|(r, a)| r == resource && (a == "*" || a == action))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perms(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_rejects_unknown() {
        assert_eq!(
            normalize(&perms(&[" Docs:Read", "tickets:*", "docs:read"])).unwrap(),
            perms(&["docs:read", "tickets:*"])
        );
        assert!(normalize(&perms(&["billing:read"])).is_err());
        assert!(normalize(&perms(&["docs"])).is_err());
    }

    #[test]
    fn test_wildcards() {
        let reviewer = perms(&["docs:review", "tickets:*"]);
        assert!(grants(&reviewer, "docs:review"));
        assert!(grants(&reviewer, "tickets:admin"));
        assert!(!grants(&reviewer, "docs:write"));
        assert!(grants(&perms(&["*"]), "settings:admin"));
    }
}
