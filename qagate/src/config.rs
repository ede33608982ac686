//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//!
//! 1. `application.yaml`
//! 2. `application-{profile}.yaml`
//! 3. `.env` and `.env.{profile}` (loaded into the process environment,
//!    never overriding variables that are already set)
//! 4. `QAGATE_{SECTION}_{KEY}` environment variables for scalar settings,
//!    e.g. `QAGATE_RULES_SNAPSHOT_TTL_SECS=5`
//!
//! The profile is `QAGATE_PROFILE` when set, otherwise the argument.
//! Missing files are skipped; the result is validated before it is returned.

use std::path::Path;

use qagate_core::{AccessError, QagateConfig};
use serde_yaml::{Mapping, Value};

/// Environment variable selecting the active profile.
pub const PROFILE_ENV: &str = "QAGATE_PROFILE";

const ENV_PREFIX: &str = "QAGATE";

#[derive(Clone, Copy)]
enum Scalar {
    /// Taken verbatim.
    Text,
    /// Parsed as a YAML scalar (numbers, booleans).
    Parsed,
}

const OVERRIDABLE: &[(&str, &str, Scalar)] = &[
    ("identity", "cache_ttl_secs", Scalar::Parsed),
    ("identity", "outage_ttl_secs", Scalar::Parsed),
    ("rules", "cache_enabled", Scalar::Parsed),
    ("rules", "snapshot_ttl_secs", Scalar::Parsed),
    ("audit", "capacity", Scalar::Parsed),
    ("audit", "log_events", Scalar::Parsed),
    ("server", "bind", Scalar::Text),
    ("server", "log_format", Scalar::Text),
];

/// Load the configuration for `profile` from the working directory.
pub fn load(profile: &str) -> Result<QagateConfig, AccessError> {
    load_from(Path::new("."), profile)
}

/// Load the configuration for `profile` from the files in `dir`.
pub fn load_from(dir: &Path, profile: &str) -> Result<QagateConfig, AccessError> {
    let active = active_profile(profile);

    let mut tree = Value::Mapping(Mapping::new());
    merge_file(&mut tree, &dir.join("application.yaml"))?;
    merge_file(&mut tree, &dir.join(format!("application-{active}.yaml")))?;

    let _ = dotenvy::from_path(dir.join(".env"));
    let _ = dotenvy::from_path(dir.join(format!(".env.{active}")));
    apply_env_overrides(&mut tree)?;

    let config: QagateConfig = serde_yaml::from_value(tree)?;
    config.validate()?;
    tracing::debug!(profile = %active, "configuration loaded");
    Ok(config)
}

/// `QAGATE_PROFILE` when set, otherwise `profile`.
pub fn active_profile(profile: &str) -> String {
    std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string())
}

/// Name of the variable overriding `section.key`.
pub fn env_key(section: &str, key: &str) -> String {
    format!("{ENV_PREFIX}_{section}_{key}").to_uppercase()
}

fn merge_file(tree: &mut Value, path: &Path) -> Result<(), AccessError> {
    if !path.exists() {
        return Ok(());
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| AccessError::Config(format!("{}: {e}", path.display())))?;
    let overlay: Value = serde_yaml::from_str(&content)
        .map_err(|e| AccessError::Config(format!("{}: {e}", path.display())))?;
    tracing::trace!(path = %path.display(), "config file merged");
    merge(tree, overlay);
    Ok(())
}

/// Deep-merge `overlay` into `base`. Mappings merge key by key; anything
/// else replaces. An empty document changes nothing.
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

fn apply_env_overrides(tree: &mut Value) -> Result<(), AccessError> {
    for &(section, key, scalar) in OVERRIDABLE {
        let name = env_key(section, key);
        let Ok(raw) = std::env::var(&name) else {
            continue;
        };
        let value = match scalar {
            Scalar::Text => Value::String(raw),
            Scalar::Parsed => serde_yaml::from_str(raw.trim())
                .map_err(|e| AccessError::Config(format!("{name}: {e}")))?,
        };
        tracing::trace!(variable = %name, "config override from environment");
        set(tree, section, key, value);
    }
    Ok(())
}

fn set(tree: &mut Value, section: &str, key: &str, value: Value) {
    if !tree.is_mapping() {
        *tree = Value::Mapping(Mapping::new());
    }
    let Value::Mapping(root) = tree else {
        return;
    };
    let section = Value::from(section);
    if !root.get(&section).is_some_and(Value::is_mapping) {
        root.insert(section.clone(), Value::Mapping(Mapping::new()));
    }
    if let Some(Value::Mapping(section)) = root.get_mut(&section) {
        section.insert(Value::from(key), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_is_deep() {
        let mut base: Value =
            serde_yaml::from_str("rules:\n  cache_enabled: true\n  snapshot_ttl_secs: 60\n").unwrap();
        let overlay: Value = serde_yaml::from_str("rules:\n  snapshot_ttl_secs: 5\n").unwrap();
        merge(&mut base, overlay);
        assert_eq!(base["rules"]["cache_enabled"], Value::Bool(true));
        assert_eq!(base["rules"]["snapshot_ttl_secs"], Value::from(5));
    }

    #[test]
    fn empty_overlay_changes_nothing() {
        let mut base: Value = serde_yaml::from_str("audit:\n  capacity: 10\n").unwrap();
        merge(&mut base, Value::Null);
        assert_eq!(base["audit"]["capacity"], Value::from(10));
    }

    #[test]
    fn set_creates_missing_sections() {
        let mut tree = Value::Null;
        set(&mut tree, "server", "bind", Value::from("127.0.0.1:9000"));
        assert_eq!(tree["server"]["bind"], Value::from("127.0.0.1:9000"));
    }

    #[test]
    fn env_keys_are_upper_snake_case() {
        assert_eq!(env_key("rules", "snapshot_ttl_secs"), "QAGATE_RULES_SNAPSHOT_TTL_SECS");
    }
}
