//! The cache keyspace from spec §4.2 / §6. Centralized here so every
//! repository agrees on the same layout and so a key never gets hand-built
//! twice with a subtly different format.

use relay_types::EnvironmentId;

pub fn auth_key(env: &EnvironmentId, hashed_api_key: &str) -> String {
    format!("auth-env-{env}/key-{hashed_api_key}")
}

pub fn auth_scan_prefix(env: &EnvironmentId) -> String {
    format!("auth-env-{env}/key-")
}

pub fn flag_key(env: &EnvironmentId, identifier: &str) -> String {
    format!("env-{env}/feature-config/{identifier}")
}

pub fn flag_list_key(env: &EnvironmentId) -> String {
    format!("env-{env}/feature-configs")
}

pub fn segment_key(env: &EnvironmentId, identifier: &str) -> String {
    format!("env-{env}/target-segments/{identifier}")
}

pub fn segment_list_key(env: &EnvironmentId) -> String {
    format!("env-{env}/target-segments")
}

pub fn inventory_key(proxy_key: &str) -> String {
    format!("inventory/{proxy_key}/assets")
}
