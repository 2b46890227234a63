//! Walks a config directory tree into per-environment `ConfigObject`s for
//! offline mode (spec §4.3). Grounded in the teacher's bootstrap-file
//! loading idiom (`File::open` + `BufReader` + `serde_json::from_reader`,
//! fail-fast on a parse error), generalized from a single bootstrap file to
//! a directory of `env-*` subdirectories.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use relay_types::{ConfigObject, EnvironmentId, FeatureFlag, RelayError, RelayResult, Segment};
use tracing::{debug, info};

const FEATURE_CONFIG_FILE: &str = "feature_config.json";
const SEGMENTS_FILE: &str = "segments.json";
const TARGETS_FILE: &str = "targets.json";
const AUTH_CONFIG_FILE: &str = "auth_config.json";
const ENV_DIR_PREFIX: &str = "env-";

/// Loads `ConfigObject`s from a directory tree rooted at `config_dir`.
pub struct LocalConfigLoader {
    config_dir: PathBuf,
}

impl LocalConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    /// Produces one `ConfigObject` per `env-<envID>` directory found
    /// directly under `config_dir`. Unrecognized files and directories not
    /// matching `env-*` are ignored. Fails fast: the first file that cannot
    /// be parsed aborts the whole load.
    pub fn load(&self) -> RelayResult<Vec<ConfigObject>> {
        let mut objects = Vec::new();

        let entries = std::fs::read_dir(&self.config_dir).map_err(|e| {
            RelayError::config(format!("cannot read config directory {}: {e}", self.config_dir.display()))
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| RelayError::config(format!("cannot read directory entry: {e}")))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let Some(dir_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(env_id) = dir_name.strip_prefix(ENV_DIR_PREFIX) else {
                debug!(dir = dir_name, "ignoring directory not matching env-*");
                continue;
            };

            objects.push(self.load_environment(&path, EnvironmentId::new(env_id))?);
        }

        info!(environments = objects.len(), "loaded local config");
        Ok(objects)
    }

    fn load_environment(&self, dir: &Path, environment: EnvironmentId) -> RelayResult<ConfigObject> {
        let feature_configs: Vec<FeatureFlag> =
            read_json_list(&dir.join(FEATURE_CONFIG_FILE))?.unwrap_or_default();
        let segments: Vec<Segment> = read_json_list(&dir.join(SEGMENTS_FILE))?.unwrap_or_default();
        let api_keys: Vec<String> = read_json_list(&dir.join(AUTH_CONFIG_FILE))?.unwrap_or_default();

        // targets.json is parsed to fail fast on malformed input but its
        // contents are not persisted anywhere (spec §4.3: "currently ignored
        // by core writes").
        let _: Option<Vec<relay_types::Target>> = read_json_list(&dir.join(TARGETS_FILE))?;

        Ok(ConfigObject {
            id: environment,
            api_keys,
            feature_configs,
            segments,
        })
    }
}

fn read_json_list<T: serde::de::DeserializeOwned>(path: &Path) -> RelayResult<Option<Vec<T>>> {
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| RelayError::config(format!("cannot open {}: {e}", path.display())))?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map(Some)
        .map_err(|e| RelayError::config(format!("cannot parse {}: {e}", path.display())))
}
