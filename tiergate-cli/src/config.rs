//! `tiergate.toml`: where the CLI finds its database, policy and modules.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "tiergate.toml";

/// One manifest directory and the source name recorded for its modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDir {
    pub name: String,
    pub path: PathBuf,
}

/// CLI configuration. Relative paths resolve against the config file's
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub database: PathBuf,
    /// Tier policy file. `None` uses `~/.tiergate/tiers.toml`.
    pub policy: Option<PathBuf>,
    /// Manifest directories in discovery order. Earlier directories win
    /// id collisions, so core modules go first.
    pub module_dirs: Vec<ModuleDir>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("tiergate.db"),
            policy: None,
            module_dirs: vec![
                ModuleDir {
                    name: "core".into(),
                    path: PathBuf::from("modules/core"),
                },
                ModuleDir {
                    name: "site".into(),
                    path: PathBuf::from("modules/site"),
                },
            ],
        }
    }
}

impl CliConfig {
    /// Reads `path`. A missing file yields the defaults; a malformed one is
    /// an error.
    pub fn load(path: &Path) -> Result<Self> {
        let base = path.parent().unwrap_or(Path::new("."));
        if !path.exists() {
            info!("No config at {:?}, using defaults", path);
            return Ok(Self::default().resolved(base));
        }
        let contents =
            std::fs::read_to_string(path).with_context(|| format!("Failed to read {path:?}"))?;
        let config: Self =
            toml::from_str(&contents).with_context(|| format!("Failed to parse {path:?}"))?;
        Ok(config.resolved(base))
    }

    /// Makes every relative path absolute against `base`.
    #[must_use]
    pub fn resolved(mut self, base: &Path) -> Self {
        let join = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.database = join(&self.database);
        self.policy = self.policy.as_deref().map(join);
        for dir in &mut self.module_dirs {
            dir.path = join(&dir.path);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_put_core_first() {
        let config = CliConfig::default();
        assert_eq!(config.module_dirs[0].name, "core");
        assert_eq!(config.module_dirs[1].name, "site");
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let config = CliConfig {
            database: PathBuf::from("data/t.db"),
            policy: Some(PathBuf::from("/etc/tiergate/tiers.toml")),
            module_dirs: vec![ModuleDir {
                name: "core".into(),
                path: PathBuf::from("mods"),
            }],
        }
        .resolved(Path::new("/srv/app"));

        assert_eq!(config.database, PathBuf::from("/srv/app/data/t.db"));
        assert_eq!(config.policy, Some(PathBuf::from("/etc/tiergate/tiers.toml")));
        assert_eq!(config.module_dirs[0].path, PathBuf::from("/srv/app/mods"));
    }
}
