//! A throwaway Tiergate installation on disk.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tiergate_cli::{App, CliConfig};

pub const TIERS: &str = r#"
[tiers.free]
modules = ["notes"]
[tiers.free.limits]
exports = 2
episodes = 3

[tiers.gold]
modules = "all"
[tiers.gold.limits]
exports = "unlimited"
episodes = 100
"#;

pub const CONFIG: &str = r#"
database = "data/tiergate.db"
policy = "tiers.toml"

[[module_dirs]]
name = "core"
path = "modules/core"

[[module_dirs]]
name = "site"
path = "modules/site"
"#;

fn manifest(id: &str, name: &str) -> String {
    format!(
        r#"
id = "{id}"
name = "{name}"
description = "{name} module"
version = "1.0.0"
kind = "manifest"

[data_schema]
body = {{ type = "string", required = true }}
"#
    )
}

pub struct Install {
    pub dir: TempDir,
    pub config: CliConfig,
}

impl Install {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("tiergate.toml"), CONFIG).unwrap();
        fs::write(root.join("tiers.toml"), TIERS).unwrap();

        write_module(root, "modules/core", "notes.toml", &manifest("notes", "Notes"));
        write_module(root, "modules/core", "quiz.toml", &manifest("quiz", "Quiz"));
        // Same id as a core module: rejected, core wins.
        write_module(root, "modules/site", "quiz.toml", &manifest("quiz", "Site Quiz"));
        write_module(root, "modules/site", "broken.toml", "id = ");

        let config = CliConfig::load(&root.join("tiergate.toml")).unwrap();
        Self { dir, config }
    }

    pub fn app(&self) -> App {
        App::open(&self.config).unwrap()
    }
}

fn write_module(root: &Path, dir: &str, file: &str, contents: &str) {
    let dir = root.join(dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), contents).unwrap();
}
