//! Common utilities for integration tests

use assert_cmd::Command;
use assert_fs::{prelude::*, TempDir};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub const EXTENSION: &str = "blog";

/// Isolated environment: config file, cache, extensions dir and one path repository
pub struct TestEnv {
    pub temp: TempDir,
    index: Map<String, Value>,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        temp.child("repo").create_dir_all().unwrap();
        temp.child("extensions").child(EXTENSION).create_dir_all().unwrap();
        temp.child("config.yaml")
            .write_str(&format!(
                "extensions_dir: {}\ncache_dir: {}\nshow_progress: false\n",
                temp.child("extensions").path().display(),
                temp.child("cache").path().display()
            ))
            .unwrap();
        Self {
            temp,
            index: Map::new(),
        }
    }

    /// `xpm` with the test config and an isolated home directory
    pub fn xpm(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_xpm"));
        cmd.current_dir(self.temp.path())
            .env("HOME", self.temp.path())
            .env("XDG_CONFIG_HOME", self.temp.child("home-config").path())
            .env("XDG_CACHE_HOME", self.temp.child("home-cache").path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.temp.child("config.yaml").path());
        cmd
    }

    pub fn extension_dir(&self) -> PathBuf {
        self.temp.child("extensions").child(EXTENSION).to_path_buf()
    }

    pub fn vendor_dir(&self) -> PathBuf {
        self.extension_dir().join("vendor")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.extension_dir().join("extension.lock")
    }

    /// Write `extension.json` requiring `requires` from the test repository
    pub fn write_manifest(&self, requires: &[(&str, &str)]) {
        let require: Map<String, Value> = requires
            .iter()
            .map(|(name, expr)| (name.to_string(), json!(expr)))
            .collect();
        let manifest = json!({
            "name": EXTENSION,
            "packages": {
                "require": require,
                "repositories": [
                    {"type": "path", "url": self.temp.child("repo").path()}
                ]
            }
        });
        std::fs::write(
            self.extension_dir().join("extension.json"),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
    }

    /// Publish `name@version` as a tar.gz into the path repository
    ///
    /// The archive holds `VERSION` plus `extra_files`, under a single top-level
    /// directory the way release tarballs usually are.
    pub fn publish(
        &mut self,
        name: &str,
        version: &str,
        require: &[(&str, &str)],
        extra_files: &[(&str, &str)],
    ) {
        let archive_name = format!("{}-{}.tar.gz", name.replace('/', "-"), version);
        let mut files = vec![("VERSION", version)];
        files.extend_from_slice(extra_files);
        self.temp
            .child("repo")
            .child(&archive_name)
            .write_binary(&tar_gz("package", &files))
            .unwrap();

        let require: Map<String, Value> = require
            .iter()
            .map(|(n, e)| (n.to_string(), json!(e)))
            .collect();
        let versions = self
            .index
            .entry(name.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        versions.as_object_mut().unwrap().insert(
            version.to_string(),
            json!({"require": require, "dist": {"type": "tar", "url": archive_name}}),
        );

        let document = json!({ "packages": self.index });
        self.temp
            .child("repo")
            .child("packages.json")
            .write_str(&serde_json::to_string_pretty(&document).unwrap())
            .unwrap();
    }

    pub fn read_lock(&self) -> Value {
        serde_json::from_str(&std::fs::read_to_string(self.lock_path()).unwrap()).unwrap()
    }

    pub fn locked_version(&self, name: &str) -> Option<String> {
        self.read_lock()["packages"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["name"] == name)
            .map(|p| p["version"].as_str().unwrap().to_string())
    }
}

fn tar_gz(root: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, format!("{}/{}", root, path), content.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
