//! Tests for `xpm list`

use super::common::{TestEnv, EXTENSION};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_list_before_install() {
    let env = TestEnv::new();

    env.xpm()
        .arg("list")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages installed."));
}

#[test]
fn test_list_shows_installed_versions() {
    let mut env = TestEnv::new();
    env.publish("acme/log", "1.0.0", &[], &[]);
    env.publish("acme/http", "2.0.0", &[("acme/log", "^1.0")], &[]);
    env.write_manifest(&[("acme/http", "^2.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();

    env.xpm()
        .arg("list")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/http 2.0.0\nacme/log 1.0.0\n"));
}

#[test]
fn test_list_flags_missing_directories() {
    let mut env = TestEnv::new();
    env.publish("acme/log", "1.0.0", &[], &[]);
    env.write_manifest(&[("acme/log", "^1.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();

    fs::remove_dir_all(env.vendor_dir().join("acme/log")).unwrap();

    env.xpm()
        .arg("list")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/log 1.0.0 (missing)"));
}
