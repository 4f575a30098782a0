//! Tests for `xpm install` and `xpm update`

use super::common::{TestEnv, EXTENSION};
use predicates::prelude::*;
use std::fs;

fn env_with_log_packages() -> TestEnv {
    let mut env = TestEnv::new();
    env.publish("acme/log", "1.0.0", &[], &[("src/Logger.php", "<?php")]);
    env.publish("acme/http", "2.0.0", &[("acme/log", "^1.0")], &[]);
    env
}

#[test]
fn test_install_materializes_packages_and_writes_lock() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/http", "^2.0")]);

    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("+ acme/log@1.0.0"))
        .stdout(predicate::str::contains("+ acme/http@2.0.0"))
        .stdout(predicate::str::contains("Lock file written"));

    let vendor = env.vendor_dir();
    assert_eq!(
        fs::read_to_string(vendor.join("acme/log/VERSION")).unwrap(),
        "1.0.0"
    );
    assert!(vendor.join("acme/log/src/Logger.php").is_file());
    assert!(vendor.join("acme/http/VERSION").is_file());
    assert!(vendor.join(".xpm/installed.json").is_file());

    assert_eq!(env.locked_version("acme/log").as_deref(), Some("1.0.0"));
    assert_eq!(env.locked_version("acme/http").as_deref(), Some("2.0.0"));
}

#[test]
fn test_second_install_changes_nothing() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/http", "^2.0")]);

    env.xpm().arg("install").arg(EXTENSION).assert().success();
    let lock_before = fs::read(env.lock_path()).unwrap();
    let state_before = fs::read(env.vendor_dir().join(".xpm/installed.json")).unwrap();

    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to install or update"));

    assert_eq!(fs::read(env.lock_path()).unwrap(), lock_before);
    assert_eq!(
        fs::read(env.vendor_dir().join(".xpm/installed.json")).unwrap(),
        state_before
    );
}

#[test]
fn test_install_follows_lock_until_update() {
    let mut env = env_with_log_packages();
    env.write_manifest(&[("acme/http", "^2.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();

    env.publish("acme/log", "1.1.0", &[], &[]);

    // A newer release alone does not move a locked install
    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing to install or update"));
    assert_eq!(env.locked_version("acme/log").as_deref(), Some("1.0.0"));

    env.xpm()
        .arg("update")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("~ acme/log@1.0.0 -> 1.1.0"));
    assert_eq!(env.locked_version("acme/log").as_deref(), Some("1.1.0"));
    assert_eq!(
        fs::read_to_string(env.vendor_dir().join("acme/log/VERSION")).unwrap(),
        "1.1.0"
    );
}

#[test]
fn test_install_flag_update_matches_update_command() {
    let mut env = env_with_log_packages();
    env.write_manifest(&[("acme/log", "^1.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();
    env.publish("acme/log", "1.2.0", &[], &[]);

    env.xpm()
        .arg("install")
        .arg("--update")
        .arg(EXTENSION)
        .assert()
        .success();
    assert_eq!(env.locked_version("acme/log").as_deref(), Some("1.2.0"));
}

#[test]
fn test_dropped_requirement_is_removed() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/http", "^2.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();

    env.write_manifest(&[("acme/log", "^1.0")]);
    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("- acme/http@2.0.0"));

    assert!(!env.vendor_dir().join("acme/http").exists());
    assert!(env.vendor_dir().join("acme/log").is_dir());
    assert_eq!(env.locked_version("acme/http"), None);
}

#[test]
fn test_unsatisfiable_requirement_fails_without_writing() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/log", "^3.0")]);

    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to resolve 'acme/log'"));

    assert!(!env.lock_path().exists());
    assert!(!env.vendor_dir().join("acme").exists());
}

#[test]
fn test_missing_manifest_is_reported() {
    let env = TestEnv::new();

    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid manifest"));
}

#[test]
fn test_malformed_lock_is_reported() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/log", "^1.0")]);
    fs::write(env.lock_path(), "{ not json").unwrap();

    env.xpm()
        .arg("install")
        .arg(EXTENSION)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid lock file"));
}

#[test]
fn test_extension_can_be_given_by_path() {
    let env = env_with_log_packages();
    env.write_manifest(&[("acme/log", "^1.0")]);

    env.xpm()
        .arg("install")
        .arg(env.extension_dir())
        .assert()
        .success();
    assert!(env.vendor_dir().join("acme/log/VERSION").is_file());
}
