//! Tests for `xpm verify`

use super::common::{TestEnv, EXTENSION};
use predicates::prelude::*;
use std::fs;

fn installed_env() -> TestEnv {
    let mut env = TestEnv::new();
    env.publish("acme/log", "1.0.0", &[], &[("src/Logger.php", "<?php")]);
    env.write_manifest(&[("acme/log", "^1.0")]);
    env.xpm().arg("install").arg(EXTENSION).assert().success();
    env
}

#[test]
fn test_verify_without_packages() {
    let env = TestEnv::new();

    env.xpm()
        .arg("verify")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("No packages to verify"));
}

#[test]
fn test_verify_untouched_install() {
    let env = installed_env();

    env.xpm()
        .arg("verify")
        .arg(EXTENSION)
        .assert()
        .success()
        .stdout(predicate::str::contains("All packages verified successfully"));
}

#[test]
fn test_verify_detects_modified_files() {
    let env = installed_env();
    fs::write(
        env.vendor_dir().join("acme/log/src/Logger.php"),
        "<?php // patched",
    )
    .unwrap();

    env.xpm()
        .arg("verify")
        .arg(EXTENSION)
        .assert()
        .failure()
        .stdout(predicate::str::contains("acme/log"))
        .stderr(predicate::str::contains("Verification failed for 1 package(s)"));
}
