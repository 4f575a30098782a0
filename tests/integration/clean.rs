//! Tests for `xpm clean-cache`

use super::common::TestEnv;
use predicates::prelude::*;

#[test]
fn test_clean_empty_cache() {
    let env = TestEnv::new();

    env.xpm()
        .arg("clean-cache")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cache already clean"));
}

#[test]
fn test_clean_with_size_limit_zero_empties_cache() {
    let env = TestEnv::new();
    std::fs::create_dir_all(env.temp.path().join("cache/archives")).unwrap();
    std::fs::write(env.temp.path().join("cache/archives/stale.tar.gz"), vec![0u8; 64]).unwrap();

    env.xpm()
        .arg("clean-cache")
        .arg("--max-size-mb")
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 1 file(s)"));
}
