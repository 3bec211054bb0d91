//! Integration tests for `bundlever show`.

mod common;

use bundlever::codec::EncodingKind;
use common::{TestEnv, parse_json};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_show_json() {
    let env = TestEnv::new();

    let output = env
        .bundlever()
        .args(["show", &env.bundle_arg()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    let docs = json["documents"].as_array().unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["document"], "info");
    assert_eq!(docs[0]["encoding"], "binary");
    assert_eq!(docs[0]["product_version"], "18.6.2");
    assert_eq!(docs[1]["document"], "manifest");
    assert_eq!(docs[1]["encoding"], "textual");
    assert_eq!(docs[1]["build_version"], "22G100");
}

#[test]
fn test_show_human() {
    let env = TestEnv::with_encodings(EncodingKind::Textual, EncodingKind::Binary);

    env.bundlever()
        .args(["-H", "show", &env.bundle_arg()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current values:"))
        .stdout(predicate::str::contains(
            "Info.plist (textual): Product Version=\"18.6.2\"",
        ))
        .stdout(predicate::str::contains(
            "Manifest.plist (binary): Lockdown.ProductVersion=\"18.6.2\", Lockdown.BuildVersion=\"22G100\"",
        ));
}

#[test]
fn test_show_does_not_modify_bundle() {
    let env = TestEnv::new();
    let info = env.read_info();
    let manifest = env.read_manifest();

    env.bundlever()
        .args(["show", &env.bundle_arg()])
        .assert()
        .success();

    assert_eq!(env.read_info(), info);
    assert_eq!(env.read_manifest(), manifest);
}

#[test]
fn test_show_missing_bundle_is_validation_failure() {
    let env = TestEnv::new();
    let missing = env.bundle_path().join("nope");

    env.bundlever()
        .args(["show", &missing.display().to_string()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("path does not exist"));
}

#[test]
fn test_show_missing_manifest() {
    let env = TestEnv::new();
    fs::remove_file(env.manifest_path()).unwrap();

    env.bundlever()
        .args(["-H", "show", &env.bundle_arg()])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("missing required files"))
        .stderr(predicate::str::contains("Manifest.plist"));
}

#[test]
fn test_show_garbage_document_is_parse_failure() {
    let env = TestEnv::with_documents(b"bplist00garbage", common::MANIFEST_XML.as_bytes());

    let output = env
        .bundlever()
        .args(["show", &env.bundle_arg()])
        .assert()
        .failure()
        .code(3)
        .get_output()
        .stderr
        .clone();

    let err = parse_json(&output);
    assert!(err["error"].as_str().unwrap().starts_with("Info.plist:"));
    assert_eq!(err["exit_code"], 3);
    assert_eq!(err["modified"], serde_json::json!([]));
}
