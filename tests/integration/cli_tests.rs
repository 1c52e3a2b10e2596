//! Integration tests for the CLI binary.
//!
//! Verifies that the `idw` binary responds to basic flags and can drive
//! a wallet directory end to end.
//!
//! This test is registered as a [[test]] in the idwallet-cli crate
//! so that CARGO_BIN_EXE_idw is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `idw` binary.
fn idw_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_idw"))
}

fn idw(home: &Path, args: &[&str]) -> Output {
    idw_binary()
        .arg("--home")
        .arg(home)
        .args(args)
        .env("IDW_PASSPHRASE", "cli-test-passphrase")
        .output()
        .expect("failed to execute idw")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = idw_binary()
        .arg("--help")
        .output()
        .expect("failed to execute idw --help");

    assert!(
        output.status.success(),
        "idw --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let out = stdout(&output);
    assert!(out.contains("Usage"), "missing usage: {out}");
    assert!(out.contains("create"), "missing create command: {out}");
}

#[test]
fn cli_responds_to_version() {
    let output = idw_binary()
        .arg("--version")
        .output()
        .expect("failed to execute idw --version");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(
        out.contains("0.1") || out.contains("idw"),
        "idw --version should contain version info, got: {out}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = idw_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute idw");

    assert!(
        !output.status.success(),
        "idw should exit with error on unknown flag"
    );
}

#[test]
fn cli_create_list_and_publish() {
    let dir = tempfile::tempdir().unwrap();

    let output = idw(dir.path(), &["create"]);
    assert!(
        output.status.success(),
        "create failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let out = stdout(&output);
    let did = out.lines().next().unwrap().trim().to_string();
    assert!(did.starts_with("did:iden3:polygon:main:"), "got {did}");
    assert!(out.contains("AuthKeyCredential"));

    let output = idw(dir.path(), &["list"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains(&did));

    let output = idw(dir.path(), &["publish", "--did", &did]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Published state"));

    let output = idw(dir.path(), &["publish", "--did", &did]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("already published"));
}

#[test]
fn cli_issue_revoke_and_status() {
    let dir = tempfile::tempdir().unwrap();

    let output = idw(dir.path(), &["create", "--status", "onchain"]);
    assert!(
        output.status.success(),
        "create failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let did = stdout(&output).lines().next().unwrap().trim().to_string();

    let output = idw(
        dir.path(),
        &[
            "issue",
            "--issuer",
            &did,
            "--schema",
            "https://example.org/kyc.json",
            "--type",
            "KYCAgeCredential",
            "--subject",
            r#"{"birthday":19960424}"#,
            "--nonce",
            "77",
        ],
    );
    assert!(
        output.status.success(),
        "issue failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let credential: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let id = credential["id"].as_str().unwrap().to_string();
    assert_eq!(credential["credentialStatus"]["revocationNonce"], 77);

    assert!(idw(dir.path(), &["publish", "--did", &did]).status.success());
    let output = idw(dir.path(), &["status", "--id", &id, "--refresh"]);
    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(stdout(&output).starts_with("valid"));

    assert!(idw(dir.path(), &["revoke", "--issuer", &did, "--nonce", "77"])
        .status
        .success());
    assert!(idw(dir.path(), &["publish", "--did", &did]).status.success());
    let output = idw(dir.path(), &["status", "--id", &id, "--refresh"]);
    assert!(output.status.success());
    assert!(stdout(&output).starts_with("REVOKED"));
}

#[test]
fn cli_rejects_malformed_did() {
    let dir = tempfile::tempdir().unwrap();
    let output = idw(dir.path(), &["show", "--did", "not-a-did"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}
