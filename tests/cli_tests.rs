//! CLI integration tests using assert_cmd.
//!
//! Tests without database: always run (help, arg validation).
//! Tests with database: gated on TEST_DATABASE_URL environment variable.

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

#[allow(deprecated)]
fn pluginhub() -> Command {
    let mut cmd = Command::cargo_bin("pluginhub").unwrap();
    // Keep the developer's environment out of the assertions.
    for var in [
        "DATABASE_URL",
        "JWT_SECRET",
        "GITHUB_BOT_TOKEN",
        "RESOURCE_DIR",
        "PORT",
        "PLUGINHUB_CONFIG",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

// --- Help and arg validation (no database needed) ---

#[test]
fn help_shows_all_subcommands() {
    pluginhub().arg("--help").assert().success().stdout(
        predicate::str::contains("serve")
            .and(predicate::str::contains("migrate"))
            .and(predicate::str::contains("grant"))
            .and(predicate::str::contains("token")),
    );
}

#[test]
fn help_grant_shows_args() {
    pluginhub()
        .args(["grant", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--user").and(predicate::str::contains("--level")));
}

#[test]
fn unknown_subcommand_fails() {
    pluginhub().arg("explode").assert().failure();
}

#[test]
fn serve_without_database_url_fails() {
    pluginhub()
        .arg("serve")
        .env("JWT_SECRET", "x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DATABASE_URL is required"));
}

#[test]
fn serve_without_jwt_secret_fails() {
    pluginhub()
        .args(["--database-url", "postgres://localhost/none", "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("JWT_SECRET is required"));
}

#[test]
fn grant_rejects_unknown_level() {
    pluginhub()
        .args(["--database-url", "postgres://localhost/none", "grant", "--user", "a", "--level", "root"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown access level"));
}

#[test]
fn token_is_printed_and_verifiable() {
    let output = pluginhub()
        .args(["token", "--user", "octocat", "--gh-token", "gho_abc"])
        .env("JWT_SECRET", common::TEST_JWT_SECRET)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let token = String::from_utf8(output).unwrap();
    let claims = pluginhub::server::middleware_auth::decode_session_token(
        common::TEST_JWT_SECRET,
        token.trim(),
    )
    .unwrap();
    assert_eq!(claims.sub, "octocat");
}

#[test]
fn config_file_errors_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pluginhub.toml");
    std::fs::write(&path, "[server]\nport = \"not a port\"\n").unwrap();
    pluginhub()
        .args(["--config", path.to_str().unwrap(), "migrate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid config"));
}

// --- Database-backed ---

#[test]
fn migrate_applies_schema() {
    if !common::has_test_db() {
        eprintln!("Skipping: TEST_DATABASE_URL not set");
        return;
    }
    pluginhub()
        .args(["--database-url", &common::test_db_url(), "migrate"])
        .assert()
        .success();
}
