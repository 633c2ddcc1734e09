//! Unit tests for the layering rules.

use std::path::PathBuf;

use rstest::rstest;

use super::*;

fn lint_one(file: &str, contents: &str) -> Result<(), ArchitectureLintError> {
    lint_sources(&[LintSource {
        file: PathBuf::from(file),
        contents: contents.to_owned(),
    }])
}

#[rstest]
#[case::domain_uses_ports(
    "domain/service_client.rs",
    "use crate::domain::ports::HttpTransport; use tokio::sync::Mutex; fn f() {}",
    true
)]
#[case::domain_names_outbound(
    "domain/service_client.rs",
    "use crate::outbound::http::ReqwestTransport; fn f() {}",
    false
)]
#[case::domain_names_config_via_super(
    "domain/task_poller.rs",
    "use super::super::config::ClientConfig; fn f() {}",
    false
)]
#[case::domain_uses_reqwest(
    "domain/service_client.rs",
    "fn f() { let _ = reqwest::Client::new(); }",
    false
)]
#[case::domain_uses_cap_std(
    "domain/credential_store.rs",
    "use cap_std::fs::Dir; fn f() {}",
    false
)]
#[case::outbound_uses_domain(
    "outbound/http/reqwest_transport.rs",
    "use client::domain::ports::HttpTransport; use reqwest::Client; fn f() {}",
    true
)]
#[case::outbound_names_cli(
    "outbound/credentials/file_storage.rs",
    "use crate::cli::App; fn f() {}",
    false
)]
#[case::outbound_uses_clap(
    "outbound/credentials/file_storage.rs",
    "use clap::Parser; fn f() {}",
    false
)]
#[case::cli_wires_everything(
    "cli/app.rs",
    "use crate::outbound::http::ReqwestTransport; use crate::config::ClientConfig; use color_eyre::eyre::Result; fn f() {}",
    true
)]
fn applies_layer_rules(#[case] file: &str, #[case] contents: &str, #[case] ok: bool) {
    let result = lint_one(file, contents);
    assert_eq!(result.is_ok(), ok, "result: {result:?}");
}

#[rstest]
fn files_outside_layers_are_rejected() {
    let result = lint_one("main.rs", "fn main() {}");
    assert!(
        matches!(result, Err(ArchitectureLintError::Parse { .. })),
        "result: {result:?}"
    );
}

#[rstest]
fn repeated_imports_are_reported_once() {
    let result = lint_one(
        "domain/video.rs",
        "use reqwest::Client; fn f(_: reqwest::Client) {}",
    );
    let Err(ArchitectureLintError::Violations(violations)) = result else {
        panic!("expected violations, got {result:?}");
    };
    assert_eq!(violations.len(), 1, "violations: {violations:?}");
}
