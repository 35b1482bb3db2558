use drive_relink::link::LinkPattern;
use drive_relink::load_config::{load_config, parse_config, ENV_TOKEN_PATH, ENV_UPLOAD_PUBLIC_HOST, ENV_UPLOAD_URL};
use drive_relink::synchronise::ListingFailurePolicy;
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

fn clear_env() {
    env::remove_var(ENV_TOKEN_PATH);
    env::remove_var(ENV_UPLOAD_URL);
    env::remove_var(ENV_UPLOAD_PUBLIC_HOST);
}

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

/// A complete file is read field by field.
#[test]
#[serial]
fn test_load_config_reads_every_section() {
    clear_env();
    let file = config_file(
        r#"
table:
  input: ./inventory.csv
  output: ./out.csv
  link_column: 3
drive:
  api_base: http://localhost:9999
  token_path: /secrets/token.json
  link_pattern: view
download:
  dir: ./downloads
  extension: .png
  retry_any_status: true
  retry:
    max_attempts: 3
    initial_delay_secs: 60
    max_delay_secs: 600
    backoff_multiplier: 2.0
upload:
  url: https://upload.example/
  public_host: https://cdn.example
pacing:
  every: 10
  min_delay_secs: 1
  max_delay_secs: 2
on_listing_error: clear
http:
  timeout_secs: 30
"#,
    );

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.table.input, Some(PathBuf::from("./inventory.csv")));
    assert_eq!(config.table.output, Some(PathBuf::from("./out.csv")));
    assert_eq!(config.table.link_column, 3);
    assert_eq!(config.drive.api_base, "http://localhost:9999");
    assert_eq!(config.drive.token_path, PathBuf::from("/secrets/token.json"));
    assert_eq!(config.drive.link_pattern, Some(LinkPattern::View));
    assert_eq!(config.download.dir, PathBuf::from("./downloads"));
    assert_eq!(config.download.extension, ".png");
    assert!(config.download.retry_any_status);
    assert_eq!(config.download.retry.max_attempts, Some(3));
    assert_eq!(config.download.retry.initial_delay, Duration::from_secs(60));
    assert_eq!(config.download.retry.max_delay, Duration::from_secs(600));
    assert_eq!(config.upload.url, "https://upload.example/");
    assert_eq!(config.upload.public_host, "https://cdn.example");
    assert_eq!(config.pacing.every, 10);
    assert_eq!(config.on_listing_error, ListingFailurePolicy::Clear);
    assert_eq!(config.http.timeout(), Some(Duration::from_secs(30)));
}

/// Omitted sections fall back to the production defaults.
#[test]
#[serial]
fn test_load_config_defaults_for_minimal_file() {
    clear_env();
    let file = config_file("table:\n  input: rows.csv\n");

    let config = load_config(file.path()).expect("Config should load");

    assert_eq!(config.table.link_column, 9);
    assert_eq!(config.drive.token_path, PathBuf::from("token.json"));
    assert_eq!(config.drive.link_pattern, None);
    assert_eq!(config.download.extension, ".jpg");
    assert_eq!(config.download.retry.max_attempts, Some(8));
    assert_eq!(config.download.retry.initial_delay, Duration::from_secs(1800));
    assert_eq!(config.pacing.every, 50);
    assert_eq!(config.pacing.min_delay_secs, 10);
    assert_eq!(config.pacing.max_delay_secs, 40);
    assert_eq!(config.on_listing_error, ListingFailurePolicy::Keep);
    assert_eq!(config.http.timeout(), None);
}

#[test]
#[serial]
fn test_load_config_env_overrides_file() {
    clear_env();
    let file = config_file(
        "drive:\n  token_path: file-token.json\nupload:\n  url: https://from-file.example/\n",
    );
    env::set_var(ENV_TOKEN_PATH, "/run/secrets/token.json");
    env::set_var(ENV_UPLOAD_URL, "https://from-env.example/upload");

    let config = load_config(file.path()).expect("Config should load");
    clear_env();

    assert_eq!(config.drive.token_path, PathBuf::from("/run/secrets/token.json"));
    assert_eq!(config.upload.url, "https://from-env.example/upload");
}

#[test]
#[serial]
fn test_load_config_errors_for_invalid_yaml() {
    clear_env();
    let file = config_file("table: [unclosed");

    let err = load_config(file.path()).unwrap_err();
    assert!(
        err.to_string().contains("Failed to parse config YAML"),
        "got: {err}"
    );
}

#[test]
#[serial]
fn test_load_config_errors_for_missing_file() {
    clear_env();
    let err = load_config("/definitely/not/here/config.yaml").unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"), "got: {err}");
}

#[test]
#[serial]
fn test_load_config_rejects_inverted_pacing_range() {
    clear_env();
    let file = config_file("pacing:\n  min_delay_secs: 50\n  max_delay_secs: 10\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("pacing.min_delay_secs"), "got: {err}");
}

#[test]
#[serial]
fn test_load_config_rejects_zero_attempts() {
    clear_env();
    let file = config_file("download:\n  retry:\n    max_attempts: 0\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_attempts"), "got: {err}");
}

#[test]
fn test_parse_config_allows_unbounded_retries() {
    let config = parse_config("download:\n  retry:\n    max_attempts: null\n").unwrap();
    assert_eq!(config.download.retry.max_attempts, None);
}

#[test]
fn test_parse_config_empty_document_is_default() {
    let config = parse_config("   \n").unwrap();
    assert_eq!(config, drive_relink::config::Config::default());
}

#[test]
#[serial]
fn test_load_config_rejects_non_finite_multiplier() {
    clear_env();
    for value in [".inf", "-.inf", ".nan", "0.5"] {
        let file = config_file(&format!(
            "download:\n  retry:\n    max_attempts: 3\n    backoff_multiplier: {value}\n"
        ));
        assert!(load_config(file.path()).is_err(), "multiplier {value} must be rejected");
    }
}

#[test]
#[serial]
fn test_load_config_rejects_oversized_max_delay() {
    clear_env();
    let file = config_file("download:\n  retry:\n    max_delay_secs: 18446744073709551615\n");

    let err = load_config(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_delay_secs"), "got: {err}");
}

#[test]
fn test_validate_accepts_large_but_finite_multiplier() {
    let config = parse_config("download:\n  retry:\n    backoff_multiplier: 1.0e300\n").unwrap();
    drive_relink::load_config::validate(&config).unwrap();
}
