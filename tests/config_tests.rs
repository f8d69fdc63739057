//! Unit tests for configuration and request validation.

use std::fs;

use rstest::*;
use tempfile::TempDir;
use vastrent::config::ConfigError;
use vastrent::rental::EnvParseError;
use vastrent::test_support::EnvGuard;
use vastrent::{MarketplaceConfig, RentalConfig, RentalConfigError, SortOrder, ValidationError};

#[fixture]
fn valid_config() -> MarketplaceConfig {
    MarketplaceConfig {
        api_key: String::from("0123456789abcdef"),
        server_url: String::from("https://console.vast.ai"),
        request_timeout_secs: 30,
    }
}

#[rstest]
fn config_validation_rejects_missing_api_key_with_actionable_error(
    valid_config: MarketplaceConfig,
) {
    let cfg = MarketplaceConfig {
        api_key: String::new(),
        ..valid_config
    };

    let error = cfg.validate().expect_err("API key is required");
    let ConfigError::MissingField(ref message) = error else {
        panic!("expected MissingField error");
    };
    assert!(
        message.contains("VAST_API_KEY"),
        "error should mention env var: {message}"
    );
    assert!(
        message.contains("vastrent.toml"),
        "error should mention config file: {message}"
    );
    assert!(
        message.contains("api_key"),
        "error should mention TOML key: {message}"
    );
}

#[rstest]
fn config_validation_rejects_non_http_server_url(valid_config: MarketplaceConfig) {
    let cfg = MarketplaceConfig {
        server_url: String::from("ftp://console.vast.ai"),
        ..valid_config
    };

    let error = cfg.validate().expect_err("scheme should be rejected");
    assert!(matches!(error, ConfigError::InvalidField(_)), "got {error}");
}

#[rstest]
fn config_validation_rejects_zero_timeout(valid_config: MarketplaceConfig) {
    let cfg = MarketplaceConfig {
        request_timeout_secs: 0,
        ..valid_config
    };

    assert!(cfg.validate().is_err());
}

#[rstest]
fn valid_config_passes(valid_config: MarketplaceConfig) {
    assert_eq!(valid_config.validate(), Ok(()));
}

#[rstest]
fn rental_defaults_are_valid() {
    let cfg = RentalConfig::default();

    assert_eq!(cfg.validate(), Ok(()));
    let criteria = cfg.search_criteria().expect("defaults should build");
    assert_eq!(criteria.gpu_count, 1);
    assert_eq!(criteria.sort_order, SortOrder::PriceAsc);
    assert!(!criteria.external_allowed);
}

#[rstest]
#[case::zero_gpus(RentalConfig { gpu_count: 0, ..RentalConfig::default() }, "gpu_count")]
#[case::zero_disk(RentalConfig { disk_gb: 0, ..RentalConfig::default() }, "disk_gb")]
#[case::reliability(RentalConfig { min_reliability: 1.5, ..RentalConfig::default() }, "min_reliability")]
#[case::negative_min_bid(RentalConfig { min_bid_price: -0.01, ..RentalConfig::default() }, "min_bid_price")]
#[case::negative_bid(RentalConfig { bid_price: Some(-1.0), ..RentalConfig::default() }, "bid_price")]
fn rental_validation_names_the_field(#[case] cfg: RentalConfig, #[case] field: &str) {
    let error = cfg.validate().expect_err("value should be rejected");

    let RentalConfigError::Invalid(ValidationError::Invalid { field: ref actual, .. }) = error
    else {
        panic!("expected invalid field error, got {error}");
    };
    assert_eq!(actual, field);
}

#[rstest]
fn rental_validation_rejects_blank_image() {
    let cfg = RentalConfig {
        image: String::from("   "),
        ..RentalConfig::default()
    };

    assert_eq!(
        cfg.validate(),
        Err(RentalConfigError::Invalid(ValidationError::Missing(
            String::from("image")
        )))
    );
}

#[rstest]
fn rental_validation_rejects_malformed_env_entries() {
    let cfg = RentalConfig {
        env_vars: Some(String::from("GOOD=1,BROKEN")),
        ..RentalConfig::default()
    };

    assert_eq!(
        cfg.validate(),
        Err(RentalConfigError::Env(EnvParseError::MissingSeparator(
            String::from("BROKEN")
        )))
    );
}

#[rstest]
fn rental_validation_rejects_unknown_strategy() {
    let cfg = RentalConfig {
        strategy: String::from("luckiest"),
        ..RentalConfig::default()
    };

    let error = cfg.validate().expect_err("strategy should be rejected");
    assert!(
        error.to_string().contains("cheapest or best-value"),
        "unexpected error: {error}"
    );
}

#[tokio::test]
async fn rental_config_reads_environment_overrides() {
    let _guard = EnvGuard::set_vars(&[
        ("VASTRENT_GPU_COUNT", "2"),
        ("VASTRENT_IMAGE", "nvidia/cuda:12.2.0-runtime-ubuntu22.04"),
        ("VASTRENT_MAX_ATTEMPTS", "3"),
    ])
    .await;

    let cfg = RentalConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.gpu_count, 2);
    assert_eq!(cfg.image, "nvidia/cuda:12.2.0-runtime-ubuntu22.04");
    assert_eq!(cfg.max_attempts, 3);
    assert_eq!(cfg.disk_gb, RentalConfig::default().disk_gb);
}

#[tokio::test]
async fn rental_config_reads_explicit_config_file() {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("tempdir: {err}"));
    let path = tmp.path().join("vastrent.toml");
    fs::write(
        &path,
        "disk_gb = 40\nstrategy = \"best-value\"\nlabel = \"nightly\"\n",
    )
    .unwrap_or_else(|err| panic!("write config file: {err}"));
    let path_str = path
        .to_str()
        .unwrap_or_else(|| panic!("temp path should be utf8: {}", path.display()))
        .to_owned();
    let _guard = EnvGuard::set_vars(&[("VASTRENT_CONFIG_PATH", path_str.as_str())]).await;

    let cfg = RentalConfig::load_without_cli_args().expect("config should load");

    assert_eq!(cfg.disk_gb, 40);
    assert_eq!(cfg.strategy, "best-value");
    assert_eq!(cfg.label.as_deref(), Some("nightly"));
}
