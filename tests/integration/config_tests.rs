use std::path::Path;

use clap::Parser;
use figment::Jail;
use trackdupe::cli::{Cli, Commands};
use trackdupe::config::{Config, ConfigError, ConfigOverrides};
use trackdupe::fingerprint::Algorithm;

fn scan_overrides(argv: &[&str]) -> ConfigOverrides {
    match Cli::try_parse_from(argv).unwrap().command {
        Commands::Scan(args) => args.overrides(),
        other => panic!("expected scan, got {other:?}"),
    }
}

#[test]
fn test_cli_flags_beat_file_and_environment() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "trackdupe.toml",
            r#"
                algorithms = ["spectral"]
                batch_size = 50
                resume = true
                extensions = ["flac"]
                ignore_patterns = ["Podcasts/**"]
            "#,
        )?;
        jail.set_env("TRACKDUPE_BATCH_SIZE", "25");
        jail.set_env("TRACKDUPE_SKIP_HIDDEN", "true");

        let overrides = scan_overrides(&["trackdupe", "scan", "/music", "-a", "byte_hash", "--no-resume"]);
        let config = Config::load(Some(Path::new("trackdupe.toml")), &overrides).map_err(|e| e.to_string())?;

        assert_eq!(config.algorithms, vec![Algorithm::ByteHash]);
        assert_eq!(config.batch_size, 25);
        assert!(!config.resume);
        assert!(config.skip_hidden);

        let options = config.scan_options(config.algorithms.clone());
        assert_eq!(options.walker.extensions, vec!["flac"]);
        assert_eq!(options.walker.ignore_patterns, vec!["Podcasts/**"]);
        assert!(!options.resume);
        Ok(())
    });
}

#[test]
fn test_unset_flags_keep_file_values() {
    Jail::expect_with(|jail| {
        jail.create_file("trackdupe.toml", "keep_checkpoint = true\ncheckpoint_interval = 3")?;

        let overrides = scan_overrides(&["trackdupe", "scan", "/music"]);
        let config = Config::load(Some(Path::new("trackdupe.toml")), &overrides).map_err(|e| e.to_string())?;

        assert!(config.keep_checkpoint);
        assert_eq!(config.checkpoint_interval, 3);
        assert!(config.resume);
        Ok(())
    });
}

#[test]
fn test_zero_from_cli_is_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("trackdupe.toml", "")?;
        let overrides = scan_overrides(&["trackdupe", "scan", "/music", "--workers", "0"]);
        let result = Config::load(Some(Path::new("trackdupe.toml")), &overrides);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
        Ok(())
    });
}

#[test]
fn test_timeout_flag_reaches_fingerprint_options() {
    Jail::expect_with(|jail| {
        jail.create_file("trackdupe.toml", "window_secs = 12.5")?;
        let overrides = scan_overrides(&["trackdupe", "scan", "/music", "--timeout", "5"]);
        let config = Config::load(Some(Path::new("trackdupe.toml")), &overrides).map_err(|e| e.to_string())?;

        let options = config.fingerprint_options();
        assert_eq!(options.timeout.as_secs(), 5);
        assert!((options.window_secs - 12.5).abs() < f64::EPSILON);
        Ok(())
    });
}
