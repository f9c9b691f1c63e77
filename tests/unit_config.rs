use std::fs;

use chrono::Duration;
use duetask::config::{Config, CONFIG_FILE};

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_dir(dir.path());

    let timings = config.alarm_timings();
    assert_eq!(timings.sweep_interval, Duration::seconds(30));
    assert_eq!(timings.window, Duration::seconds(60));
    assert_eq!(timings.grace, Duration::seconds(60));
    assert!(config.notifications.desktop);
    assert_eq!(config.notifications.banner_duration_ms, 5000);
    assert_eq!(config.notifications.info_duration_ms, 3000);
    assert_eq!(config.watch.reload_debounce_ms, 200);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[alarms]
sweep_interval = "10s"
window = "2m"
grace = "5m"

[notifications]
desktop = false
banner_duration_ms = 8000

[watch]
reload_debounce_ms = 50
"#;
    fs::write(dir.path().join(CONFIG_FILE), toml)?;

    let config = Config::load(&dir.path().join(CONFIG_FILE))?;
    let timings = config.alarm_timings();
    assert_eq!(timings.sweep_interval, Duration::seconds(10));
    assert_eq!(timings.window, Duration::minutes(2));
    assert_eq!(timings.grace, Duration::minutes(5));
    assert!(!config.notifications.desktop);
    assert_eq!(config.notifications.banner_duration_ms, 8000);
    assert_eq!(config.notifications.info_duration_ms, 3000);
    assert_eq!(config.watch.reload_debounce_ms, 50);
    Ok(())
}

#[test]
fn sweep_must_be_shorter_than_window() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(CONFIG_FILE);
    fs::write(&path, "[alarms]\nsweep_interval = \"60s\"\nwindow = \"60s\"\n")?;

    let err = Config::load(&path).expect_err("sweep >= window rejected");
    assert_eq!(err.exit_code(), 2);

    let fallback = Config::load_from_dir(dir.path());
    assert_eq!(fallback.alarm_timings().sweep_interval, Duration::seconds(30));
    Ok(())
}
