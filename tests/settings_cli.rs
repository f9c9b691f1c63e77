mod support;

use chrono::{DateTime, Duration, Utc};
use predicates::prelude::*;
use predicates::str::contains;

use support::DataDir;

#[test]
fn settings_show_defaults() {
    let data = DataDir::new();
    let value = data.json(&["settings", "show"]);

    assert_eq!(value["command"], "settings show");
    assert_eq!(value["data"]["delete_delay_hours"], 12.0);
    assert_eq!(value["data"]["color_theme"], "blue");
    assert_eq!(value["data"]["dark_mode"], false);
    assert_eq!(value["data"]["alarm"]["sound_type"], "beep");
    assert_eq!(value["data"]["alarm"]["built_in_sound"], "bell");
    assert_eq!(value["data"]["alarm"]["volume"], 0.7);
}

#[test]
fn settings_set_persists() {
    let data = DataDir::new();
    let value = data.json(&[
        "settings",
        "set",
        "--delete-delay-hours",
        "2",
        "--theme",
        "green",
        "--dark-mode",
        "true",
        "--sound",
        "built-in",
        "--built-in-sound",
        "chime",
        "--volume",
        "0.25",
    ]);
    assert_eq!(value["data"]["delete_delay_hours"], 2.0);

    let stored = data.read_json("settings.json");
    assert_eq!(stored["color_theme"], "green");
    assert_eq!(stored["dark_mode"], true);
    assert_eq!(stored["alarm"]["sound_type"], "built_in");
    assert_eq!(stored["alarm"]["built_in_sound"], "chime");
    assert_eq!(stored["alarm"]["volume"], 0.25);

    let shown = data.json(&["settings", "show"]);
    assert_eq!(shown["data"]["delete_delay_hours"], 2.0);
}

#[test]
fn settings_set_rejects_invalid_values() {
    let data = DataDir::new();

    data.cmd()
        .args(["settings", "set", "--volume", "1.5"])
        .assert()
        .code(2)
        .stderr(contains("volume"));
    data.cmd()
        .args(["settings", "set", "--delete-delay-hours", "0"])
        .assert()
        .code(2);
    data.cmd()
        .args(["settings", "set", "--theme", "teal"])
        .assert()
        .code(2);
    data.cmd()
        .args(["settings", "set", "--sound", "custom"])
        .assert()
        .code(2)
        .stderr(contains("sound file"));
    data.cmd().args(["settings", "set"]).assert().code(2);

    assert!(!data.file("settings.json").exists());
}

#[test]
fn corrupt_settings_fall_back_to_defaults() {
    let data = DataDir::new();
    data.write("settings.json", r#"{"delete_delay_hours": -4}"#);

    let value = data.json(&["settings", "show"]);
    assert_eq!(value["data"]["delete_delay_hours"], 12.0);
}

#[test]
fn delay_change_applies_on_next_start() {
    let data = DataDir::new();
    let id = data.add(&["Laundry"]);
    data.json(&["toggle", &id]);

    let value = data.json(&["settings", "set", "--delete-delay-hours", "1"]);
    assert!(value["warnings"][0]
        .as_str()
        .expect("warning")
        .contains("until it restarts"));

    let shown = data.json(&["show", &id]);
    let completed_at: DateTime<Utc> =
        serde_json::from_value(shown["data"]["completed_at"].clone()).expect("completed_at");
    let delete_at: DateTime<Utc> =
        serde_json::from_value(shown["data"]["delete_at"].clone()).expect("delete_at");
    assert_eq!(delete_at - completed_at, Duration::hours(1));
}

#[test]
fn oversized_delete_delay_is_rejected_and_recoverable() {
    let data = DataDir::new();
    let id = data.add(&["Pay rent"]);
    data.json(&["toggle", &id]);

    data.cmd()
        .args(["settings", "set", "--delete-delay-hours", "1e12"])
        .assert()
        .code(2)
        .stderr(contains("at most"));
    assert!(!data.file("settings.json").exists());

    // A value written by hand loads as defaults instead of breaking startup.
    data.write("settings.json", r#"{"delete_delay_hours": 1e12}"#);
    let list = data.json(&["list"]);
    assert_eq!(list["data"]["tasks"][0]["id"], id.as_str());
    let completed_at: DateTime<Utc> =
        serde_json::from_value(list["data"]["tasks"][0]["completed_at"].clone())
            .expect("completed_at");
    let delete_at: DateTime<Utc> =
        serde_json::from_value(list["data"]["tasks"][0]["delete_at"].clone())
            .expect("delete_at");
    assert_eq!(delete_at - completed_at, Duration::hours(12));

    let fixed = data.json(&["settings", "set", "--delete-delay-hours", "24"]);
    assert_eq!(fixed["data"]["delete_delay_hours"], 24.0);
}

#[test]
fn test_sound_plays_saved_settings() {
    let data = DataDir::new();
    let assert = data
        .cmd()
        .args(["--json", "settings", "test-sound"])
        .assert()
        .success()
        .stderr(contains("\u{7}"));
    let value: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("json envelope");

    assert_eq!(value["command"], "settings test-sound");
    assert_eq!(value["data"]["sound_type"], "beep");
    assert_eq!(value["data"]["played"], true);
    assert_eq!(value["data"]["saved"], true);
}

#[test]
fn test_sound_previews_without_saving() {
    let data = DataDir::new();
    let value = data.json(&[
        "settings",
        "test-sound",
        "--sound",
        "built-in",
        "--built-in-sound",
        "chime",
        "--volume",
        "0.3",
    ]);
    assert_eq!(value["data"]["sound_type"], "built_in");
    assert_eq!(value["data"]["built_in_sound"], "chime");
    assert_eq!(value["data"]["volume"], 0.3);
    assert_eq!(value["data"]["saved"], false);
    assert!(!data.file("settings.json").exists());

    let shown = data.json(&["settings", "show"]);
    assert_eq!(shown["data"]["alarm"]["sound_type"], "beep");
}

#[test]
fn test_sound_at_zero_volume_is_silent() {
    let data = DataDir::new();
    data.json(&["settings", "set", "--volume", "0"]);
    let value = data.json(&["settings", "test-sound"]);
    assert_eq!(value["data"]["played"], false);

    data.cmd()
        .args(["settings", "test-sound"])
        .assert()
        .success()
        .stdout(contains("nothing played"))
        .stderr(contains("\u{7}").not());
}

#[test]
fn test_sound_reports_missing_custom_file() {
    let data = DataDir::new();
    let missing = data.file("missing.wav");
    data.cmd()
        .args(["settings", "test-sound", "--custom-sound"])
        .arg(&missing)
        .assert()
        .code(4)
        .stderr(contains("not found"));
}
