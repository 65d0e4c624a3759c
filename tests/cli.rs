//! 命令行集成测试

use assert_cmd::Command;

fn command(dir: &tempfile::TempDir) -> Command {
    let mut cmd = Command::cargo_bin("auto-translate").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("DEEPSEEK_API_KEY")
        .env_remove("FORCE_TRANSLATE")
        .env_remove("AUTO_TRANSLATE_LOG_LEVEL");
    cmd
}

#[test]
fn test_help_lists_flags() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--force", "--fast", "--careful", "--cleanup-only", "--previous-rev"] {
        assert!(stdout.contains(flag), "help should mention {}", flag);
    }
}

#[test]
fn test_missing_api_key_exits_with_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DEEPSEEK_API_KEY"));
}

#[test]
fn test_cleanup_only_does_not_need_api_key() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets/pack/lang");
    let translate = dir.path().join("translate/pack/lang");
    std::fs::create_dir_all(&assets).unwrap();
    std::fs::create_dir_all(&translate).unwrap();
    std::fs::write(assets.join("en_us.json"), r#"{"a": "Alpha"}"#).unwrap();
    std::fs::write(translate.join("zh_cn.json"), r#"{"a": "甲", "old": "旧"}"#).unwrap();

    let output = command(&dir)
        .args(["--cleanup-only", "--assets-dir", "assets", "--translate-dir", "translate"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let cleaned = std::fs::read_to_string(translate.join("zh_cn.json")).unwrap();
    assert!(cleaned.contains("\"a\""));
    assert!(!cleaned.contains("\"old\""));
}

#[test]
fn test_conflicting_model_flags_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = command(&dir).args(["--fast", "--careful"]).output().unwrap();
    assert!(!output.status.success());
}
