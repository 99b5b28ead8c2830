use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn chatprep_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("chatprep");
    path
}

/// A direct-message export with two conversations six hours apart.
const DM_EXPORT: &str = r#"[
  {"name": "Ada", "role": "user", "timestamp": "2019-07-04T18:00:00.000+00:00", "content": "are you coming tonight"},
  {"name": "Ada", "role": "user", "timestamp": "2019-07-04T18:00:30.000+00:00", "content": "fireworks at 9"},
  {"name": "Me", "role": "assistant", "timestamp": "2019-07-04T18:05:00.000+00:00", "content": "yes"},
  {"name": "Me", "role": "assistant", "timestamp": "2019-07-04T18:05:10.000+00:00", "content": "bringing snacks"},
  {"name": "Me", "role": "assistant", "timestamp": "2019-07-05T00:30:00.000+00:00", "content": "that was fun"},
  {"name": "Ada", "role": "user", "timestamp": "2019-07-05T09:00:00.000+00:00", "content": "morning"},
  {"name": "Me", "role": "assistant", "timestamp": "2019-07-05T09:10:00Z", "content": "morning!"}
]"#;

/// A three-person group chat.
const GROUP_EXPORT: &str = r#"[
  {"name": "Bob", "role": "user", "timestamp": "2020-02-01T12:00:00Z", "content": "lunch?"},
  {"name": "Cy", "role": "user", "timestamp": "2020-02-01T12:01:00Z", "content": "tacos"},
  {"name": "Me", "role": "assistant", "timestamp": "2020-02-01T12:02:00Z", "content": "in"}
]"#;

fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let chat_dir = root.join("data/1-normalized/chat");
    fs::create_dir_all(chat_dir.join("slack")).unwrap();
    fs::write(chat_dir.join("ada.json"), DM_EXPORT).unwrap();
    fs::write(chat_dir.join("slack/lunch.json"), GROUP_EXPORT).unwrap();

    let text_dir = root.join("data/1-normalized/text");
    fs::create_dir_all(&text_dir).unwrap();
    fs::write(
        text_dir.join("journal.md"),
        "Went hiking today.\n\nFinished the book.\nCalled mom.\n",
    )
    .unwrap();

    let config_content = format!(
        r#"[paths]
root = "{}/data"

[grouping]
time_threshold_minutes = 120
consecutive_user_limit = 20
name_prefix = "auto"

[staging]
valid_every = 10

{}
"#,
        root.display(),
        extra_config
    );

    let config_path = config_dir.join("chatprep.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_chatprep(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = chatprep_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .arg("--progress")
        .arg("off")
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run chatprep binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn staged_lines(tmp: &TempDir, rel: &str) -> Vec<serde_json::Value> {
    let body = fs::read_to_string(tmp.path().join(rel)).unwrap();
    body.lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn test_init_creates_layout() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_chatprep(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/3-training").is_dir());
    assert!(tmp.path().join("data/0-raw/email").is_dir());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env("");

    let (_, _, success1) = run_chatprep(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (stdout2, _, success2) = run_chatprep(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
    assert!(stdout2.contains("(0 new)"));
}

#[test]
fn test_stage_chat() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_chatprep(&config_path, &["stage", "chat"]);
    assert!(success, "stage failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("files: 2"));
    assert!(stdout.contains("blocks: 3"));
    assert!(stdout.contains("ok"));

    let blocks = staged_lines(&tmp, "data/2-staging/chat/train.jsonl");
    assert_eq!(blocks.len(), 3);

    // ada.json sorts first; consecutive messages merged, late reply dropped.
    let first = &blocks[0]["messages"];
    assert_eq!(first[0]["role"], "user");
    assert_eq!(first[0]["content"], "are you coming tonight. fireworks at 9");
    assert_eq!(first[1]["content"], "yes. bringing snacks");
    assert_eq!(first.as_array().unwrap().len(), 2);

    let second = &blocks[1]["messages"];
    assert_eq!(second[0]["content"], "morning");

    // Group chat gets sender prefixes.
    let third = &blocks[2]["messages"];
    assert_eq!(third[0]["content"], "Bob said: lunch?. Cy said: tacos");
    assert!(third[0].get("name").is_none());
}

#[test]
fn test_stage_chat_direct_messages_only() {
    let (tmp, config_path) = setup_test_env("");
    let config = fs::read_to_string(&config_path)
        .unwrap()
        .replace("name_prefix = \"auto\"", "name_prefix = \"auto\"\ndirect_messages_only = true");
    fs::write(&config_path, config).unwrap();

    let (stdout, _, success) = run_chatprep(&config_path, &["stage", "chat"]);
    assert!(success);
    assert!(stdout.contains("blocks: 2"));
    let blocks = staged_lines(&tmp, "data/2-staging/chat/train.jsonl");
    assert_eq!(blocks.len(), 2);
}

#[test]
fn test_stage_chat_dry_run() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_chatprep(&config_path, &["stage", "chat", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("blocks: 3"));
    assert!(!tmp.path().join("data/2-staging/chat/train.jsonl").exists());
}

#[test]
fn test_stage_skips_malformed_files() {
    let (tmp, config_path) = setup_test_env("");
    fs::write(
        tmp.path().join("data/1-normalized/chat/broken.json"),
        "{\"messages\": 3}",
    )
    .unwrap();

    let (stdout, stderr, success) = run_chatprep(&config_path, &["stage", "chat"]);
    assert!(success, "stage failed: stderr={}", stderr);
    assert!(stdout.contains("skipped files: 1"));
    assert!(stdout.contains("blocks: 3"));
}

#[test]
fn test_stage_text() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, _, success) = run_chatprep(&config_path, &["stage", "text"]);
    assert!(success);
    assert!(stdout.contains("records read: 3"));
    let records = staged_lines(&tmp, "data/2-staging/text/train.jsonl");
    assert_eq!(records.len(), 3);
    assert_eq!(records[1]["text"], "Finished the book.");
}

#[test]
fn test_stage_unknown_kind_fails() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, stderr, success) = run_chatprep(&config_path, &["stage", "email"]);
    assert!(!success);
    assert!(stderr.contains("Unknown stage kind"));
}

#[test]
fn test_train_chat_format() {
    let (tmp, config_path) = setup_test_env(
        r#"[training]
format = "chat"
system_prompt = "You are me."
assistant_prefix = "Meow! "
"#,
    );

    run_chatprep(&config_path, &["stage", "chat"]);
    let (stdout, stderr, success) = run_chatprep(&config_path, &["train"]);
    assert!(success, "train failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("ok"));

    let lines = staged_lines(&tmp, "data/3-training/train.jsonl");
    assert_eq!(lines.len(), 3);
    let msgs = &lines[0]["messages"];
    assert_eq!(msgs[0]["role"], "system");
    assert_eq!(msgs[0]["content"], "You are me.");
    assert_eq!(msgs[2]["content"], "Meow! yes. bringing snacks");
    assert!(tmp.path().join("data/3-training/valid.jsonl").exists());
}

#[test]
fn test_train_instruct_override() {
    let (tmp, config_path) = setup_test_env("");

    run_chatprep(&config_path, &["stage", "chat"]);
    let (_, stderr, success) = run_chatprep(&config_path, &["train", "--format", "instruct"]);
    assert!(success, "train failed: {}", stderr);

    let lines = staged_lines(&tmp, "data/3-training/train.jsonl");
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["text"], "<s>[INST] morning [/INST] morning! </s>");
}

#[test]
fn test_preview_prints_blocks() {
    let (tmp, config_path) = setup_test_env("");
    let file = tmp.path().join("data/1-normalized/chat/ada.json");

    let (stdout, _, success) = run_chatprep(&config_path, &["preview", file.to_str().unwrap()]);
    assert!(success);
    assert_eq!(stdout.lines().count(), 2);
    assert!(stdout.contains("\"content\":\"morning!\""));
}

#[test]
fn test_stats_after_stage() {
    let (_tmp, config_path) = setup_test_env("");

    run_chatprep(&config_path, &["stage", "chat"]);
    let (stdout, _, success) = run_chatprep(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("train.jsonl"));
    assert!(stdout.contains("BLOCKS"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_chatprep(&tmp.path().join("nope.toml"), &["stats"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
