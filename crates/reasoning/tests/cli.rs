use assert_cmd::prelude::*;
use assert_fs::prelude::*;

use predicates::prelude::*;
use predicates::str::contains;
use serial_test::serial;
use std::process::Command;

use reasoning::model::{Provenance, ReasoningChain, Record};
use reasoning::store::{MemoryStore, VectorStore};

/// Helper to create a Command for the `reasoning` binary with a throwaway memory store
/// and no credentials.
fn reasoning_cmd(store_dir: &assert_fs::TempDir) -> Command {
  let mut cmd = Command::cargo_bin("reasoning").expect("binary exists");
  cmd
    .env("REASONING_STORE_BACKEND", "memory")
    .env("REASONING_STORE_PATH", store_dir.path())
    .env("REASONING_API_BASE_URL", "http://127.0.0.1:9")
    .env("NO_COLOR", "1")
    .env_remove("REASONING_CONFIG")
    .env_remove("RUST_LOG")
    .env_remove("REASONING_API_KEY")
    .env_remove("DASHSCOPE_API_KEY")
    .env_remove("OPENAI_API_KEY");
  cmd
}

const CHAIN_LINE: &str = r#"{"paper_id": "W1", "title": "Stress and neurogenesis", "problem_decomposition": "p", "data": "d", "method": "m", "conclusion": "c"}"#;

#[test]
#[serial]
fn test_help_lists_commands() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp)
    .arg("--help")
    .assert()
    .success()
    .stdout(contains("generate").and(contains("index")).and(contains("count")));
}

#[test]
#[serial]
fn test_count_on_empty_store() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp).arg("count").assert().success().stdout("0\n");
}

#[test]
#[serial]
fn test_generate_without_api_key_reports_auth_error() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp)
    .args(["generate", "How does chronic stress affect hippocampal neurogenesis?", "--json"])
    .assert()
    .failure()
    .code(1)
    .stdout(
      contains(r#""status": "error""#)
        .and(contains(r#""error_kind": "auth_error""#))
        .and(contains(r#""stage": "retrieving""#)),
    );
}

#[test]
#[serial]
fn test_generate_failure_is_rendered_for_humans() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp)
    .args(["generate", "Does sleep consolidate memory?"])
    .assert()
    .failure()
    .stderr(contains("Generation failed while retrieving").and(contains("auth_error")));
}

#[test]
#[serial]
fn test_interactive_session_answers_until_quit() {
  let temp = assert_fs::TempDir::new().unwrap();

  assert_cmd::Command::from_std(reasoning_cmd(&temp))
    .args(["generate", "--interactive", "--json"])
    .write_stdin("Does sleep consolidate memory?\n\nquit\nHow does dopamine encode reward?\n")
    .assert()
    .success()
    .stdout(contains(r#""error_kind": "auth_error""#).count(1))
    .stderr(contains("questions asked this session: 1"));
}

#[test]
#[serial]
fn test_interactive_session_ends_at_end_of_input() {
  let temp = assert_fs::TempDir::new().unwrap();

  assert_cmd::Command::from_std(reasoning_cmd(&temp))
    .args(["generate", "-i"])
    .write_stdin("Does sleep consolidate memory?\nHow does dopamine encode reward?")
    .assert()
    .success()
    .stderr(contains("Generation failed while retrieving").count(2));
}

#[test]
#[serial]
fn test_generate_needs_question_or_interactive() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp).arg("generate").assert().failure().code(2);
}

#[test]
#[serial]
fn test_generate_rejects_out_of_range_temperature() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp)
    .args(["generate", "Does sleep consolidate memory?", "--temperature", "1.5"])
    .assert()
    .failure()
    .stderr(contains("temperature must be within [0, 1]"));
}

#[test]
#[serial]
fn test_index_missing_corpus_fails() {
  let temp = assert_fs::TempDir::new().unwrap();

  reasoning_cmd(&temp)
    .args(["index", "does-not-exist.jsonl"])
    .assert()
    .failure()
    .stderr(contains("cannot open"));
}

#[test]
#[serial]
fn test_index_reports_malformed_line() {
  let temp = assert_fs::TempDir::new().unwrap();
  let corpus = temp.child("corpus.jsonl");
  corpus.write_str(&format!("{CHAIN_LINE}\nnot json\n")).unwrap();

  reasoning_cmd(&temp)
    .args(["index"])
    .arg(corpus.path())
    .assert()
    .failure()
    .stderr(contains("line 2"));
}

#[test]
#[serial]
fn test_index_without_api_key_stores_nothing() {
  let temp = assert_fs::TempDir::new().unwrap();
  let corpus = temp.child("corpus.jsonl");
  corpus.write_str(&format!("{CHAIN_LINE}\n")).unwrap();

  reasoning_cmd(&temp)
    .args(["index"])
    .arg(corpus.path())
    .assert()
    .failure()
    .stderr(contains("authentication failed"));

  reasoning_cmd(&temp).arg("count").assert().success().stdout("0\n");
}

/// Write a one-record store where the memory backend looks for it.
fn seed_store(store_dir: &assert_fs::TempDir) {
  let runtime = tokio::runtime::Runtime::new().unwrap();
  runtime.block_on(async {
    let mut store = MemoryStore::open(store_dir.path().join("neuroscience.json")).unwrap();
    let record = Record {
      id: "W0".to_string(),
      summary_text: Record::summary_for("Existing study", "p"),
      full_payload: ReasoningChain {
        problem_decomposition: "p".to_string(),
        data: "d".to_string(),
        method: "m".to_string(),
        conclusion: "c".to_string(),
      },
      provenance: Provenance { title: "Existing study".to_string(), ..Provenance::default() },
    };
    store.upsert(vec![1.0, 0.0], record).await.unwrap();
    store.persist().await.unwrap();
  });
}

#[test]
#[serial]
fn test_failed_reset_keeps_existing_store() {
  let temp = assert_fs::TempDir::new().unwrap();
  seed_store(&temp);
  let corpus = temp.child("corpus.jsonl");
  corpus.write_str(&format!("{CHAIN_LINE}\n")).unwrap();

  reasoning_cmd(&temp).arg("count").assert().success().stdout("1\n");

  reasoning_cmd(&temp)
    .args(["index", "--reset"])
    .arg(corpus.path())
    .assert()
    .failure()
    .stderr(contains("authentication failed"));

  reasoning_cmd(&temp).arg("count").assert().success().stdout("1\n");
}

#[test]
#[serial]
fn test_malformed_config_file_is_rejected() {
  let temp = assert_fs::TempDir::new().unwrap();
  let config = temp.child("config.yaml");
  config.write_str("temperature: [not, a, number]\n").unwrap();

  reasoning_cmd(&temp).arg("--config").arg(config.path()).arg("count").assert().failure();
}
