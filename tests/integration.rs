use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn xl_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("xl");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let site = root.join("site");
    fs::create_dir_all(site.join("guides")).unwrap();
    fs::create_dir_all(site.join("drafts")).unwrap();
    fs::write(
        site.join("guides/ownership.html"),
        "<html><head><title>Rust Ownership</title></head><body>\
         <h1>Ownership</h1><p>Rust ownership rules and the borrow checker.</p>\
         <p>Lifetimes tie references to their owners.</p></body></html>",
    )
    .unwrap();
    fs::write(
        site.join("guides/borrowing.html"),
        "<html><head><title>Borrowing</title></head><body>\
         <p>The borrow checker enforces rust references and ownership.</p></body></html>",
    )
    .unwrap();
    fs::write(
        site.join("guides/lifetimes.html"),
        "<html><head><title>Lifetimes</title></head><body>\
         <p>Rust lifetimes annotate references so the borrow checker can verify them.</p>\
         </body></html>",
    )
    .unwrap();
    fs::write(
        site.join("cooking.html"),
        "<html><head><title>Cooking</title><style>p { color: red }</style></head><body>\
         <p>Pasta with tomato and basil.</p></body></html>",
    )
    .unwrap();
    fs::write(
        site.join("drafts/unfinished.html"),
        "<html><body><p>rust ownership draft notes</p></body></html>",
    )
    .unwrap();
    fs::write(site.join("notes.txt"), "not markup").unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/xl.sqlite"

[content]
root = "{}/site"

[linking]
outbound_budget = 2
min_relevance = 0.01

[authority]
damping = 0.85
"#,
        root.display(),
        root.display()
    );

    let config_path = config_dir.join("xl.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_xl(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = xl_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run xl binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

fn init_and_sync(config_path: &Path) {
    let (_, stderr, success) = run_xl(config_path, &["init"]);
    assert!(success, "init failed: {}", stderr);
    let (stdout, stderr, success) = run_xl(config_path, &["sync", "--progress", "off"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_xl(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_xl(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_xl(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_sync_indexes_html_only() {
    let (_tmp, config_path) = setup_test_env();

    run_xl(&config_path, &["init"]);
    let (stdout, stderr, success) = run_xl(&config_path, &["sync", "--progress", "off"]);
    assert!(success, "sync failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("scanned: 5 documents"));
    assert!(stdout.contains("5 created"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_sync_twice_is_unchanged() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, _, success) = run_xl(&config_path, &["sync", "--progress", "off"]);
    assert!(success);
    assert!(stdout.contains("0 created, 0 updated, 0 metadata, 5 unchanged"));
    assert!(stdout.contains("relinked: 0"));
}

#[test]
fn test_sync_progress_json_on_stderr() {
    let (_tmp, config_path) = setup_test_env();
    run_xl(&config_path, &["init"]);

    let (stdout, stderr, success) = run_xl(&config_path, &["sync", "--progress", "json"]);
    assert!(success);
    assert!(stderr.contains("\"phase\":\"indexing\""));
    assert!(!stdout.contains("\"event\""));
}

#[test]
fn test_search_keyword() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, stderr, success) = run_xl(&config_path, &["search", "borrow checker"]);
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("1. ["));
    assert!(stdout.contains("guides/borrowing.html"));
    // Drafts are never search results.
    assert!(!stdout.contains("drafts/unfinished.html"));
}

#[test]
fn test_search_no_results() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, _, success) = run_xl(&config_path, &["search", "xyznonexistent"]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_candidates_exclude_self_and_unrelated() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, stderr, success) =
        run_xl(&config_path, &["candidates", "guides/ownership.html"]);
    assert!(success, "candidates failed: {}", stderr);
    assert!(!stdout.contains("-> guides/ownership.html"));
    assert!(!stdout.contains("cooking.html"));
}

#[test]
fn test_candidates_unknown_document_fails() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (_, stderr, success) = run_xl(&config_path, &["candidates", "missing.html"]);
    assert!(!success);
    assert!(stderr.contains("not indexed"));
}

#[test]
fn test_links_respect_budget() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, stderr, success) = run_xl(&config_path, &["links", "guides/ownership.html"]);
    assert!(success, "links failed: {}", stderr);
    assert!(stdout.contains("--- Outbound ("));
    assert!(stdout.contains("/2) ---"));
    let outbound = stdout
        .lines()
        .filter(|l| l.trim_start().starts_with("->"))
        .count();
    assert!(outbound <= 2);
}

#[test]
fn test_manual_link_and_self_link_rejected() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, stderr, success) = run_xl(
        &config_path,
        &["link", "cooking.html", "guides/ownership.html", "--anchor", "Ownership"],
    );
    assert!(success, "link failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("linked cooking.html -> guides/ownership.html"));
    assert!(stdout.contains("[manual]"));

    let (_, stderr, success) =
        run_xl(&config_path, &["link", "cooking.html", "guides/ownership.html"]);
    assert!(!success);
    assert!(stderr.contains("duplicate"));

    let (_, stderr, success) = run_xl(&config_path, &["link", "cooking.html", "cooking.html"]);
    assert!(!success);
    assert!(stderr.contains("self-link"));

    let (_, stderr, success) =
        run_xl(&config_path, &["link", "cooking.html", "nowhere.html"]);
    assert!(!success);
    assert!(stderr.contains("not indexed"));
}

#[test]
fn test_scores_and_recompute() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, _, success) = run_xl(&config_path, &["scores"]);
    assert!(success);
    assert!(stdout.contains("DOCUMENT"));
    assert!(stdout.contains("cooking.html"));

    let (stdout, stderr, success) = run_xl(&config_path, &["recompute", "--full"]);
    assert!(success, "recompute failed: {}", stderr);
    assert!(stdout.contains("recompute full"));
    assert!(stdout.contains("documents: 5"));
    assert!(stdout.contains("converged: true"));
}

#[test]
fn test_changed_and_deleted() {
    let (tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let page = tmp.path().join("site/cooking.html");
    fs::write(
        &page,
        "<html><head><title>Cooking</title></head><body><p>Risotto and rust-free pans.</p></body></html>",
    )
    .unwrap();
    let (stdout, stderr, success) = run_xl(&config_path, &["changed", "cooking.html"]);
    assert!(success, "changed failed: {}", stderr);
    assert!(stdout.contains("cooking.html: Updated"));

    fs::remove_file(&page).unwrap();
    let (stdout, stderr, success) = run_xl(&config_path, &["deleted", "cooking.html"]);
    assert!(success, "deleted failed: {}", stderr);
    assert!(stdout.contains("cooking.html: removed"));

    let (stdout, _, _) = run_xl(&config_path, &["scores"]);
    assert!(!stdout.contains("cooking.html"));
}

#[test]
fn test_status() {
    let (_tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let (stdout, stderr, success) = run_xl(&config_path, &["status"]);
    assert!(success, "status failed: {}", stderr);
    assert!(stdout.contains("Indexed:     5 / 5 (100%)"));
    assert!(stdout.contains("Publishable: 4"));
    assert!(stdout.contains("Scored:      5"));
}

#[test]
fn test_export_writes_json() {
    let (tmp, config_path) = setup_test_env();
    init_and_sync(&config_path);

    let out = tmp.path().join("out/graph.json");
    let (_, stderr, success) =
        run_xl(&config_path, &["export", "--output", out.to_str().unwrap()]);
    assert!(success, "export failed: {}", stderr);

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["documents"].as_array().unwrap().len(), 5);
    let total: f64 = json["documents"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["score"].as_f64())
        .sum();
    assert!((total - 1.0).abs() < 1e-6);
    assert!(json["links"].is_array());
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_xl(&tmp.path().join("nope.toml"), &["status"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
