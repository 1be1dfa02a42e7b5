mod common;

use common::{
    assert_exit, run_bddreport, stderr, stdout, write_file, Workspace, EXIT_BREACH, EXIT_ERROR,
    EXIT_FORBIDDEN, EXIT_NOT_FOUND, EXIT_REDIRECT,
};
use std::fs;

const LOGIN_PAGE: &str = "features/features-login.feature.html";
const CHECKOUT_PAGE: &str = "features/features-checkout.feature.html";

#[test]
fn generate_writes_report_and_skips_broken_files() {
    let ws = Workspace::new();
    let output = ws.generate(&[]);
    assert_exit(&output, 0);

    let out = stdout(&output);
    assert!(out.contains("features: 2 (1 failed)"), "{out}");
    assert!(out.contains("scenarios: 3 (1 failed)"), "{out}");
    assert!(
        out.contains("steps: 8 (passed 5, failed 1, skipped 1, pending 0, undefined 1, missing 0)"),
        "{out}"
    );
    assert!(out.contains("duration: 3 secs and 503 ms"), "{out}");
    assert!(out.contains("skipped result file nightly/broken.json"), "{out}");
    assert!(out.contains("threshold: found 1 failed steps, while expected not more than 0"));

    for rel in [
        "overview-features.html",
        "overview-tags.html",
        LOGIN_PAGE,
        CHECKOUT_PAGE,
        "tags/smoke.html",
        "tags/fast.html",
        "css/style.css",
        "js/report.js",
    ] {
        assert!(ws.report_file(rel).is_file(), "missing {rel}");
    }
    assert!(ws.state_path.is_file());
    assert!(ws.read_report_file(CHECKOUT_PAGE).contains("Café checkout"));
    assert!(ws
        .read_report_file("overview-features.html")
        .contains(r#"{"passed":5,"failed":1,"skipped":1,"pending":0,"undefined":1,"missing":0}"#));
}

#[test]
fn strict_generate_fails_on_malformed_file() {
    let ws = Workspace::new();
    let output = ws.generate(&["--strict"]);
    assert_exit(&output, EXIT_ERROR);
    let err = stderr(&output);
    assert!(err.contains("broken.json"), "{err}");
    assert!(err.contains("expected a top-level array") || err.contains("invalid JSON"), "{err}");
    assert!(!ws.report_file("overview-features.html").exists());
}

#[test]
fn escalation_with_fail_on_breach_exits_one() {
    let ws = Workspace::new();
    let output = ws.generate(&[
        "--exclude",
        "nightly/**",
        "--escalate",
        "skipped,undefined",
        "--fail-on-breach",
        "--json",
    ]);
    assert_exit(&output, EXIT_BREACH);

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).expect("json output");
    assert_eq!(json["result_files"], 2);
    assert_eq!(json["escalated"], serde_json::json!(["skipped", "undefined"]));
    assert_eq!(json["load_failures"].as_array().map(Vec::len), Some(0));
    assert_eq!(json["summary"]["failed_features"], 2);
    assert_eq!(json["summary"]["steps"]["failed"], 3);
    assert_eq!(json["summary"]["internal_steps"]["skipped"], 1);
    let limits: Vec<_> = json["verdict"]["breaches"]
        .as_array()
        .expect("breaches")
        .iter()
        .map(|breach| breach["limit"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(limits.contains(&"failed steps".to_string()));
    assert!(limits.contains(&"failed features".to_string()));

    let checkout = ws.read_report_file(CHECKOUT_PAGE);
    assert!(checkout.contains("this step was skipped"));
    assert!(checkout.contains("this step is not implemented"));
}

#[test]
fn fetch_serves_verified_files_and_refuses_tampering() {
    let ws = Workspace::new();
    assert_exit(&ws.generate(&[]), 0);

    let output = ws.fetch(LOGIN_PAGE);
    assert_exit(&output, 0);
    assert_eq!(output.stdout, fs::read(ws.report_file(LOGIN_PAGE)).expect("read page"));
    let err = stderr(&output);
    assert!(err.contains("name features-login.feature.html"), "{err}");
    assert!(err.contains("checksum-matched, content-security bypassed"), "{err}");

    let output = ws.fetch("");
    assert_exit(&output, EXIT_REDIRECT);
    assert!(stdout(&output).contains("redirect overview-features.html"));

    write_file(&ws.report_file(LOGIN_PAGE), "<script>alert(1)</script>");
    assert_exit(&ws.fetch(LOGIN_PAGE), EXIT_FORBIDDEN);

    write_file(&ws.report_file("features/injected.html"), "<script></script>");
    assert_exit(&ws.fetch("features/injected.html"), EXIT_NOT_FOUND);

    write_file(&ws.temp.path().join("outside.html"), "outside");
    assert_exit(&ws.fetch("../outside.html"), EXIT_NOT_FOUND);

    // Trusted assets are served even after edits.
    write_file(&ws.report_file("css/style.css"), "body { color: red }");
    let output = ws.fetch("css/style.css");
    assert_exit(&output, 0);
    assert_eq!(stdout(&output), "body { color: red }");
}

#[test]
fn fetch_writes_to_out_file() {
    let ws = Workspace::new();
    assert_exit(&ws.generate(&[]), 0);
    let out_path = ws.temp.path().join("page.html");
    let output = run_bddreport(&[
        "fetch".to_string(),
        "--state".to_string(),
        ws.state_path.display().to_string(),
        "/overview-features.html".to_string(),
        "--out".to_string(),
        out_path.display().to_string(),
    ]);
    assert_exit(&output, 0);
    assert!(output.stdout.is_empty());
    assert_eq!(
        fs::read_to_string(out_path).expect("read out"),
        ws.read_report_file("overview-features.html")
    );
}

#[test]
fn check_reports_drift() {
    let ws = Workspace::new();
    assert_exit(&ws.generate(&[]), 0);
    let check = |json: bool| {
        let mut args = vec![
            "check".to_string(),
            "--state".to_string(),
            ws.state_path.display().to_string(),
        ];
        if json {
            args.push("--json".to_string());
        }
        run_bddreport(&args)
    };
    assert_exit(&check(false), 0);

    write_file(&ws.report_file(LOGIN_PAGE), "tampered");
    fs::remove_file(ws.report_file("tags/smoke.html")).expect("remove tag page");
    let output = check(false);
    assert_exit(&output, EXIT_BREACH);
    let out = stdout(&output);
    assert!(out.contains(&format!("modified: {LOGIN_PAGE}")), "{out}");
    assert!(out.contains("missing: tags/smoke.html"), "{out}");

    let json: serde_json::Value =
        serde_json::from_str(&stdout(&check(true))).expect("json output");
    assert_eq!(json["modified"][0], LOGIN_PAGE);
}

#[test]
fn scan_fingerprints_an_existing_directory() {
    let ws = Workspace::new();
    write_file(&ws.report_file("index.html"), "<html>hi</html>");
    write_file(&ws.report_file("img/logo.png"), "png");
    let output = run_bddreport(&[
        "scan".to_string(),
        "--report".to_string(),
        ws.report_dir.display().to_string(),
    ]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("fingerprinted 1 files"));
    assert!(stdout(&output).contains("index: overview-features.html"));
    // Default state path sits beside the report directory.
    assert!(ws.state_path.is_file());
    assert_exit(&ws.fetch("index.html"), 0);
    assert_exit(&ws.fetch("img/logo.png"), 0);
}

#[test]
fn config_file_thresholds_and_overrides() {
    let ws = Workspace::new();
    let config_path = ws.temp.path().join("config/report.json");
    assert_exit(
        &run_bddreport(&[
            "init-config".to_string(),
            "--out".to_string(),
            config_path.display().to_string(),
        ]),
        0,
    );
    // A second write without --force is refused.
    assert_exit(
        &run_bddreport(&[
            "init-config".to_string(),
            "--out".to_string(),
            config_path.display().to_string(),
        ]),
        EXIT_ERROR,
    );

    let mut config: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).expect("read config"))
            .expect("parse config");
    config["fail_on_breach"] = serde_json::json!(true);
    config["project_name"] = serde_json::json!("Shop <web>");
    config["thresholds"] = serde_json::json!({
        "failed_steps": 1,
        "skipped_steps": 1,
        "undefined_steps": 1,
        "failed_scenarios": 1,
        "failed_features": 1
    });
    write_file(
        &config_path,
        &serde_json::to_string_pretty(&config).expect("serialize config"),
    );

    let config_arg = config_path.display().to_string();
    let output = ws.generate(&["--config", &config_arg, "--build-label", "build 7"]);
    assert_exit(&output, 0);
    let overview = ws.read_report_file("overview-features.html");
    assert!(overview.contains("Shop &lt;web&gt;"));
    assert!(overview.contains("build 7"));
    assert!(!overview.contains("Thresholds exceeded"));

    // Escalating on the command line pushes the run over its limits.
    let output = ws.generate(&["--config", &config_arg, "--escalate", "skipped"]);
    assert_exit(&output, EXIT_BREACH);
}

#[test]
fn invalid_escalation_is_rejected() {
    let ws = Workspace::new();
    let output = ws.generate(&["--escalate", "passed"]);
    assert_exit(&output, EXIT_ERROR);
    assert!(stderr(&output).contains("escalate may only list"));
}

#[test]
fn shards_of_one_feature_land_on_one_page() {
    let ws = Workspace::new();
    let input = ws.temp.path().join("shards");
    let shard = |scenario: &str, status: &str| {
        format!(
            r#"[{{"name": "Login", "uri": "features/login.feature", "elements": [
                {{"name": "{scenario}", "steps": [
                    {{"keyword": "Given ", "name": "a step", "result": {{"status": "{status}"}}}}
                ]}}
            ]}}]"#
        )
    };
    write_file(&input.join("a.json"), &shard("runs on shard a", "passed"));
    write_file(&input.join("b.json"), &shard("runs on shard b", "failed"));

    let output = run_bddreport(&[
        "generate".to_string(),
        "--input".to_string(),
        input.display().to_string(),
        "--output".to_string(),
        ws.report_dir.display().to_string(),
    ]);
    assert_exit(&output, 0);
    assert!(stdout(&output).contains("features: 1 (1 failed)"));
    let page = ws.read_report_file(LOGIN_PAGE);
    assert!(page.contains("runs on shard a"));
    assert!(page.contains("runs on shard b"));
}
