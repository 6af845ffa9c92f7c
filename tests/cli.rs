#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const HARBOR_ID: &str = "3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2";

fn snapshots_json(harbor_probability: i32) -> String {
    format!(
        r#"[
  {{
    "id": "{HARBOR_ID}",
    "name": "Harbor retrofit",
    "stage": "proposal",
    "checklist": ["proposal_scope_agreed", "proposal_pricing_sent", "proposal_reviewed_with_buyer"],
    "owner_id": "0c22f1f1-9184-4fd4-9b21-28c68a6a89dc",
    "expected_close_date": "2026-10-20",
    "estimated_value": 48000,
    "service_area_id": "d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2",
    "stage_entered_at": "2026-10-14T09:00:00Z",
    "last_interaction_at": "2026-10-17T09:00:00Z",
    "open_tasks": [{{"due_date": "2026-10-26"}}],
    "probability": {harbor_probability}
  }},
  {{
    "name": "Depot fit-out",
    "stage": "qualification",
    "checklist": "not-a-list",
    "stage_entered_at": "2026-09-09T09:00:00Z"
  }}
]"#
    )
}

fn write_snapshots(dir: &TempDir, harbor_probability: i32) -> std::path::PathBuf {
    let path = dir.path().join("deals.json");
    fs::write(&path, snapshots_json(harbor_probability)).expect("fixture should be written");
    path
}

fn deal_health() -> Command {
    let mut cmd = Command::cargo_bin("deal-health").expect("binary should compile");
    cmd.env_remove("DEAL_HEALTH_CHECKLIST")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn checklist_lists_stage_items() {
    deal_health()
        .args(["checklist", "--stage", "proposal"])
        .assert()
        .success()
        .stdout(predicate::str::contains("proposal (base 40%)"))
        .stdout(predicate::str::contains("Scope agreed [proposal_scope_agreed] +10"))
        .stdout(predicate::str::contains("lead").not());
}

#[test]
fn score_requires_a_source() {
    deal_health()
        .arg("score")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn score_rejects_two_sources() {
    deal_health()
        .args(["score", "--json", "a.json", "--csv", "b.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn score_prints_weakest_deal_first() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_snapshots(&dir, 70);

    let output = deal_health()
        .args(["score", "--today", "2026-10-19", "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Harbor retrofit (proposal) score 90 [Healthy], recommended 70% vs current 70% (delta +0)",
        ))
        .stdout(predicate::str::contains(
            "Depot fit-out (qualification) score 8 [At Risk], recommended 0% vs current unset (delta -10)",
        ))
        .stdout(predicate::str::contains("[high] No owner assigned"))
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8(output).expect("stdout should be utf-8");
    let depot = text.find("Depot fit-out").expect("depot listed");
    let harbor = text.find("Harbor retrofit").expect("harbor listed");
    assert!(depot < harbor);
}

#[test]
fn score_json_output_includes_level_and_breakdown() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_snapshots(&dir, 70);

    let output = deal_health()
        .args([
            "score",
            "--today",
            "2026-10-19",
            "--format",
            "json",
            "--stage",
            "proposal",
            "--json",
        ])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let rows: serde_json::Value = serde_json::from_slice(&output).expect("stdout should be json");
    let rows = rows.as_array().expect("array of rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], "Harbor retrofit");
    assert_eq!(rows[0]["level"]["label"], "Healthy");
    assert_eq!(rows[0]["level"]["tone"], "positive");
    assert_eq!(rows[0]["health"]["score"], 90);
    assert_eq!(rows[0]["health"]["breakdown"]["checklist"], 70.0);
    assert_eq!(rows[0]["health"]["signals"].as_array().map(Vec::len), Some(0));
}

#[test]
fn check_requires_justification_for_large_override() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_snapshots(&dir, 95);

    deal_health()
        .args(["check", "--today", "2026-10-19", "--id", HARBOR_ID, "--json"])
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("delta -25"))
        .stderr(predicate::str::contains("a justification is required"));

    deal_health()
        .args([
            "check",
            "--today",
            "2026-10-19",
            "--id",
            HARBOR_ID,
            "--justification",
            "Procurement confirmed budget on the call",
            "--json",
        ])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Probability accepted."));
}

#[test]
fn check_accepts_small_override_without_justification() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_snapshots(&dir, 89);

    deal_health()
        .args(["check", "--today", "2026-10-19", "--id", HARBOR_ID, "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("delta -19"));
}

#[test]
fn report_is_written_from_csv() {
    let dir = TempDir::new().expect("temp dir should be created");
    let csv_path = dir.path().join("deals.csv");
    let out_path = dir.path().join("report.md");
    fs::write(
        &csv_path,
        "id,name,stage,checklist,owner_id,expected_close_date,estimated_value,service_area_id,stage_entered_at,last_interaction_at,probability,open_tasks\n\
         ,Kiosk rollout,lead,,,,,,2026-10-01T10:00:00Z,,60,none\n",
    )
    .expect("csv should be written");

    deal_health()
        .args(["report", "--today", "2026-10-19", "--csv"])
        .arg(&csv_path)
        .arg("--out")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Report written to"));

    let report = fs::read_to_string(&out_path).expect("report should exist");
    assert!(report.contains("# Pipeline Health Report"));
    assert!(report.contains("Generated for all stages on 2026-10-19 (1 opportunities)"));
    assert!(report.contains("Kiosk rollout (lead)"));
    assert!(report.contains("## Probability Overrides Needing Justification"));
}

#[test]
fn invalid_checklist_table_is_reported() {
    let dir = TempDir::new().expect("temp dir should be created");
    let table = dir.path().join("checklist.json");
    fs::write(
        &table,
        r#"[
            {"stage": "lead", "base_probability": 5, "items": [{"id": "dup", "label": "A", "weight": 5}]},
            {"stage": "proposal", "base_probability": 40, "items": [{"id": "dup", "label": "B", "weight": 5}]}
        ]"#,
    )
    .expect("table should be written");

    deal_health()
        .arg("--checklist")
        .arg(&table)
        .arg("checklist")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load checklist table"));
}

#[test]
fn custom_checklist_table_changes_scores() {
    let dir = TempDir::new().expect("temp dir should be created");
    let table = dir.path().join("checklist.json");
    fs::write(
        &table,
        r#"[{"stage": "qualification", "base_probability": 30, "items": []}]"#,
    )
    .expect("table should be written");
    let path = write_snapshots(&dir, 70);

    deal_health()
        .arg("--checklist")
        .arg(&table)
        .args(["score", "--today", "2026-10-19", "--stage", "qualification", "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("vs current unset (delta -30)"));
}

const UNSET_ID: &str = "8a1e7c52-5b0f-4d1b-9a43-2f6c1d0e9b77";

fn write_unset_probability_deal(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("unset.json");
    fs::write(
        &path,
        format!(
            r#"[{{
  "id": "{UNSET_ID}",
  "name": "Neg",
  "stage": "negotiation",
  "checklist": ["negotiation_terms_agreed"],
  "expected_close_date": "2026-09-30"
}}]"#
        ),
    )
    .expect("fixture should be written");
    path
}

#[test]
fn check_skips_policy_when_probability_is_unset() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_unset_probability_deal(&dir);

    deal_health()
        .args(["check", "--today", "2026-10-19", "--id", UNSET_ID, "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("recommended 25%, delta -45"))
        .stdout(predicate::str::contains("Probability accepted."));
}

#[test]
fn report_does_not_list_unset_probability_as_override() {
    let dir = TempDir::new().expect("temp dir should be created");
    let path = write_unset_probability_deal(&dir);
    let out_path = dir.path().join("report.md");

    deal_health()
        .args(["report", "--today", "2026-10-19", "--json"])
        .arg(&path)
        .arg("--out")
        .arg(&out_path)
        .assert()
        .success();

    let report = fs::read_to_string(&out_path).expect("report should exist");
    let overrides = report
        .find("## Probability Overrides Needing Justification")
        .expect("override section present");
    assert!(report.contains("Neg (negotiation) score"));
    assert!(!report[overrides..].contains("Neg (negotiation)"));
}
