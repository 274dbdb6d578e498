//! JSON wire format tests for comparison reports

use crate::common::{StoreSpec, TestFixture};
use serde_json::Value;
use storediff::resolver::{compare_store_sets, CancelToken, DiffOptions};
use storediff::ComparisonReport;

fn options() -> DiffOptions {
    DiffOptions {
        parallel: false,
        ..DiffOptions::default()
    }
}

fn report_json(fixture: &TestFixture) -> Value {
    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, options(), &CancelToken::new()).unwrap();
    serde_json::to_value(&report).unwrap()
}

#[test]
fn test_kind_strings_and_hex_rendering() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            1,
            vec![StoreSpec::kv("s", &[("a", "1"), ("c", "3")])],
        )
        .unwrap();
    fixture
        .create_snapshot(
            "right",
            1,
            vec![StoreSpec::kv("s", &[("b", "2"), ("c", "9")])],
        )
        .unwrap();

    let json = report_json(&fixture);
    let key_diffs = json["diffs"][0]["key_diffs"].as_array().unwrap();

    let kinds: Vec<&str> = key_diffs
        .iter()
        .map(|d| d["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, vec!["key_only_left", "key_only_right", "value_differs"]);

    // "a" renders as lowercase hex
    assert_eq!(key_diffs[0]["key"].as_str().unwrap(), "61");
    assert_eq!(key_diffs[0]["value_left"].as_str().unwrap(), "31");
    assert!(key_diffs[0].get("value_right").is_none());

    // value_differs carries both sides
    assert_eq!(key_diffs[2]["value_left"].as_str().unwrap(), "33");
    assert_eq!(key_diffs[2]["value_right"].as_str().unwrap(), "39");
}

#[test]
fn test_summary_shape() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            3,
            vec![
                StoreSpec::kv("same", &[("k", "v")]),
                StoreSpec::kv("changed", &[("k", "v")]),
                StoreSpec::kv("gone", &[("k", "v")]),
            ],
        )
        .unwrap();
    fixture
        .create_snapshot(
            "right",
            3,
            vec![
                StoreSpec::kv("same", &[("k", "v")]),
                StoreSpec::kv("changed", &[("k", "w")]),
            ],
        )
        .unwrap();

    let json = report_json(&fixture);
    let summary = &json["summary"];
    assert_eq!(summary["total"], 3);
    assert_eq!(summary["matching"], 1);
    assert_eq!(summary["differing"], 1);
    assert_eq!(summary["missing"], 1);
    assert_eq!(summary["is_identical"], false);

    assert_eq!(json["version_left"], 3);
    assert_eq!(json["version_right"], 3);
}

#[test]
fn test_report_round_trips_through_json() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot("left", 1, vec![StoreSpec::kv("s", &[("a", "1")])])
        .unwrap();
    fixture
        .create_snapshot("right", 1, vec![StoreSpec::kv("s", &[("a", "2")])])
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, options(), &CancelToken::new()).unwrap();

    let json = serde_json::to_string(&report).unwrap();
    let back: ComparisonReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
}

#[test]
fn test_matching_store_omits_empty_fields() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot("left", 1, vec![StoreSpec::kv("s", &[("a", "1")])])
        .unwrap();
    fixture
        .create_snapshot("right", 1, vec![StoreSpec::kv("s", &[("a", "1")])])
        .unwrap();

    let json = report_json(&fixture);
    let diff = &json["diffs"][0];
    assert_eq!(diff["status"], "match");
    assert!(diff.get("key_diffs").is_none());
    assert!(diff.get("sample_keys").is_none());
    assert!(diff.get("note").is_none());
    assert!(diff.get("truncated").is_none());
}
