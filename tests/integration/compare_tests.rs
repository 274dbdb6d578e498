//! End-to-end comparison tests over on-disk snapshots

use crate::common::{baseline_stores, StoreSpec, TestFixture};
use storediff::resolver::{compare_store_sets, CancelToken, DiffOptions};
use storediff::snapshot::DirStoreSet;
use storediff::{KeyDiffKind, StoreStatus};

fn sequential() -> DiffOptions {
    DiffOptions {
        parallel: false,
        ..DiffOptions::default()
    }
}

#[test]
fn test_identical_snapshots_are_identical() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_snapshot("left", 100, baseline_stores()).unwrap();
    fixture.create_snapshot("right", 100, baseline_stores()).unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();

    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    assert!(report.is_identical());
    assert_eq!(report.version_left, 100);
    assert_eq!(report.version_right, 100);
    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.matching, 3);
    assert!(report
        .diffs
        .iter()
        .all(|d| d.status == StoreStatus::Match && d.key_diffs.is_empty()));
}

#[test]
fn test_divergent_value_localized() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_snapshot("left", 7, baseline_stores()).unwrap();
    fixture
        .create_snapshot(
            "right",
            7,
            vec![
                StoreSpec::tree("acc", &[("addr1", "100"), ("addr2", "250")]),
                // bal2 modified
                StoreSpec::tree("bank", &[("bal1", "10"), ("bal2", "21"), ("bal3", "30")]),
                StoreSpec::kv("params", &[("max_gas", "1000000")]),
            ],
        )
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    assert!(!report.is_identical());
    assert_eq!(report.summary.differing, 1);

    let bank = report.diffs.iter().find(|d| d.name == "bank").unwrap();
    assert_eq!(bank.status, StoreStatus::Differ);
    assert_eq!(bank.key_diffs.len(), 1);
    assert_eq!(bank.key_diffs[0].kind, KeyDiffKind::ValueDiffers);
    assert_eq!(bank.key_diffs[0].key.as_slice(), b"bal2");
    assert!(!bank.truncated);
    assert!(!bank.partial);
}

#[test]
fn test_missing_store_reported_with_sample() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_snapshot("left", 1, baseline_stores()).unwrap();
    fixture
        .create_snapshot(
            "right",
            1,
            vec![
                StoreSpec::tree("acc", &[("addr1", "100"), ("addr2", "250")]),
                StoreSpec::kv("params", &[("max_gas", "1000000")]),
            ],
        )
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    let missing: Vec<_> = report
        .diffs
        .iter()
        .filter(|d| d.status == StoreStatus::MissingInRight)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].name, "bank");
    assert!(missing[0].key_diffs.is_empty());

    let sample = missing[0].sample_keys.as_ref().unwrap();
    assert!(!sample.is_empty());
    assert_eq!(sample[0].as_slice(), b"bal1");
}

#[test]
fn test_limit_truncates_key_diffs() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            1,
            vec![StoreSpec::kv(
                "s",
                &[("a", "1"), ("b", "1"), ("c", "1"), ("d", "1"), ("e", "1")],
            )],
        )
        .unwrap();
    fixture
        .create_snapshot("right", 1, vec![StoreSpec::kv("s", &[])])
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();

    let options = DiffOptions {
        key_diff_limit: 2,
        parallel: false,
        ..DiffOptions::default()
    };
    let report = compare_store_sets(&left, &right, options, &CancelToken::new()).unwrap();

    let diff = &report.diffs[0];
    assert_eq!(diff.key_diffs.len(), 2);
    assert!(diff.truncated);
}

#[test]
fn test_swapped_roles_mirror_report() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "a",
            1,
            vec![StoreSpec::kv("s", &[("k1", "v1"), ("shared", "x")])],
        )
        .unwrap();
    fixture
        .create_snapshot(
            "b",
            1,
            vec![StoreSpec::kv("s", &[("k2", "v2"), ("shared", "y")])],
        )
        .unwrap();

    let a = fixture.open_snapshot("a").unwrap();
    let b = fixture.open_snapshot("b").unwrap();

    let forward = compare_store_sets(&a, &b, sequential(), &CancelToken::new()).unwrap();
    let backward = compare_store_sets(&b, &a, sequential(), &CancelToken::new()).unwrap();

    let f = &forward.diffs[0].key_diffs;
    let g = &backward.diffs[0].key_diffs;
    assert_eq!(f.len(), g.len());
    for (x, y) in f.iter().zip(g.iter()) {
        assert_eq!(x.key, y.key);
        let mirrored = match x.kind {
            KeyDiffKind::KeyOnlyLeft => KeyDiffKind::KeyOnlyRight,
            KeyDiffKind::KeyOnlyRight => KeyDiffKind::KeyOnlyLeft,
            KeyDiffKind::ValueDiffers => KeyDiffKind::ValueDiffers,
        };
        assert_eq!(y.kind, mirrored);
        assert_eq!(x.value_left, y.value_right);
        assert_eq!(x.value_right, y.value_left);
    }
}

#[test]
fn test_parallel_and_sequential_reports_match() {
    let fixture = TestFixture::new().unwrap();

    let mut left_stores = Vec::new();
    let mut right_stores = Vec::new();
    left_stores.push(StoreSpec::kv("s0", &[("a", "1")]));
    right_stores.push(StoreSpec::kv("s0", &[("a", "1")]));
    left_stores.push(StoreSpec::kv("s1", &[("a", "1"), ("b", "2")]));
    right_stores.push(StoreSpec::kv("s1", &[("a", "x"), ("c", "3")]));
    left_stores.push(StoreSpec::tree("s2", &[("k", "v")]));
    right_stores.push(StoreSpec::tree("s2", &[("k", "w")]));
    left_stores.push(StoreSpec::kv("only_left", &[("x", "1")]));
    right_stores.push(StoreSpec::kv("only_right", &[("y", "2")]));

    fixture.create_snapshot("left", 5, left_stores).unwrap();
    fixture.create_snapshot("right", 5, right_stores).unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();

    let seq = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();
    let par =
        compare_store_sets(&left, &right, DiffOptions::default(), &CancelToken::new()).unwrap();

    assert_eq!(seq.diffs, par.diffs);
    assert_eq!(seq.summary, par.summary);
}

#[test]
fn test_report_ordering_is_name_sorted() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            1,
            vec![
                StoreSpec::kv("zeta", &[("a", "1")]),
                StoreSpec::kv("alpha", &[("a", "1")]),
                StoreSpec::kv("mid", &[("a", "1")]),
            ],
        )
        .unwrap();
    fixture
        .create_snapshot("right", 1, vec![StoreSpec::kv("mid", &[("a", "2")])])
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    let names: Vec<&str> = report.diffs.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);
}

#[test]
fn test_transient_store_is_incomparable_but_not_fatal() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            1,
            vec![
                StoreSpec::transient("mem", &[("a", "1")]),
                StoreSpec::kv("ok", &[("k", "v")]),
            ],
        )
        .unwrap();
    fixture
        .create_snapshot(
            "right",
            1,
            vec![
                StoreSpec::transient("mem", &[("a", "2")]),
                StoreSpec::kv("ok", &[("k", "v")]),
            ],
        )
        .unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    let mem = report.diffs.iter().find(|d| d.name == "mem").unwrap();
    assert_eq!(mem.status, StoreStatus::Differ);
    assert!(mem.key_diffs.is_empty());
    assert!(mem.note.is_some());

    let ok = report.diffs.iter().find(|d| d.name == "ok").unwrap();
    assert_eq!(ok.status, StoreStatus::Match);
}

#[test]
fn test_corrupt_data_file_marks_store_partial() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot(
            "left",
            1,
            vec![StoreSpec::kv("s", &[("a", "1"), ("b", "2"), ("c", "3")])],
        )
        .unwrap();
    fixture
        .create_snapshot(
            "right",
            1,
            vec![StoreSpec::kv("s", &[("a", "1"), ("b", "2"), ("c", "4")])],
        )
        .unwrap();

    // Append garbage past the last entry of the right data file; the merge
    // hits it after emitting the real divergence at "c".
    let data = fixture.root().join("right/stores/1/s.jsonl");
    let mut content = std::fs::read_to_string(&data).unwrap();
    content.push_str("this is not json\n");
    std::fs::write(&data, content).unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    let diff = &report.diffs[0];
    assert_eq!(diff.status, StoreStatus::Differ);
    assert!(diff.partial);
    assert_eq!(diff.key_diffs.len(), 1);
    assert_eq!(diff.key_diffs[0].key.as_slice(), b"c");
    assert!(diff.note.as_ref().unwrap().contains("aborted mid-stream"));
}

#[test]
fn test_hash_anomaly_surfaced_not_dropped() {
    let fixture = TestFixture::new().unwrap();
    fixture
        .create_snapshot("left", 1, vec![StoreSpec::kv("s", &[("a", "1")])])
        .unwrap();

    // Same contents on the right, but a deliberately desynced recorded hash.
    let dir = fixture.root().join("right");
    let mut writer = storediff::snapshot::SnapshotWriter::new(&dir);
    writer
        .write_store(
            1,
            "s",
            storediff::snapshot::StoreKind::Kv,
            crate::common::entries(&[("a", "1")]),
        )
        .unwrap();
    writer.override_root_hash(1, "s", vec![0xDE, 0xAD]);
    writer.finish().unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    let diff = &report.diffs[0];
    assert_eq!(diff.status, StoreStatus::Differ);
    assert!(diff.key_diffs.is_empty());
    assert!(diff.note.as_ref().unwrap().contains("keys match"));
    let shape = diff.shape.as_ref().unwrap();
    assert!(shape.is_identical());
}

#[test]
fn test_different_versions_reported() {
    let fixture = TestFixture::new().unwrap();
    fixture.create_snapshot("left", 100, baseline_stores()).unwrap();
    fixture.create_snapshot("right", 101, baseline_stores()).unwrap();

    let left = fixture.open_snapshot("left").unwrap();
    let right = fixture.open_snapshot("right").unwrap();
    let report = compare_store_sets(&left, &right, sequential(), &CancelToken::new()).unwrap();

    assert_eq!(report.version_left, 100);
    assert_eq!(report.version_right, 101);
    // Same contents at different versions still hash-match per store.
    assert!(report.is_identical());
}

#[test]
fn test_version_pinning_changes_outcome() {
    let fixture = TestFixture::new().unwrap();

    let dir = fixture.root().join("multi");
    let mut writer = storediff::snapshot::SnapshotWriter::new(&dir);
    writer
        .write_store(
            10,
            "s",
            storediff::snapshot::StoreKind::Kv,
            crate::common::entries(&[("a", "old")]),
        )
        .unwrap();
    writer
        .write_store(
            20,
            "s",
            storediff::snapshot::StoreKind::Kv,
            crate::common::entries(&[("a", "new")]),
        )
        .unwrap();
    writer.finish().unwrap();

    fixture
        .create_snapshot("other", 10, vec![StoreSpec::kv("s", &[("a", "old")])])
        .unwrap();

    let pinned = DirStoreSet::open(&dir, Some(10)).unwrap();
    let other = fixture.open_snapshot("other").unwrap();
    let report = compare_store_sets(&pinned, &other, sequential(), &CancelToken::new()).unwrap();
    assert!(report.is_identical());

    let latest = DirStoreSet::open(&dir, None).unwrap();
    let report = compare_store_sets(&latest, &other, sequential(), &CancelToken::new()).unwrap();
    assert!(!report.is_identical());
}
