//! End-to-end tests of the labeled-archive split pipeline.

use std::collections::BTreeSet;
use std::io::Read;

use splitpack::splitter::{DatasetSplitter, SplitConfig, SplitError};

fn build_archive(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, body) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(body.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *body).unwrap();
    }
    builder.into_inner().unwrap()
}

fn read_entries(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut archive = tar::Archive::new(bytes);
    let mut out = Vec::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        out.push((path, body));
    }
    out
}

fn fifty_fifty() -> DatasetSplitter {
    DatasetSplitter::new(SplitConfig::new(0.5, 0.5).unwrap())
}

#[test]
fn transform_splits_each_label_evenly() {
    let source = build_archive(&[
        ("foo/1.txt", b"Hello 1."),
        ("foo/2.txt", b"Hello 2."),
        ("bar/1.txt", b"Hello bar 1."),
        ("bar/2.txt", b"Hello bar 2."),
    ]);

    let mut archive = tar::Archive::new(source.as_slice());
    let mut train = tar::Builder::new(Vec::new());
    let mut test = tar::Builder::new(Vec::new());

    let summary = fifty_fifty()
        .transform(&mut archive, &mut train, &mut test)
        .unwrap();
    assert_eq!(summary.labels, 2);
    assert_eq!(summary.train_entries, 2);
    assert_eq!(summary.test_entries, 2);

    let train_bytes = train.into_inner().unwrap();
    let test_bytes = test.into_inner().unwrap();

    // Each output holds exactly one entry per label, and the two outputs are
    // disjoint.
    let mut seen = BTreeSet::new();
    for bytes in [&train_bytes, &test_bytes] {
        let entries = read_entries(bytes);
        let foos = entries.iter().filter(|(p, _)| p.starts_with("foo/")).count();
        let bars = entries.iter().filter(|(p, _)| p.starts_with("bar/")).count();
        assert_eq!(foos, 1);
        assert_eq!(bars, 1);
        for (path, _) in &entries {
            assert!(seen.insert(path.clone()), "duplicate entry {path}");
        }
    }
    assert_eq!(seen.len(), 4);
}

#[test]
fn transform_preserves_body_bytes_exactly() {
    let binary: Vec<u8> = (0u8..=255).collect();
    let source = build_archive(&[
        ("img/a.bin", binary.as_slice()),
        ("img/b.bin", b"plain text"),
    ]);

    let mut archive = tar::Archive::new(source.as_slice());
    let mut train = tar::Builder::new(Vec::new());
    let mut test = tar::Builder::new(Vec::new());
    fifty_fifty()
        .transform(&mut archive, &mut train, &mut test)
        .unwrap();

    let train_entries = read_entries(&train.into_inner().unwrap());
    let test_entries = read_entries(&test.into_inner().unwrap());
    assert_eq!(train_entries.len(), 1);
    assert_eq!(test_entries.len(), 1);
    assert_eq!(train_entries[0], ("img/a.bin".to_string(), binary));
    assert_eq!(
        test_entries[0],
        ("img/b.bin".to_string(), b"plain text".to_vec())
    );
}

#[test]
fn transform_keeps_archive_order_within_labels() {
    let source = build_archive(&[
        ("foo/1.txt", b"1"),
        ("foo/2.txt", b"2"),
        ("foo/3.txt", b"3"),
        ("foo/4.txt", b"4"),
    ]);

    let mut archive = tar::Archive::new(source.as_slice());
    let mut train = tar::Builder::new(Vec::new());
    let mut test = tar::Builder::new(Vec::new());
    fifty_fifty()
        .transform(&mut archive, &mut train, &mut test)
        .unwrap();

    let train_paths: Vec<String> = read_entries(&train.into_inner().unwrap())
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    let test_paths: Vec<String> = read_entries(&test.into_inner().unwrap())
        .into_iter()
        .map(|(path, _)| path)
        .collect();
    assert_eq!(train_paths, ["foo/1.txt", "foo/2.txt"]);
    assert_eq!(test_paths, ["foo/3.txt", "foo/4.txt"]);
}

#[test]
fn odd_label_group_favors_the_test_output() {
    let source = build_archive(&[
        ("foo/1.txt", b"1"),
        ("foo/2.txt", b"2"),
        ("foo/3.txt", b"3"),
    ]);

    let mut archive = tar::Archive::new(source.as_slice());
    let mut train = tar::Builder::new(Vec::new());
    let mut test = tar::Builder::new(Vec::new());
    let summary = fifty_fifty()
        .transform(&mut archive, &mut train, &mut test)
        .unwrap();
    assert_eq!(summary.train_entries, 1);
    assert_eq!(summary.test_entries, 2);
}

#[test]
fn transform_rejects_deep_nesting_before_writing() {
    let source = build_archive(&[("a/foo/1.txt", b"Hello 1."), ("a/bar/1.txt", b"Hello bar 1.")]);

    let mut archive = tar::Archive::new(source.as_slice());
    let mut train = tar::Builder::new(Vec::new());
    let mut test = tar::Builder::new(Vec::new());
    let err = fifty_fifty()
        .transform(&mut archive, &mut train, &mut test)
        .unwrap_err();
    assert!(matches!(err, SplitError::MalformedEntryPath(_)));
    assert!(train.get_ref().is_empty());
    assert!(test.get_ref().is_empty());
}

#[test]
fn validate_accepts_single_level_paths() {
    let source = build_archive(&[
        ("foo/1.txt", b"Hello 1."),
        ("foo/2.txt", b"Hello 2."),
        ("bar/1.txt", b"Hello bar 1."),
        ("bar/2.txt", b"Hello bar 2."),
    ]);
    let mut archive = tar::Archive::new(source.as_slice());
    assert!(fifty_fifty().validate(&mut archive).is_ok());
}

#[test]
fn validate_rejects_wrong_nesting_depth() {
    let too_deep = build_archive(&[("a/foo/1.txt", b"Hello 1.")]);
    let mut archive = tar::Archive::new(too_deep.as_slice());
    assert!(fifty_fifty().validate(&mut archive).is_err());

    let too_shallow = build_archive(&[("foo.txt", b"Hello 1.")]);
    let mut archive = tar::Archive::new(too_shallow.as_slice());
    assert!(fifty_fifty().validate(&mut archive).is_err());
}

#[test]
fn validate_accepts_an_empty_archive() {
    let mut builder = tar::Builder::new(Vec::new());
    builder.finish().unwrap();
    let source = builder.into_inner().unwrap();
    let mut archive = tar::Archive::new(source.as_slice());
    assert!(fifty_fifty().validate(&mut archive).is_ok());
}

#[test]
fn validate_is_repeatable_on_the_same_bytes() {
    let source = build_archive(&[("foo/1.txt", b"Hello 1.")]);
    for _ in 0..2 {
        let mut archive = tar::Archive::new(source.as_slice());
        assert!(fifty_fifty().validate(&mut archive).is_ok());
    }
}

#[test]
fn create_map_groups_entries_by_label() {
    let source = build_archive(&[
        ("foo/1.txt", b"Hello 1."),
        ("bar/1.txt", b"Hello bar 1."),
        ("bar/2.txt", b"Hello bar 2."),
    ]);
    let mut archive = tar::Archive::new(source.as_slice());
    let index = fifty_fifty().create_map(&mut archive).unwrap();

    assert_eq!(index["foo"].len(), 1);
    assert_eq!(index["bar"].len(), 2);
    assert_eq!(index["bar"][0].path(), "bar/1.txt");
    assert_eq!(index["bar"][1].path(), "bar/2.txt");
    assert_eq!(index["foo"][0].body(), b"Hello 1.");
    assert_eq!(
        index.values().map(|entries| entries.len()).sum::<usize>(),
        3
    );
}
