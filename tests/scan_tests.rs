use std::sync::atomic::{AtomicUsize, Ordering};

use relic::io::DiskReader;
use relic::scan::scan_free_space;
use relic::types::ScanConfig;

const CLUSTER: u64 = 512;

/// Image of `clusters` clusters with the given (cluster, offset, bytes)
/// patches applied.
fn image_with(clusters: u64, patches: &[(u64, usize, &[u8])]) -> tempfile::NamedTempFile {
    let mut data = vec![0u8; (clusters * CLUSTER) as usize];
    for (cluster, offset, bytes) in patches {
        let at = (*cluster * CLUSTER) as usize + offset;
        data[at..at + bytes.len()].copy_from_slice(bytes);
    }
    let file = tempfile::NamedTempFile::new().expect("temp image");
    std::fs::write(file.path(), &data).expect("write image");
    file
}

const JPEG: &[u8] = &[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9];

#[test]
fn test_scan_translates_to_absolute_offsets() {
    let file = image_with(4, &[(2, 10, JPEG)]);
    let reader = DiskReader::open(file.path()).expect("open");

    let report = scan_free_space(&reader, &[1, 2, 3], CLUSTER, &ScanConfig::default(), None);

    assert_eq!(report.clusters_scanned, 3);
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].range.start, 2 * CLUSTER + 10);
    assert_eq!(report.artifacts[0].range.end, 2 * CLUSTER + 16);
}

#[test]
fn test_sequence_numbers_follow_start_offset() {
    let file = image_with(6, &[(4, 0, JPEG), (1, 100, JPEG), (2, 7, JPEG)]);
    let reader = DiskReader::open(file.path()).expect("open");

    let report = scan_free_space(
        &reader,
        &[1, 2, 4, 5],
        CLUSTER,
        &ScanConfig::default(),
        None,
    );

    let starts: Vec<_> = report.artifacts.iter().map(|a| a.range.start).collect();
    assert_eq!(starts, vec![CLUSTER + 100, 2 * CLUSTER + 7, 4 * CLUSTER]);
    for (i, artifact) in report.artifacts.iter().enumerate() {
        assert_eq!(artifact.sequence, i);
    }
}

#[test]
fn test_allocated_clusters_not_scanned() {
    // Same layout, but the cluster holding the match is not in the free
    // list, so nothing is found.
    let file = image_with(4, &[(2, 10, JPEG)]);
    let reader = DiskReader::open(file.path()).expect("open");

    let report = scan_free_space(&reader, &[0, 1, 3], CLUSTER, &ScanConfig::default(), None);
    assert!(report.artifacts.is_empty());
}

#[test]
fn test_short_read_at_device_end_still_scanned() {
    let file = image_with(4, &[(3, 20, JPEG)]);
    // Truncate mid-cluster, keeping the match inside the surviving half.
    let full = std::fs::read(file.path()).expect("read");
    std::fs::write(file.path(), &full[..(3 * CLUSTER + 256) as usize]).expect("truncate");

    let reader = DiskReader::open(file.path()).expect("open");
    let report = scan_free_space(&reader, &[3], CLUSTER, &ScanConfig::default(), None);

    assert!(report.skipped.is_empty());
    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].range.start, 3 * CLUSTER + 20);
}

#[test]
fn test_cross_cluster_artifact_not_recovered() {
    // Header at the tail of cluster 1, footer at the head of cluster 2:
    // each window is carved independently, so the pair never matches.
    let file = image_with(4, &[(1, 510, &[0xFF, 0xD8]), (2, 0, &[0xFF, 0xD9])]);
    let reader = DiskReader::open(file.path()).expect("open");

    let report = scan_free_space(&reader, &[1, 2], CLUSTER, &ScanConfig::default(), None);
    assert!(report.artifacts.is_empty());
}

#[test]
fn test_window_override_spans_clusters() {
    // With a two-cluster window the same split pair is recovered.
    let file = image_with(4, &[(1, 510, &[0xFF, 0xD8]), (2, 0, &[0xFF, 0xD9])]);
    let reader = DiskReader::open(file.path()).expect("open");

    let config = ScanConfig {
        window: Some(2 * CLUSTER),
        ..ScanConfig::default()
    };
    let report = scan_free_space(&reader, &[1, 2], CLUSTER, &config, None);

    assert_eq!(report.artifacts.len(), 1);
    assert_eq!(report.artifacts[0].range.start, CLUSTER + 510);
    assert_eq!(report.artifacts[0].range.end, 2 * CLUSTER + 2);
}

#[test]
fn test_progress_reported_per_cluster() {
    let file = image_with(4, &[]);
    let reader = DiskReader::open(file.path()).expect("open");

    let calls = AtomicUsize::new(0);
    let progress = |_current: usize, total: usize| {
        assert_eq!(total, 3);
        calls.fetch_add(1, Ordering::Relaxed);
    };

    scan_free_space(&reader, &[0, 1, 2], CLUSTER, &ScanConfig::default(), Some(&progress));
    assert_eq!(calls.load(Ordering::Relaxed), 3);
}
