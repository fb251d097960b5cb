mod common;

use common::ExtImageBuilder;
use relic::allocation::collect_allocation;
use relic::catalog::ExtentCatalog;
use relic::ext::ExtCatalog;
use relic::io::DiskReader;
use relic::scan::scan_free_space;
use relic::types::ScanConfig;
use relic::extraction;

const LIVE_JPEG: &[u8] = &[0xFF, 0xD8, 0x10, 0x20, 0xFF, 0xD9];
const DELETED_JPEG: &[u8] = &[0xFF, 0xD8, 0xDE, 0xAD, 0xBE, 0xEF, 0xFF, 0xD9];

#[test]
fn test_end_to_end_recovery() {
    let mut image = ExtImageBuilder::new();

    // A live file owns blocks 20-21 and contains a JPEG of its own;
    // that one must not be carved.
    image.add_blockmap_file(11, &[20, 21]);
    image.put_bytes(20, 0, LIVE_JPEG);

    // A deleted image's bytes sit in unreferenced block 33.
    image.put_bytes(33, 128, DELETED_JPEG);

    let device = tempfile::NamedTempFile::new().expect("temp image");
    image.write_to(device.path());

    let reader = DiskReader::open(device.path()).expect("open");
    let catalog = ExtCatalog::open(&reader).expect("catalog");

    let (map, report) = collect_allocation(&catalog).expect("allocation");
    assert_eq!(report.files_indexed, 1);
    assert!(map.contains(20));
    assert!(map.contains(21));
    assert!(!map.contains(33));

    let free: Vec<_> = map.free_clusters().collect();
    let scan_report = scan_free_space(
        &reader,
        &free,
        catalog.cluster_size(),
        &ScanConfig::default(),
        None,
    );

    assert_eq!(scan_report.artifacts.len(), 1);
    let artifact = scan_report.artifacts[0];
    assert_eq!(artifact.sequence, 0);
    assert_eq!(
        artifact.range.start,
        33 * catalog.cluster_size() + 128
    );

    let out = tempfile::tempdir().expect("output dir");
    let extraction = extraction::extract_all(&scan_report.artifacts, &reader, out.path())
        .expect("extract");

    assert_eq!(extraction.failed, 0);
    let recovered = std::fs::read(out.path().join("recovered_0.jpg")).expect("read recovered");
    assert_eq!(recovered, DELETED_JPEG);
}

#[test]
fn test_two_deleted_images_numbered_by_offset() {
    let mut image = ExtImageBuilder::new();
    image.add_blockmap_file(11, &[20]);
    image.put_bytes(50, 0, DELETED_JPEG);
    image.put_bytes(34, 7, DELETED_JPEG);

    let device = tempfile::NamedTempFile::new().expect("temp image");
    image.write_to(device.path());

    let reader = DiskReader::open(device.path()).expect("open");
    let catalog = ExtCatalog::open(&reader).expect("catalog");

    let (map, _) = collect_allocation(&catalog).expect("allocation");
    let free: Vec<_> = map.free_clusters().collect();
    let scan_report = scan_free_space(
        &reader,
        &free,
        catalog.cluster_size(),
        &ScanConfig::default(),
        None,
    );

    assert_eq!(scan_report.artifacts.len(), 2);
    assert_eq!(scan_report.artifacts[0].sequence, 0);
    assert_eq!(
        scan_report.artifacts[0].range.start,
        34 * catalog.cluster_size() + 7
    );
    assert_eq!(scan_report.artifacts[1].sequence, 1);
    assert_eq!(
        scan_report.artifacts[1].range.start,
        50 * catalog.cluster_size()
    );
}
