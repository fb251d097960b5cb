use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::warn;
use rayon::prelude::*;

use crate::carving::SignatureCarver;
use crate::io::DiskReader;
use crate::types::{ByteRange, CarvedArtifact, ClusterAddress, ScanConfig};

/// A free cluster the scan had to give up on.
#[derive(Debug)]
pub struct SkippedCluster {
    pub cluster: ClusterAddress,
    pub error: io::Error,
}

pub struct ScanReport {
    pub artifacts: Vec<CarvedArtifact>,
    pub clusters_scanned: usize,
    pub skipped: Vec<SkippedCluster>,
}

/// Scans the byte content of every free cluster for signature matches.
///
/// Clusters are read through positioned reads and carved in parallel;
/// the carver is pure per invocation so the only ordering requirement
/// is the final sort by start offset, which makes artifact numbering
/// reproducible regardless of worker completion order. A failed read
/// skips that one cluster and the scan continues.
pub fn scan_free_space(
    reader: &DiskReader,
    free_clusters: &[ClusterAddress],
    cluster_size: u64,
    config: &ScanConfig,
    progress: Option<&(dyn Fn(usize, usize) + Sync)>,
) -> ScanReport {
    let carver = SignatureCarver::new(config.header.clone(), config.footer.clone());
    let window = config.window_for(cluster_size) as usize;
    let total = free_clusters.len();
    let done = AtomicUsize::new(0);

    let per_cluster: Vec<_> = free_clusters
        .par_iter()
        .map(|&cluster| {
            let result = scan_one_cluster(reader, cluster, cluster_size, window, &carver);

            if let Some(cb) = progress {
                cb(done.fetch_add(1, Ordering::Relaxed) + 1, total);
            }

            (cluster, result)
        })
        .collect();

    let mut artifacts = Vec::new();
    let mut skipped = Vec::new();
    let mut clusters_scanned = 0;

    for (cluster, result) in per_cluster {
        match result {
            Ok(ranges) => {
                clusters_scanned += 1;
                artifacts.extend(ranges);
            }
            Err(error) => {
                warn!("skipping cluster {}: {}", cluster, error);
                skipped.push(SkippedCluster { cluster, error });
            }
        }
    }

    artifacts.sort_unstable_by_key(|r| (r.start, r.end));
    artifacts.dedup();

    ScanReport {
        artifacts: artifacts
            .into_iter()
            .enumerate()
            .map(|(sequence, range)| CarvedArtifact { sequence, range })
            .collect(),
        clusters_scanned,
        skipped,
    }
}

fn scan_one_cluster(
    reader: &DiskReader,
    cluster: ClusterAddress,
    cluster_size: u64,
    window: usize,
    carver: &SignatureCarver,
) -> io::Result<Vec<ByteRange>> {
    let offset = cluster * cluster_size;
    let mut buffer = vec![0u8; window];

    // Short reads at the end of the device are fine: carve whatever
    // arrived. Only a hard I/O error skips the cluster.
    let mut filled = 0;
    while filled < window {
        match reader.read_at(offset + filled as u64, &mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }

    Ok(carver.carve(&buffer[..filled], offset))
}
