use log::warn;

use crate::catalog::{ExtentCatalog, FileHandle};
use crate::error::CatalogError;
use crate::types::{ClusterAddress, Extent};

/// Set of cluster addresses referenced by live filesystem metadata.
/// Immutable once built; the free set is always derived from it by
/// complement so the two can never drift apart.
pub struct AllocationMap {
    words: Vec<u64>,
    total_clusters: u64,
}

/// Result of one build pass: the map plus the extents that were rejected
/// as out of range.
pub struct BuildOutcome {
    pub map: AllocationMap,
    pub rejected: Vec<Extent>,
}

impl AllocationMap {
    /// Builds the allocated set from an extent sequence. Extents that
    /// reach outside `[0, total_clusters)` are rejected whole and
    /// reported in the outcome; the build continues without them.
    /// Overlapping extents union idempotently.
    pub fn build(
        extents: impl IntoIterator<Item = Extent>,
        total_clusters: u64,
    ) -> BuildOutcome {
        let words = vec![0u64; total_clusters.div_ceil(64) as usize];
        let mut map = AllocationMap {
            words,
            total_clusters,
        };
        let mut rejected = Vec::new();

        for extent in extents {
            if extent.length == 0 || extent.end() > total_clusters {
                warn!(
                    "rejecting out-of-range extent [{}, {}) over {} clusters",
                    extent.start,
                    extent.end(),
                    total_clusters
                );
                rejected.push(extent);
                continue;
            }

            for cluster in extent.start..extent.end() {
                map.words[(cluster / 64) as usize] |= 1u64 << (cluster % 64);
            }
        }

        BuildOutcome { map, rejected }
    }

    #[inline]
    pub fn contains(&self, cluster: ClusterAddress) -> bool {
        cluster < self.total_clusters
            && self.words[(cluster / 64) as usize] & (1u64 << (cluster % 64)) != 0
    }

    #[inline]
    pub fn total_clusters(&self) -> u64 {
        self.total_clusters
    }

    pub fn allocated_count(&self) -> u64 {
        self.words.iter().map(|w| w.count_ones() as u64).sum()
    }

    pub fn free_count(&self) -> u64 {
        self.total_clusters - self.allocated_count()
    }

    /// Ascending enumeration of every cluster not in the map. This is
    /// the complement of the same bitmap, never an independent
    /// computation, so the two sets partition the address space exactly.
    pub fn free_clusters(&self) -> impl Iterator<Item = ClusterAddress> + '_ {
        (0..self.total_clusters).filter(move |&c| !self.contains(c))
    }
}

/// Per-file accounting for one catalog drain.
#[derive(Default)]
pub struct CatalogReport {
    pub files_indexed: usize,
    pub failed_files: Vec<(FileHandle, CatalogError)>,
    pub rejected_extents: usize,
}

/// Drains the extent catalog into an allocation map. A file whose extent
/// retrieval fails is omitted and recorded; the run keeps going with
/// whatever the remaining files yield. The map may therefore under-report
/// allocated space, which trades precision for recall in the later scan.
pub fn collect_allocation(
    catalog: &dyn ExtentCatalog,
) -> Result<(AllocationMap, CatalogReport), CatalogError> {
    let mut report = CatalogReport::default();
    let mut extents = Vec::new();

    for file in catalog.files()? {
        match catalog.extents_of(file) {
            Ok(runs) => {
                report.files_indexed += 1;
                extents.extend(runs);
            }
            Err(e) => {
                warn!("skipping file {}: {}", file.id, e);
                report.failed_files.push((file, e));
            }
        }
    }

    let outcome = AllocationMap::build(extents, catalog.total_clusters());
    report.rejected_extents = outcome.rejected.len();

    Ok((outcome.map, report))
}
