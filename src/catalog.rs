use crate::error::CatalogError;
use crate::types::Extent;

/// Opaque handle to one live file in the filesystem metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle {
    /// Inode number or equivalent identifier.
    pub id: u64,
}

/// Supplies cluster extents for every live file, plus the geometry the
/// allocation pass needs. Implemented per filesystem family; the scan
/// pipeline only sees this boundary.
pub trait ExtentCatalog {
    /// Handles for all live files whose extents count as allocated.
    fn files(&self) -> Result<Vec<FileHandle>, CatalogError>;

    /// Cluster extents occupied by one file. A failure here is per-file:
    /// the caller omits the file and keeps going.
    fn extents_of(&self, file: FileHandle) -> Result<Vec<Extent>, CatalogError>;

    /// Bytes per cluster.
    fn cluster_size(&self) -> u64;

    /// Total clusters in the filesystem's address space.
    fn total_clusters(&self) -> u64;
}
