pub mod allocation;
pub mod carving;
pub mod catalog;
pub mod devices;
pub mod error;
pub mod ext;
pub mod extraction;
pub mod io;
pub mod scan;
pub mod types;

pub use allocation::{collect_allocation, AllocationMap, BuildOutcome, CatalogReport};
pub use carving::SignatureCarver;
pub use catalog::{ExtentCatalog, FileHandle};
pub use error::{CatalogError, RecoveryError};
pub use types::{ByteRange, CarvedArtifact, ClusterAddress, Extent, Offset, ScanConfig};
