pub type ClusterAddress = u64;
pub type Offset = u64;

/// JPEG start-of-image marker.
pub const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// A contiguous run of clusters owned by one live file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start: ClusterAddress,
    pub length: u64,
}

impl Extent {
    pub fn new(start: ClusterAddress, length: u64) -> Self {
        Self { start, length }
    }

    /// One-past-the-end cluster address, saturating rather than wrapping
    /// on hostile metadata.
    pub fn end(&self) -> ClusterAddress {
        self.start.saturating_add(self.length)
    }
}

/// Device-absolute byte range of one carved artifact candidate.
/// Invariant: `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: Offset,
    pub end: Offset,
}

impl ByteRange {
    pub fn new(start: Offset, end: Offset) -> Self {
        debug_assert!(end > start);
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }
}

/// A matched byte range plus its assigned output sequence number.
/// Created by the scanner, consumed exactly once by the artifact writer.
#[derive(Debug, Clone, Copy)]
pub struct CarvedArtifact {
    pub sequence: usize,
    pub range: ByteRange,
}

/// Signature and window configuration consumed by the scan pipeline.
///
/// `window` overrides the number of bytes read per free cluster; when
/// `None` the scanner reads exactly one cluster. Keeping the unit
/// explicit avoids tying the read size to total filesystem geometry.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub header: Vec<u8>,
    pub footer: Vec<u8>,
    pub window: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            header: JPEG_SOI.to_vec(),
            footer: JPEG_EOI.to_vec(),
            window: None,
        }
    }
}

impl ScanConfig {
    pub fn window_for(&self, cluster_size: u64) -> u64 {
        self.window.unwrap_or(cluster_size)
    }
}
