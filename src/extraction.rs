use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::warn;

use crate::io::DiskReader;
use crate::types::CarvedArtifact;

const COPY_CHUNK: usize = 1024 * 1024;

pub struct ExtractionReport {
    pub extracted: Vec<PathBuf>,
    pub failed: usize,
}

/// Persists every carved artifact to `output_dir`. A failed write loses
/// that one artifact; the rest are still written.
pub fn extract_all(
    artifacts: &[CarvedArtifact],
    reader: &DiskReader,
    output_dir: &Path,
) -> io::Result<ExtractionReport> {
    fs::create_dir_all(output_dir)?;

    let mut extracted = Vec::with_capacity(artifacts.len());
    let mut failed = 0;

    for artifact in artifacts {
        let filename = artifact_filename(artifact.sequence);
        let output_path = output_dir.join(&filename);

        match extract_single(artifact, reader, &output_path) {
            Ok(()) => extracted.push(output_path),
            Err(e) => {
                warn!("failed to extract {}: {}", filename, e);
                failed += 1;
            }
        }
    }

    Ok(ExtractionReport { extracted, failed })
}

pub fn extract_single(
    artifact: &CarvedArtifact,
    reader: &DiskReader,
    output_path: &Path,
) -> io::Result<()> {
    let mut out = File::create(output_path)?;
    let mut buffer = vec![0u8; COPY_CHUNK];

    let mut offset = artifact.range.start;
    while offset < artifact.range.end {
        let remaining = (artifact.range.end - offset) as usize;
        let want = remaining.min(COPY_CHUNK);

        let n = reader.read_at(offset, &mut buffer[..want])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("device ended at offset {}", offset),
            ));
        }

        out.write_all(&buffer[..n])?;
        offset += n as u64;
    }

    out.sync_all()?;
    Ok(())
}

pub fn artifact_filename(sequence: usize) -> String {
    format!("recovered_{}.jpg", sequence)
}
