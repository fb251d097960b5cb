use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::RecoveryError;

#[cfg(target_os = "linux")]
fn block_device_size(file: &File) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    const BLKGETSIZE64: libc::c_ulong = 0x80081272;

    let mut size: u64 = 0;
    let result = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(size)
    }
}

#[cfg(not(target_os = "linux"))]
fn block_device_size(_file: &File) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}

/// Read-only random-access reader over a block device or image file.
///
/// Reads are positioned (`pread`-style), so one handle can serve
/// concurrent scan workers without a shared cursor.
pub struct DiskReader {
    file: File,
    size: u64,
}

impl DiskReader {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RecoveryError> {
        let path = path.as_ref();
        Self::open_inner(path).map_err(|source| RecoveryError::DeviceOpen {
            path: PathBuf::from(path),
            source,
        })
    }

    fn open_inner(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;

        // Regular files report their length; device nodes report 0 and
        // need the ioctl or a seek to the end.
        let mut size = file.metadata()?.len();

        if size == 0 {
            if let Ok(device_size) = block_device_size(&file) {
                size = device_size;
            }
        }

        if size == 0 {
            let mut file = file;
            size = file.seek(SeekFrom::End(0))?;
            file.seek(SeekFrom::Start(0))?;
            return Ok(Self { file, size });
        }

        Ok(Self { file, size })
    }

    /// Reads up to `buf.len()` bytes at `offset`. Returns the number of
    /// bytes read; short counts happen at end of device.
    #[cfg(unix)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::unix::fs::FileExt;
        self.file.read_at(buf, offset)
    }

    #[cfg(windows)]
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        use std::os::windows::fs::FileExt;
        self.file.seek_read(buf, offset)
    }

    /// Reads exactly `buf.len()` bytes at `offset`, retrying short reads.
    pub fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read_at(offset + filled as u64, &mut buf[filled..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("short read at offset {}", offset + filled as u64),
                    ))
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }
}
