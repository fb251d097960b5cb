//! ext2/3/4 metadata provider.
//!
//! Walks the superblock, group descriptors, inode bitmaps and per-inode
//! block references to produce the cluster extents of every live file.
//! Only the fields the allocation pass needs are parsed.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::catalog::{ExtentCatalog, FileHandle};
use crate::error::CatalogError;
use crate::io::DiskReader;
use crate::types::Extent;

const EXT_SUPER_MAGIC: u16 = 0xEF53;
pub const SUPERBLOCK_OFFSET: u64 = 1024;
pub const SUPERBLOCK_SIZE: usize = 1024;

const INCOMPAT_64BIT: u32 = 0x80;
const EXTENTS_FL: u32 = 0x8_0000;
const EXTENT_MAGIC: u16 = 0xF30A;
const EXTENT_ENTRY_SIZE: usize = 12;
/// ee_len values above this mark unwritten extents; the run length is
/// the value minus the flag.
const EXTENT_UNWRITTEN: u16 = 32768;

const S_IFMT: u16 = 0o170000;
const S_IFLNK: u16 = 0o120000;
/// Symlink targets shorter than this live inline in i_block.
const FAST_SYMLINK_MAX: u32 = 60;

#[derive(Debug, Clone)]
pub struct ExtSuperblock {
    pub inode_count: u32,
    pub block_count: u64,
    pub first_data_block: u32,
    pub block_size: u32,
    pub blocks_per_group: u32,
    pub inodes_per_group: u32,
    pub magic: u16,
    pub inode_size: u16,
    pub feature_incompat: u32,
    pub desc_size: u16,
}

impl ExtSuperblock {
    pub fn parse(data: &[u8]) -> Result<Self, CatalogError> {
        if data.len() < SUPERBLOCK_SIZE {
            return Err(CatalogError::InvalidSuperblock(
                "superblock too small".to_string(),
            ));
        }

        let mut cursor = Cursor::new(data);
        let read_err = |e: std::io::Error| CatalogError::InvalidSuperblock(e.to_string());

        let inode_count = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let block_count_lo = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(20);
        let first_data_block = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let log_block_size = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
        let block_size = 1024u32 << log_block_size;

        cursor.set_position(32);
        let blocks_per_group = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(40);
        let inodes_per_group = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(56);
        let magic = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(88);
        let inode_size = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(96);
        let feature_incompat = cursor.read_u32::<LittleEndian>().map_err(read_err)?;

        cursor.set_position(254);
        let desc_size_raw = cursor.read_u16::<LittleEndian>().map_err(read_err)?;

        let has_64bit = feature_incompat & INCOMPAT_64BIT != 0;
        let desc_size = if has_64bit && desc_size_raw >= 64 {
            desc_size_raw
        } else {
            32
        };

        let block_count = if has_64bit {
            cursor.set_position(336);
            let hi = cursor.read_u32::<LittleEndian>().map_err(read_err)?;
            (hi as u64) << 32 | block_count_lo as u64
        } else {
            block_count_lo as u64
        };

        Ok(Self {
            inode_count,
            block_count,
            first_data_block,
            block_size,
            blocks_per_group,
            inodes_per_group,
            magic,
            inode_size,
            feature_incompat,
            desc_size,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.magic == EXT_SUPER_MAGIC
            && self.block_size >= 1024
            && self.block_size <= 65536
            && self.inode_size >= 128
            && self.inodes_per_group > 0
            && self.blocks_per_group > 0
    }

    pub fn has_64bit(&self) -> bool {
        self.feature_incompat & INCOMPAT_64BIT != 0
    }

    pub fn group_count(&self) -> u64 {
        let data_blocks = self.block_count.saturating_sub(self.first_data_block as u64);
        data_blocks.div_ceil(self.blocks_per_group as u64).max(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct GroupDescriptor {
    inode_bitmap: u64,
    inode_table: u64,
}

impl GroupDescriptor {
    fn parse(data: &[u8], has_64bit: bool) -> Self {
        let le_u32 = |off: usize| {
            u32::from_le_bytes(data[off..off + 4].try_into().expect("descriptor bounds"))
        };

        let bitmap_lo = le_u32(0x04) as u64;
        let table_lo = le_u32(0x08) as u64;

        let (bitmap_hi, table_hi) = if has_64bit && data.len() >= 0x2C {
            (le_u32(0x24) as u64, le_u32(0x28) as u64)
        } else {
            (0, 0)
        };

        Self {
            inode_bitmap: bitmap_hi << 32 | bitmap_lo,
            inode_table: table_hi << 32 | table_lo,
        }
    }
}

/// Live-file extent catalog over an ext2/3/4 partition.
pub struct ExtCatalog<'a> {
    device: &'a DiskReader,
    superblock: ExtSuperblock,
    groups: Vec<GroupDescriptor>,
}

impl<'a> ExtCatalog<'a> {
    pub fn open(device: &'a DiskReader) -> Result<Self, CatalogError> {
        let mut data = vec![0u8; SUPERBLOCK_SIZE];
        device
            .read_exact_at(SUPERBLOCK_OFFSET, &mut data)
            .map_err(|e| CatalogError::ReadError(e.to_string()))?;

        let superblock = ExtSuperblock::parse(&data)?;
        if superblock.magic != EXT_SUPER_MAGIC {
            return Err(CatalogError::NoFileSystem);
        }
        if !superblock.is_valid() {
            return Err(CatalogError::InvalidSuperblock(
                "implausible geometry".to_string(),
            ));
        }

        let groups = Self::read_group_descriptors(device, &superblock)?;

        Ok(Self {
            device,
            superblock,
            groups,
        })
    }

    pub fn superblock(&self) -> &ExtSuperblock {
        &self.superblock
    }

    fn read_group_descriptors(
        device: &DiskReader,
        sb: &ExtSuperblock,
    ) -> Result<Vec<GroupDescriptor>, CatalogError> {
        // The descriptor table starts in the block after the superblock.
        let table_block = sb.first_data_block as u64 + 1;
        let table_offset = table_block * sb.block_size as u64;
        let count = sb.group_count() as usize;
        let desc_size = sb.desc_size as usize;

        let mut data = vec![0u8; count * desc_size];
        device
            .read_exact_at(table_offset, &mut data)
            .map_err(|e| CatalogError::ReadError(e.to_string()))?;

        Ok(data
            .chunks_exact(desc_size)
            .map(|chunk| GroupDescriptor::parse(chunk, sb.has_64bit()))
            .collect())
    }

    fn read_block(&self, block: u64) -> Result<Vec<u8>, CatalogError> {
        let size = self.superblock.block_size as usize;
        let mut data = vec![0u8; size];
        self.device
            .read_exact_at(block * size as u64, &mut data)
            .map_err(|e| CatalogError::ReadError(e.to_string()))?;
        Ok(data)
    }

    fn read_inode(&self, ino: u64) -> Result<Vec<u8>, CatalogError> {
        if ino == 0 || ino > self.superblock.inode_count as u64 {
            return Err(CatalogError::CorruptedMetadata(format!(
                "inode {} out of range",
                ino
            )));
        }

        let per_group = self.superblock.inodes_per_group as u64;
        let group = ((ino - 1) / per_group) as usize;
        let index = (ino - 1) % per_group;

        let desc = self.groups.get(group).ok_or_else(|| {
            CatalogError::CorruptedMetadata(format!("inode {} in missing group {}", ino, group))
        })?;

        let inode_size = self.superblock.inode_size as u64;
        let offset =
            desc.inode_table * self.superblock.block_size as u64 + index * inode_size;

        let mut data = vec![0u8; inode_size as usize];
        self.device
            .read_exact_at(offset, &mut data)
            .map_err(|e| CatalogError::ReadError(e.to_string()))?;
        Ok(data)
    }

    /// Resolves one inode's block references into extents. Handles both
    /// the classic direct/indirect block map and the ext4 extent tree.
    fn inode_extents(&self, data: &[u8]) -> Result<Vec<Extent>, CatalogError> {
        let le_u16 = |off: usize| u16::from_le_bytes(data[off..off + 2].try_into().unwrap());
        let le_u32 = |off: usize| u32::from_le_bytes(data[off..off + 4].try_into().unwrap());

        let mode = le_u16(0x00);
        let size_lo = le_u32(0x04);
        let links_count = le_u16(0x1A);
        let flags = le_u32(0x20);

        if links_count == 0 {
            return Ok(Vec::new());
        }

        // Fast symlinks keep the target inline in i_block.
        if mode & S_IFMT == S_IFLNK && size_lo < FAST_SYMLINK_MAX {
            return Ok(Vec::new());
        }

        let i_block = &data[0x28..0x28 + 60];

        let mut extents = Vec::new();
        if flags & EXTENTS_FL != 0 {
            self.walk_extent_node(i_block, 0, &mut extents)?;
        } else {
            let mut blocks = Vec::new();
            self.walk_block_map(i_block, &mut blocks)?;
            coalesce_blocks(&mut blocks, &mut extents);
        }
        Ok(extents)
    }

    /// Recursive descent over an ext4 extent tree node. `node` is either
    /// the 60-byte i_block area (root) or a full block (interior/leaf).
    fn walk_extent_node(
        &self,
        node: &[u8],
        depth_guard: u8,
        out: &mut Vec<Extent>,
    ) -> Result<(), CatalogError> {
        if depth_guard > 5 {
            return Err(CatalogError::CorruptedMetadata(
                "extent tree too deep".to_string(),
            ));
        }
        if node.len() < EXTENT_ENTRY_SIZE {
            return Err(CatalogError::CorruptedMetadata(
                "truncated extent node".to_string(),
            ));
        }

        let le_u16 = |off: usize| u16::from_le_bytes(node[off..off + 2].try_into().unwrap());

        let magic = le_u16(0x00);
        let entries = le_u16(0x02) as usize;
        let depth = le_u16(0x06);

        if magic != EXTENT_MAGIC {
            return Err(CatalogError::CorruptedMetadata(format!(
                "bad extent magic {:#06x}",
                magic
            )));
        }

        let capacity = node.len() / EXTENT_ENTRY_SIZE - 1;
        if entries > capacity {
            return Err(CatalogError::CorruptedMetadata(
                "extent entry count exceeds node capacity".to_string(),
            ));
        }

        for i in 0..entries {
            let off = EXTENT_ENTRY_SIZE * (1 + i);
            let entry = &node[off..off + EXTENT_ENTRY_SIZE];
            let e_u16 =
                |o: usize| u16::from_le_bytes(entry[o..o + 2].try_into().unwrap());
            let e_u32 =
                |o: usize| u32::from_le_bytes(entry[o..o + 4].try_into().unwrap());

            if depth == 0 {
                let raw_len = e_u16(0x04);
                let len = if raw_len > EXTENT_UNWRITTEN {
                    raw_len - EXTENT_UNWRITTEN
                } else {
                    raw_len
                };
                let start = (e_u16(0x06) as u64) << 32 | e_u32(0x08) as u64;
                if len > 0 {
                    out.push(Extent::new(start, len as u64));
                }
            } else {
                let child = (e_u16(0x08) as u64) << 32 | e_u32(0x04) as u64;
                let child_data = self.read_block(child)?;
                self.walk_extent_node(&child_data, depth_guard + 1, out)?;
                // The child block itself is filesystem metadata owned by
                // this file.
                out.push(Extent::new(child, 1));
            }
        }

        Ok(())
    }

    /// Classic ext2/3 block map: 12 direct pointers plus single, double
    /// and triple indirect blocks.
    fn walk_block_map(&self, i_block: &[u8], out: &mut Vec<u64>) -> Result<(), CatalogError> {
        let le_u32 = |off: usize| u32::from_le_bytes(i_block[off..off + 4].try_into().unwrap());

        for i in 0..12 {
            let block = le_u32(i * 4) as u64;
            if block != 0 {
                out.push(block);
            }
        }

        for (slot, level) in [(12usize, 1u8), (13, 2), (14, 3)] {
            let block = le_u32(slot * 4) as u64;
            if block != 0 {
                out.push(block);
                self.walk_indirect(block, level, out)?;
            }
        }

        Ok(())
    }

    fn walk_indirect(
        &self,
        block: u64,
        level: u8,
        out: &mut Vec<u64>,
    ) -> Result<(), CatalogError> {
        let data = self.read_block(block)?;

        for chunk in data.chunks_exact(4) {
            let child = u32::from_le_bytes(chunk.try_into().unwrap()) as u64;
            if child == 0 {
                continue;
            }
            out.push(child);
            if level > 1 {
                self.walk_indirect(child, level - 1, out)?;
            }
        }

        Ok(())
    }
}

/// Collapses a block-number list into contiguous extents.
fn coalesce_blocks(blocks: &mut Vec<u64>, out: &mut Vec<Extent>) {
    blocks.sort_unstable();
    blocks.dedup();

    let mut iter = blocks.iter().copied();
    let Some(first) = iter.next() else {
        return;
    };

    let mut run = Extent::new(first, 1);
    for block in iter {
        if block == run.end() {
            run.length += 1;
        } else {
            out.push(run);
            run = Extent::new(block, 1);
        }
    }
    out.push(run);
}

impl ExtentCatalog for ExtCatalog<'_> {
    /// Every in-use inode, reserved ones included — the journal and
    /// other reserved inodes own real blocks.
    fn files(&self) -> Result<Vec<FileHandle>, CatalogError> {
        let per_group = self.superblock.inodes_per_group as u64;
        let mut files = Vec::new();

        for (group, desc) in self.groups.iter().enumerate() {
            let bitmap = self.read_block(desc.inode_bitmap)?;

            for index in 0..per_group {
                let byte = (index / 8) as usize;
                if byte >= bitmap.len() {
                    break;
                }
                if bitmap[byte] & (1 << (index % 8)) != 0 {
                    let ino = group as u64 * per_group + index + 1;
                    if ino <= self.superblock.inode_count as u64 {
                        files.push(FileHandle { id: ino });
                    }
                }
            }
        }

        Ok(files)
    }

    fn extents_of(&self, file: FileHandle) -> Result<Vec<Extent>, CatalogError> {
        let inode = self.read_inode(file.id)?;
        self.inode_extents(&inode)
    }

    fn cluster_size(&self) -> u64 {
        self.superblock.block_size as u64
    }

    fn total_clusters(&self) -> u64 {
        self.superblock.block_count
    }
}
