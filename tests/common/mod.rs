//! Synthetic ext2-style image fixture shared by the catalog and
//! end-to-end tests.
//!
//! Geometry: 64 blocks of 1024 bytes, one group, 16 inodes of 128
//! bytes. Superblock in block 1, group descriptors in block 2, inode
//! bitmap in block 3, inode table in blocks 4-5.

// Not every test binary uses every helper.
#![allow(dead_code)]

pub const BLOCK_SIZE: usize = 1024;
pub const BLOCK_COUNT: usize = 64;
pub const INODE_COUNT: u32 = 16;
pub const INODE_SIZE: usize = 128;

pub const INODE_BITMAP_BLOCK: usize = 3;
pub const INODE_TABLE_BLOCK: usize = 4;

const EXT_SUPER_MAGIC: u16 = 0xEF53;
const EXTENT_MAGIC: u16 = 0xF30A;
const EXTENTS_FL: u32 = 0x8_0000;

pub struct ExtImageBuilder {
    data: Vec<u8>,
}

impl ExtImageBuilder {
    pub fn new() -> Self {
        let mut data = vec![0u8; BLOCK_SIZE * BLOCK_COUNT];

        // Superblock at byte 1024.
        let sb = 1024;
        put_u32(&mut data, sb, INODE_COUNT);
        put_u32(&mut data, sb + 4, BLOCK_COUNT as u32);
        put_u32(&mut data, sb + 20, 1); // first_data_block
        put_u32(&mut data, sb + 24, 0); // log_block_size -> 1024
        put_u32(&mut data, sb + 32, BLOCK_COUNT as u32); // blocks_per_group
        put_u32(&mut data, sb + 40, INODE_COUNT); // inodes_per_group
        put_u16(&mut data, sb + 56, EXT_SUPER_MAGIC);
        put_u16(&mut data, sb + 88, INODE_SIZE as u16);

        // One group descriptor in block 2.
        let gd = 2 * BLOCK_SIZE;
        put_u32(&mut data, gd + 0x04, INODE_BITMAP_BLOCK as u32);
        put_u32(&mut data, gd + 0x08, INODE_TABLE_BLOCK as u32);

        Self { data }
    }

    fn inode_offset(&self, ino: u32) -> usize {
        INODE_TABLE_BLOCK * BLOCK_SIZE + (ino as usize - 1) * INODE_SIZE
    }

    fn mark_in_use(&mut self, ino: u32) {
        let index = (ino - 1) as usize;
        self.data[INODE_BITMAP_BLOCK * BLOCK_SIZE + index / 8] |= 1 << (index % 8);
    }

    /// Adds a regular file whose data lives in the given blocks, via the
    /// classic direct block map.
    pub fn add_blockmap_file(&mut self, ino: u32, blocks: &[u32]) {
        assert!(blocks.len() <= 12, "direct pointers only");
        self.mark_in_use(ino);

        let at = self.inode_offset(ino);
        put_u16(&mut self.data, at, 0o100644);
        put_u32(&mut self.data, at + 4, (blocks.len() * BLOCK_SIZE) as u32);
        put_u16(&mut self.data, at + 0x1A, 1); // links_count
        for (i, &block) in blocks.iter().enumerate() {
            put_u32(&mut self.data, at + 0x28 + i * 4, block);
        }
    }

    /// Adds a regular file described by a depth-0 extent tree rooted in
    /// the inode.
    pub fn add_extent_file(&mut self, ino: u32, start: u32, length: u16) {
        self.mark_in_use(ino);

        let at = self.inode_offset(ino);
        put_u16(&mut self.data, at, 0o100644);
        put_u32(&mut self.data, at + 4, length as u32 * BLOCK_SIZE as u32);
        put_u16(&mut self.data, at + 0x1A, 1);
        put_u32(&mut self.data, at + 0x20, EXTENTS_FL);

        let root = at + 0x28;
        put_u16(&mut self.data, root, EXTENT_MAGIC);
        put_u16(&mut self.data, root + 2, 1); // entries
        put_u16(&mut self.data, root + 4, 4); // max
        put_u16(&mut self.data, root + 6, 0); // depth

        let leaf = root + 12;
        put_u32(&mut self.data, leaf, 0); // logical block
        put_u16(&mut self.data, leaf + 4, length);
        put_u16(&mut self.data, leaf + 6, 0); // start_hi
        put_u32(&mut self.data, leaf + 8, start);
    }

    /// Writes raw bytes into a block's content area.
    pub fn put_bytes(&mut self, block: usize, offset: usize, bytes: &[u8]) {
        let at = block * BLOCK_SIZE + offset;
        self.data[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn write_to(&self, path: &std::path::Path) {
        std::fs::write(path, &self.data).expect("write fixture image");
    }
}

fn put_u16(data: &mut [u8], at: usize, v: u16) {
    data[at..at + 2].copy_from_slice(&v.to_le_bytes());
}

fn put_u32(data: &mut [u8], at: usize, v: u32) {
    data[at..at + 4].copy_from_slice(&v.to_le_bytes());
}
