mod metadata;
mod mmap;
mod stack;

pub use metadata::TiffMetadata;
pub use mmap::{read_mmap, write_mmap, MmapLayout, MmapOrder};
pub use stack::{read_stack, write_stack, PixelSize};
