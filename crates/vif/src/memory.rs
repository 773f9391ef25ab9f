//! Memory visible to the DMA controller.
use easyerr::{Error, ResultExt};
use std::path::Path;
use util::boxed_array;
use zerocopy::IntoBytes;

pub const RAM_LEN: usize = 32 * bytesize::MIB as usize;
pub const SCRATCHPAD_LEN: usize = 16 * bytesize::KIB as usize;

const RAM_WORDS: usize = RAM_LEN / 4;
const SCRATCHPAD_WORDS: usize = SCRATCHPAD_LEN / 4;

/// Address bit selecting the scratchpad.
pub const SPR_BIT: u32 = 1 << 31;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("image of {len} bytes does not fit at {base:#010X}")]
    OutOfBounds { base: u32, len: usize },
    #[error(transparent)]
    Io { source: std::io::Error },
}

enum Region {
    Ram,
    Scratchpad,
}

impl Region {
    /// Region of `addr` and the word offset into it, quadword aligned.
    fn of(addr: u32) -> Option<(Self, usize)> {
        if addr & SPR_BIT != 0 {
            return Some((Self::Scratchpad, (addr & 0x3FF0) as usize / 4));
        }

        let offset = (addr & 0x1FFF_FFF0) as usize;
        (offset < RAM_LEN).then_some((Self::Ram, offset / 4))
    }
}

/// Main memory and scratchpad.
pub struct Memory {
    ram: Box<[u32; RAM_WORDS]>,
    scratchpad: Box<[u32; SCRATCHPAD_WORDS]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Self {
            ram: boxed_array(0),
            scratchpad: boxed_array(0),
        }
    }

    /// The words from the quadword containing `addr` to the end of its region.
    pub fn resolve(&self, addr: u32) -> Option<&[u32]> {
        let (region, offset) = Region::of(addr)?;
        Some(match region {
            Region::Ram => &self.ram[offset..],
            Region::Scratchpad => &self.scratchpad[offset..],
        })
    }

    fn resolve_mut(&mut self, addr: u32) -> Option<&mut [u32]> {
        let (region, offset) = Region::of(addr)?;
        Some(match region {
            Region::Ram => &mut self.ram[offset..],
            Region::Scratchpad => &mut self.scratchpad[offset..],
        })
    }

    /// Writes `words` starting at the quadword containing `addr`.
    pub fn write_words(&mut self, addr: u32, words: &[u32]) -> Result<(), LoadError> {
        let out_of_bounds = LoadError::OutOfBounds {
            base: addr,
            len: words.len() * 4,
        };

        let Some(region) = self.resolve_mut(addr) else {
            return Err(out_of_bounds);
        };

        match region.get_mut(..words.len()) {
            Some(dst) => {
                dst.copy_from_slice(words);
                Ok(())
            }
            None => Err(out_of_bounds),
        }
    }

    /// Loads a raw little-endian image into main memory at byte offset `base`.
    pub fn load(&mut self, path: &Path, base: u32) -> Result<(), LoadError> {
        let image = std::fs::read(path).context(LoadCtx::Io)?;
        let len = image.len();

        let start = base as usize;
        let bytes = self.ram.as_mut_bytes();
        let Some(dst) = start
            .checked_add(len)
            .and_then(|end| bytes.get_mut(start..end))
        else {
            return Err(LoadError::OutOfBounds { base, len });
        };

        dst.copy_from_slice(&image);
        tracing::debug!(len, base, "loaded memory image");

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn regions() {
        let mut mem = Memory::new();
        mem.write_words(0x100, &[1, 2, 3, 4]).unwrap();
        mem.write_words(SPR_BIT | 0x3FF0, &[5, 6, 7, 8]).unwrap();

        assert_eq!(&mem.resolve(0x100).unwrap()[..4], &[1, 2, 3, 4]);
        assert_eq!(&mem.resolve(0x108).unwrap()[..4], &[1, 2, 3, 4]);
        assert_eq!(mem.resolve(SPR_BIT | 0x3FF0).unwrap(), &[5, 6, 7, 8]);
        assert_eq!(mem.resolve(SPR_BIT | 0x7FF0).unwrap(), &[5, 6, 7, 8]);

        assert!(mem.resolve(RAM_LEN as u32).is_none());
        assert!(mem.resolve(0x2000_0000).is_some());
    }

    #[test]
    fn writes_out_of_bounds() {
        let mut mem = Memory::new();
        assert!(matches!(
            mem.write_words(SPR_BIT | 0x3FF0, &[0; 8]),
            Err(LoadError::OutOfBounds { len: 32, .. })
        ));
        assert!(mem.write_words(RAM_LEN as u32, &[0]).is_err());
    }

    #[test]
    fn load_missing_file() {
        let mut mem = Memory::new();
        let result = mem.load(Path::new("/nonexistent/image.bin"), 0);
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }
}
