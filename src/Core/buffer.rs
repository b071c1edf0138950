use std::ptr;
use std::sync::Arc;

use super::error::{ChannelError, Result};
use super::SharedMemory::SharedMemoryBackend;

/// Fixed-capacity byte window inside a shared region.
///
/// Every transfer starts at offset zero of the window (the cursor is rewound
/// for each message) and is bounds-checked against the window capacity.
pub struct SharedBuffer {
    region: Arc<dyn SharedMemoryBackend>,
    offset: usize,
    capacity: usize,
}

impl SharedBuffer {
    pub fn new(region: Arc<dyn SharedMemoryBackend>, offset: usize, capacity: usize) -> Result<Self> {
        let end = offset.checked_add(capacity).ok_or(ChannelError::Overrun {
            offset,
            needed: capacity,
            capacity: region.size(),
        })?;
        if end > region.size() {
            return Err(ChannelError::Overrun {
                offset,
                needed: capacity,
                capacity: region.size(),
            });
        }
        Ok(Self {
            region,
            offset,
            capacity,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn region(&self) -> &Arc<dyn SharedMemoryBackend> {
        &self.region
    }

    fn check(&self, len: usize) -> Result<()> {
        if len > self.capacity {
            return Err(ChannelError::Overrun {
                offset: 0,
                needed: len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// Copy the first `dst.len()` bytes of the window into `dst`.
    pub fn read_into(&self, dst: &mut [u8]) -> Result<()> {
        self.check(dst.len())?;
        unsafe {
            let src = self.region.as_ptr().add(self.offset);
            ptr::copy_nonoverlapping(src as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    /// Copy `src` to the start of the window.
    pub fn write_from(&self, src: &[u8]) -> Result<()> {
        self.check(src.len())?;
        unsafe {
            let dst = self.region.as_ptr().add(self.offset);
            ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
        }
        Ok(())
    }
}
