//! Memory targets for direct status updates.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::sync::DevVAddr;

/// A block of GPU-visible memory that status values can be published into.
pub struct StatusMemory {
    base: DevVAddr,
    words: Box<[AtomicU32]>,
}

impl StatusMemory {
    /// Create a zeroed block of `len` words mapped at `base`.
    pub fn new(base: DevVAddr, len: usize) -> Self {
        let words = (0..len).map(|_| AtomicU32::new(0)).collect();
        Self { base, words }
    }

    /// Device address of the first word.
    pub fn base(&self) -> DevVAddr {
        self.base
    }

    /// Size in bytes.
    pub fn size(&self) -> u32 {
        (self.words.len() * 4) as u32
    }

    fn index(&self, addr: DevVAddr) -> Option<usize> {
        let delta = addr.0.checked_sub(self.base.0)?;
        if delta % 4 != 0 {
            return None;
        }
        let index = (delta / 4) as usize;
        (index < self.words.len()).then_some(index)
    }

    /// Whether `addr` is a word inside this block.
    pub fn contains(&self, addr: DevVAddr) -> bool {
        self.index(addr).is_some()
    }

    /// Read the word at `addr`.
    pub fn read(&self, addr: DevVAddr) -> Option<u32> {
        self.index(addr)
            .map(|index| self.words[index].load(Ordering::Acquire))
    }

    /// Write the word at `addr`. Returns `false` if `addr` is outside the
    /// block.
    pub fn write(&self, addr: DevVAddr, value: u32) -> bool {
        match self.index(addr) {
            Some(index) => {
                self.words[index].store(value, Ordering::Release);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for StatusMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusMemory")
            .field("base", &self.base)
            .field("size", &self.size())
            .finish()
    }
}
