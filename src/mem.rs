
use crate::hdr::WORD;
use crate::BootError;
use core::ops::Range;
use zerocopy::{ FromBytes, IntoBytes };
use zerocopy::little_endian::U32;



/// The flashed image, read-only, together with the address it is mapped at.
#[derive(Copy, Clone, Debug)]
pub struct Flash<'a> {
    base:  u32,
    bytes: &'a [u8],
}

impl<'a> Flash<'a> {
    pub(crate) fn new(base: u32, bytes: &'a [u8]) -> Self {
        Self { base, bytes }
    }

    /// Address of the first byte of the image, a.k.a. `app_start`.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size of the image in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The raw image bytes.
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Bounds-checked sub-slice of `len` bytes at offset `off`.
    pub(crate) fn range(&self, off: u32, len: u32) -> Option<&'a [u8]> {
        self.bytes.get(byte_range(off, len)?)
    }

    /// Bounds-checked little-endian word at offset `off`.
    pub(crate) fn word(&self, off: u32) -> Option<u32> {
        read_word(self.bytes, off)
    }
}



/// A writable window into the application's RAM grant.
///
/// The window may start anywhere at or below `ram_base`. Bytes below `ram_base` belong to the
/// stack and are never touched by the loader.
pub struct AppMemory<'m> {
    start: u32,
    bytes: &'m mut [u8],
}

impl<'m> AppMemory<'m> {
    /// Wraps `bytes`, which the application sees at address `start`.
    pub fn new(start: u32, bytes: &'m mut [u8]) -> Self {
        Self { start, bytes }
    }

    /// Wraps raw memory handed over by the kernel.
    ///
    /// # Safety
    ///
    /// `start .. start + len` must be writable, must not be aliased, and must not contain the
    /// stack the caller is currently running on.
    #[cfg(target_pointer_width = "32")]
    pub unsafe fn from_raw(start: *mut u8, len: usize) -> Self {
        Self {
            start: start as usize as u32,
            bytes: core::slice::from_raw_parts_mut(start, len),
        }
    }

    /// Address of the window's first byte.
    pub fn start(&self) -> u32 {
        self.start
    }

    /// One past the window's last address, saturating at the top of the address space.
    pub fn end(&self) -> u32 {
        window_end(self.start, self.bytes.len())
    }

    /// Carves the RAM workspace `ram_base .. ram_base + heap_size` out of this window.
    ///
    /// Fails with [`BootError::BadMemoryWindow`] unless the window covers all of it.
    pub(crate) fn into_workspace(self, ram_base: u32, heap_size: u32)
    -> Result<Workspace<'m>, BootError> {
        let off   = ram_base.checked_sub(self.start).ok_or(BootError::BadMemoryWindow)?;
        let range = byte_range(off, heap_size).ok_or(BootError::BadMemoryWindow)?;
        let bytes = self.bytes.get_mut(range).ok_or(BootError::BadMemoryWindow)?;

        Ok(Workspace { base: ram_base, bytes })
    }
}



/// The RAM workspace holding the GOT, `.data` and `.bss`, starting at `ram_base`.
///
/// All accesses are bounds-checked against the workspace, so a corrupt image can never make the
/// loader scribble over the stack or beyond the break.
pub struct Workspace<'m> {
    base:  u32,
    bytes: &'m mut [u8],
}

impl<'m> Workspace<'m> {
    /// Wraps `bytes`, which the application sees at address `base`.
    pub fn new(base: u32, bytes: &'m mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Address of the workspace's first byte, a.k.a. `ram_base`.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Size of the workspace in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The workspace's current contents.
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }

    /// Whether a whole word at offset `off` lies inside the first `limit` bytes.
    pub(crate) fn holds_word(&self, off: u32, limit: u32) -> bool {
        off.checked_add(WORD as u32)
           .map(|end| (end <= limit) & ((end as usize) <= self.bytes.len()))
           .unwrap_or(false)
    }

    /// Bounds-checked mutable sub-slice of `len` bytes at offset `off`.
    pub(crate) fn range_mut(&mut self, off: u32, len: u32) -> Option<&mut [u8]> {
        self.bytes.get_mut(byte_range(off, len)?)
    }

    /// Bounds-checked little-endian word at offset `off`.
    pub fn word(&self, off: u32) -> Option<u32> {
        read_word(self.bytes, off)
    }

    /// Bounds-checked word store. Returns `None` if the word does not fit.
    pub(crate) fn set_word(&mut self, off: u32, value: u32) -> Option<()> {
        self.range_mut(off, WORD as u32)?.copy_from_slice(U32::new(value).as_bytes());
        Some(())
    }
}



fn window_end(start: u32, len: usize) -> u32 {
    start.saturating_add(u32::try_from(len).unwrap_or(u32::MAX))
}

fn byte_range(off: u32, len: u32) -> Option<Range<usize>> {
    let end = off.checked_add(len)?;

    Some((off as usize) .. (end as usize))
}

fn read_word(bytes: &[u8], off: u32) -> Option<u32> {
    let raw = bytes.get(byte_range(off, WORD as u32)?)?;

    U32::read_from_bytes(raw).ok().map(U32::get)
}



#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_end_saturates() {
        assert_eq!(window_end(0x2000_0000, 0x100), 0x2000_0100);
        assert_eq!(window_end(0xFFFF_FF00, 0x100), 0xFFFF_FFFF);
        assert_eq!(window_end(0x2000_0000, usize::MAX), u32::MAX);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn window_end_does_not_truncate_huge_windows() {
        // Truncating `1 << 32 | 0x10` to 32 bits would yield `start + 0x10`.
        assert_eq!(window_end(0x1000, (1_usize << 32) | 0x10), u32::MAX);
    }

    #[test]
    fn workspace_must_lie_inside_the_window() {
        let mut ram = [0_u8; 32];

        let ws = AppMemory::new(0x100, &mut ram).into_workspace(0x108, 24);
        assert_eq!(ws.map(|ws| (ws.base(), ws.len())).ok(), Some((0x108, 24)));

        let res = AppMemory::new(0x100, &mut ram).into_workspace(0x108, 28);
        assert_eq!(res.err(), Some(BootError::BadMemoryWindow));

        let res = AppMemory::new(0x100, &mut ram).into_workspace(0x0FC, 4);
        assert_eq!(res.err(), Some(BootError::BadMemoryWindow));
    }
}
