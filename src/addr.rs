
use crate::hdr::{ TEXT_TAG, OFFSET_MASK };



/// An address word as the image packer stores it, before fixup.
///
/// The packer tags words pointing into flash (code, read-only data) with the high bit. All other
/// words are offsets into the RAM workspace. Keeping both kinds apart in the type system makes it
/// impossible to resolve a flash offset against the RAM base or vice versa.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum RelocAddr {
    /// Offset from `ram_base`, the start of the RAM workspace.
    RamRelative(u32),

    /// Offset from the start of the image's `.text` section in flash.
    TextRelative(u32),
}

impl RelocAddr {
    /// Decodes a raw, possibly tagged, word.
    #[inline]
    pub fn decode(raw: u32) -> Self {
        if (raw & TEXT_TAG) == 0 { RelocAddr::RamRelative( raw) }
        else                     { RelocAddr::TextRelative(raw & OFFSET_MASK) }
    }

    /// Encodes back into the packer's tagged format.
    ///
    /// Offsets are truncated to 31 bits.
    #[inline]
    pub fn encode(self) -> u32 {
        match self {
            RelocAddr::RamRelative( off) => off & OFFSET_MASK,
            RelocAddr::TextRelative(off) => (off & OFFSET_MASK) | TEXT_TAG,
        }
    }

    /// The untagged offset.
    #[inline]
    pub fn offset(self) -> u32 {
        match self {
            RelocAddr::RamRelative(off) | RelocAddr::TextRelative(off) => off,
        }
    }

    /// The absolute runtime address this word refers to.
    #[inline]
    pub fn resolve(self, bases: Bases) -> u32 {
        match self {
            RelocAddr::RamRelative( off) => bases.ram .wrapping_add(off),
            RelocAddr::TextRelative(off) => bases.text.wrapping_add(off),
        }
    }
}



/// The two base addresses every fixup resolves against.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Bases {
    /// Start of the RAM workspace, right above the stack.
    pub ram: u32,

    /// Start of `.text` in flash, i.e. `app_start + text_offset`.
    pub text: u32,
}



#[cfg(test)]
mod tests {
    use super::*;

    const BASES: [Bases; 4] = [
        Bases { ram: 0x0000_0000, text: 0x0000_0000 },
        Bases { ram: 0x2000_0000, text: 0x0000_0100 },
        Bases { ram: 0x2000_4000, text: 0x0003_0040 },
        Bases { ram: 0xFFFF_FF00, text: 0x8000_0000 },
    ];

    const RAWS: [u32; 8] = [
        0x0000_0000, 0x0000_0010, 0x0000_1234, 0x7FFF_FFFF,
        0x8000_0000, 0x8000_0004, 0x8000_ABCD, 0xFFFF_FFFF,
    ];

    #[test]
    fn high_bit_selects_the_base() {
        for &bases in &BASES {
            for &raw in &RAWS {
                let expected = if raw & 0x8000_0000 == 0 {
                    bases.ram .wrapping_add(raw & 0x7FFF_FFFF)
                } else {
                    bases.text.wrapping_add(raw & 0x7FFF_FFFF)
                };

                assert_eq!(RelocAddr::decode(raw).resolve(bases), expected, "raw {:#010X}", raw);
            }
        }
    }

    #[test]
    fn decode_strips_the_tag() {
        assert_eq!(RelocAddr::decode(0x0000_0010), RelocAddr::RamRelative(0x10));
        assert_eq!(RelocAddr::decode(0x8000_0004), RelocAddr::TextRelative(0x4));
        assert_eq!(RelocAddr::decode(0xFFFF_FFFF).offset(), 0x7FFF_FFFF);
    }

    #[test]
    fn encode_restores_the_raw_word() {
        for &raw in &RAWS {
            assert_eq!(RelocAddr::decode(raw).encode(), raw);
        }
    }

    #[test]
    fn encode_drops_the_31st_bit_of_ram_offsets() {
        assert_eq!(RelocAddr::RamRelative(0x8000_0010).encode(), 0x0000_0010);
    }
}
