#![allow(missing_docs)]

use static_assertions::const_assert_eq;
use zerocopy::{ FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned };
use zerocopy::little_endian::U32;



pub const WORD:            usize = 4;
pub const HEADER_LEN:      usize = 40;
pub const RELOC_ENTRY_LEN: usize =  8;

pub const TEXT_TAG:    u32 = 0x8000_0000;
pub const OFFSET_MASK: u32 = 0x7FFF_FFFF;



/// The crt0 header exactly as the image packer writes it to flash.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RawHeader {
    pub got_sym_start:  U32,
    pub got_start:      U32,
    pub got_size:       U32,
    pub data_sym_start: U32,
    pub data_start:     U32,
    pub data_size:      U32,
    pub bss_start:      U32,
    pub bss_size:       U32,
    pub reldata_start:  U32,
    pub text_offset:    U32,
}

/// One `(offset, reserved)` pair of the relocation table following the length word.
#[derive(Copy, Clone, Debug, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct RawRelocEntry {
    pub offset:   U32,
    pub reserved: U32,
}



const_assert_eq!(core::mem::size_of::<RawHeader    >(), HEADER_LEN);
const_assert_eq!(core::mem::size_of::<RawRelocEntry>(), RELOC_ENTRY_LEN);
