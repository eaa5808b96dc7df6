
use crate::hdr::{ RawHeader, HEADER_LEN, WORD };
use crate::mem::Flash;
use crate::{ reloc, BootError, Header, HeaderError, Image };
use zerocopy::FromBytes;



/// Checks the header and the relocation table. An image that makes it out of here can be
/// booted without any of the later stages finding fault with it.
pub fn try_parse_image<'a>(raw: &'a [u8], app_start: u32) -> Result<Image<'a>, BootError> {
    let header    = try_load_header(raw, app_start)?;

    check_sizes(&header)?;
    check_flash_ranges(&header, raw.len())?;

    let heap_size = check_ram_ranges(&header)?;

    log::trace!("{}", header);

    if !header.ram_layout_is_packed() {
        log::debug!("crt0: RAM regions are not packed in GOT, `.data`, `.bss` order");
    }

    let image  = Image { flash: Flash::new(app_start, raw), header, heap_size };
    let relocs = reloc::check_relocations(&image)?;

    log::debug!("crt0: image has {} relocations", relocs);

    Ok(image)
}

/// Parses an image straight from flash, deriving its length from the header.
///
/// The image's extent is the furthest byte any header field or the relocation table refers to.
#[cfg(target_pointer_width = "32")]
pub unsafe fn try_parse_raw(app_start: *const u8) -> Result<Image<'static>, BootError> {
    use core::slice;

    let hdr_bytes = slice::from_raw_parts(app_start, HEADER_LEN);
    let header    = try_load_header(hdr_bytes, app_start as usize as u32)?;
    let reloc_len = (app_start.add(header.reldata_start as usize) as *const u32).read_unaligned();
    let len       = declared_len(&header, u32::from_le(reloc_len))
                        .ok_or(HeaderError::BadBufferSize)?;

    try_parse_image(slice::from_raw_parts(app_start, len as usize), app_start as usize as u32)
}



fn try_load_header(raw: &[u8], app_start: u32) -> Result<Header, HeaderError> {
    if raw.len() < HEADER_LEN {
        return Err(HeaderError::BufferTooSmall);
    }

    // An image may end right at the top of the address space, but not wrap around it.
    if (app_start as u64) + (raw.len() as u64) > (1_u64 << 32) {
        return Err(HeaderError::BadBufferSize);
    }

    let (hdr, _) = RawHeader::read_from_prefix(raw).map_err(|_| HeaderError::BufferTooSmall)?;

    Ok(Header::from_raw(&hdr))
}

fn check_sizes(hdr: &Header) -> Result<(), HeaderError> {
    let misaligned = (hdr.got_size | hdr.data_size | hdr.bss_size) % (WORD as u32);

    if misaligned != 0 { Err(HeaderError::MisalignedSize) }
    else               { Ok(()) }
}

fn check_flash_ranges(hdr: &Header, flash_len: usize) -> Result<(), HeaderError> {
    let flash_len = flash_len as u64;

    if !fits(hdr.got_sym_start, hdr.got_size, flash_len) {
        return Err(HeaderError::GotSymRange);
    }

    if !fits(hdr.data_sym_start, hdr.data_size, flash_len) {
        return Err(HeaderError::DataSymRange);
    }

    if !fits(hdr.reldata_start, WORD as u32, flash_len) {
        return Err(HeaderError::RelDataRange);
    }

    if (hdr.text_offset as u64) > flash_len {
        return Err(HeaderError::TextOffsetRange);
    }

    Ok(())
}

/// Checks that GOT, `.data` and `.bss` fit the workspace and don't step on each other's toes.
/// Returns the workspace size.
fn check_ram_ranges(hdr: &Header) -> Result<u32, HeaderError> {
    let heap_size = hdr.got_size.checked_add(hdr.data_size)
                                .and_then(|x| x.checked_add(hdr.bss_size))
                                .ok_or(HeaderError::HeapSizeOverflow)?;
    let heap      = heap_size as u64;

    if !fits(hdr.got_start,  hdr.got_size,  heap) { return Err(HeaderError::GotRange ); }
    if !fits(hdr.data_start, hdr.data_size, heap) { return Err(HeaderError::DataRange); }
    if !fits(hdr.bss_start,  hdr.bss_size,  heap) { return Err(HeaderError::BssRange ); }

    let got  = (hdr.got_start,  hdr.got_size );
    let data = (hdr.data_start, hdr.data_size);
    let bss  = (hdr.bss_start,  hdr.bss_size );

    if overlap(got, data) | overlap(got, bss) | overlap(data, bss) {
        return Err(HeaderError::OverlappingRegions);
    }

    Ok(heap_size)
}

#[cfg(target_pointer_width = "32")]
fn declared_len(hdr: &Header, reloc_len: u32) -> Option<u32> {
    let ends = [
        Some(HEADER_LEN as u32),
        hdr.got_sym_start .checked_add(hdr.got_size),
        hdr.data_sym_start.checked_add(hdr.data_size),
        hdr.reldata_start .checked_add(WORD as u32).and_then(|x| x.checked_add(reloc_len)),
        Some(hdr.text_offset),
    ];

    ends.iter().try_fold(0_u32, |acc, end| end.map(|end| acc.max(end)))
}

#[inline]
fn fits(off: u32, len: u32, limit: u64) -> bool {
    (off as u64) + (len as u64) <= limit
}

#[inline]
fn overlap((a, a_len): (u32, u32), (b, b_len): (u32, u32)) -> bool {
    // Empty regions can sit anywhere.
    let (a, a_end) = (a as u64, (a as u64) + (a_len as u64));
    let (b, b_end) = (b as u64, (b as u64) + (b_len as u64));

    (a_len != 0) & (b_len != 0) & (a < b_end) & (b < a_end)
}
