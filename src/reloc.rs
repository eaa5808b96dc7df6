
use crate::hdr::{ RawRelocEntry, RELOC_ENTRY_LEN, WORD };
use crate::mem::Workspace;
use crate::{ Bases, HeaderError, Image, RelocAddr, RelocTableError, Relocations };
use zerocopy::FromBytes;
use zerocopy::little_endian::U32;



/// Rewrites every GOT word from its tagged flash encoding to an absolute address.
///
/// Returns the number of words written. The flash copy is left alone, so running this twice
/// produces the same GOT.
pub fn fixup_got(image: &Image<'_>, bases: Bases, ws: &mut Workspace<'_>)
-> Result<usize, HeaderError> {
    let hdr = image.header();
    let src = image.flash().range(hdr.got_sym_start, hdr.got_size)
                           .ok_or(HeaderError::GotSymRange)?;
    let dst = ws.range_mut(hdr.got_start, hdr.got_size).ok_or(HeaderError::GotRange)?;

    // Sizes were checked to be word multiples while parsing, so neither cast can fail.
    let src = <[U32]>::ref_from_bytes(src).map_err(|_| HeaderError::MisalignedSize)?;
    let dst = <[U32]>::mut_from_bytes(dst).map_err(|_| HeaderError::MisalignedSize)?;

    for (d, s) in dst.iter_mut().zip(src) {
        d.set(RelocAddr::decode(s.get()).resolve(bases));
    }

    log::debug!("crt0: fixed up {} GOT entries", src.len());

    Ok(src.len())
}



pub fn try_relocations<'a>(image: &Image<'a>) -> Result<Relocations<'a>, RelocTableError> {
    let flash = image.flash();
    let start = image.header().reldata_start;
    let len   = flash.word(start).ok_or(RelocTableError::TableRange)?;

    if (len as usize) % RELOC_ENTRY_LEN != 0 {
        return Err(RelocTableError::MisalignedLength);
    }

    let raw = start.checked_add(WORD as u32)
                   .and_then(|body| flash.range(body, len))
                   .ok_or(RelocTableError::TableRange)?;
    let raw = <[RawRelocEntry]>::ref_from_bytes(raw)
                   .map_err(|_| RelocTableError::MisalignedLength)?;

    Ok(Relocations { inner: raw.iter() })
}

/// Checks the table's shape and that every target word lies inside the workspace the header
/// declares. Returns the number of entries.
pub fn check_relocations(image: &Image<'_>) -> Result<usize, RelocTableError> {
    let relocs = try_relocations(image)?;
    let limit  = image.heap_size() as u64;

    if relocs.clone().any(|r| (r.offset as u64) + (WORD as u64) > limit) {
        return Err(RelocTableError::TargetOutOfRange);
    }

    Ok(relocs.len())
}

/// Applies the relocation table to the loaded `.data` in place.
///
/// All targets are checked before the first word is touched, so a bad table or a workspace
/// shorter than the header declares leaves `ws` as it was. Returns the number of words fixed
/// up.
pub fn try_relocate(image: &Image<'_>, bases: Bases, ws: &mut Workspace<'_>)
-> Result<usize, RelocTableError> {
    let relocs = try_relocations(image)?;
    let limit  = image.heap_size();

    if relocs.clone().any(|r| !ws.holds_word(r.offset, limit)) {
        return Err(RelocTableError::TargetOutOfRange);
    }

    let mut count = 0;

    for r in relocs {
        // `r.reserved` has no meaning yet.
        let word = ws.word(r.offset).ok_or(RelocTableError::TargetOutOfRange)?;

        ws.set_word(r.offset, RelocAddr::decode(word).resolve(bases))
          .ok_or(RelocTableError::TargetOutOfRange)?;
        count += 1;
    }

    log::debug!("crt0: applied {} relocations", count);

    Ok(count)
}
