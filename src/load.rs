
use crate::mem::Workspace;
use crate::{ HeaderError, Image };



/// Copies `.data` from flash into the workspace and zeroes `.bss`.
///
/// Address words inside `.data` are copied verbatim. The relocation table takes care of them.
pub fn load_data_bss(image: &Image<'_>, ws: &mut Workspace<'_>) -> Result<(), HeaderError> {
    let hdr = image.header();

    let src = image.flash().range(hdr.data_sym_start, hdr.data_size)
                           .ok_or(HeaderError::DataSymRange)?;
    ws.range_mut(hdr.data_start, hdr.data_size)
      .ok_or(HeaderError::DataRange)?
      .copy_from_slice(src);

    // Flash holds nothing for `.bss`, and the kernel promises nothing about fresh RAM.
    ws.range_mut(hdr.bss_start, hdr.bss_size)
      .ok_or(HeaderError::BssRange)?
      .fill(0);

    log::debug!("crt0: loaded {} bytes of `.data`, zeroed {} bytes of `.bss`",
        hdr.data_size, hdr.bss_size);

    Ok(())
}
