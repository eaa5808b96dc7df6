/*!
# crt0 Loader

A small start-up routine for position-independent applications on microcontrollers.

Applications are linked for address zero and flashed wherever the kernel finds room. Before
`main` may run, somebody has to tell the kernel how much RAM the application needs, point the
stack somewhere sensible, rewrite the global offset table (GOT) to real addresses, load `.data`,
zero `.bss` and patch the address words hiding inside `.data`. That somebody is this crate.

## Features

- This crate is `#[no_std]` and never allocates.
- Every flash read and every RAM write is bounds-checked. A corrupt image produces a
  [`BootError`] instead of a corrupted address space.
- Kernel calls and register fiddling live behind the [`Kernel`] and [`Platform`] traits, so the
  whole routine runs just fine on a development host against plain byte buffers.
- No recursion, a flat call graph and tiny error codes. This crate won't eat much of the stack
  it is about to set up.

## Image Layout

The image packer places a 40 byte header right at `app_start`. It consists of ten little-endian
32-bit words:

| Field            | Meaning                                                  |
|------------------|----------------------------------------------------------|
| `got_sym_start`  | Offset of the GOT in flash, relative to `app_start`      |
| `got_start`      | Offset of the GOT in RAM, relative to `ram_base`         |
| `got_size`       | Size of the GOT in bytes                                 |
| `data_sym_start` | Offset of `.data` in flash, relative to `app_start`      |
| `data_start`     | Offset of `.data` in RAM, relative to `ram_base`         |
| `data_size`      | Size of `.data` in bytes                                 |
| `bss_start`      | Offset of `.bss` in RAM, relative to `ram_base`          |
| `bss_size`       | Size of `.bss` in bytes                                  |
| `reldata_start`  | Offset of the relocation table, relative to `app_start`  |
| `text_offset`    | Offset of `.text`, relative to `app_start`               |

RAM starts with the stack reservation, `ram_base = mem_start + STACK_SIZE`, followed by the
workspace holding GOT, `.data` and `.bss`.

The relocation table is a byte length followed by `(offset, reserved)` word pairs. Each `offset`
names a word inside the workspace which holds an address that needs fixing up.

Every address word, in the GOT and in the relocation targets, is either an offset from
`ram_base`, or, if its high bit is set, an offset from the start of `.text`. See [`RelocAddr`].

## Getting Started

1. Parse the image with [`Image::try_parse`]. On the target you may also use
   [`Image::from_raw`], which figures out the image's extent on its own.
2. Call [`Image::try_boot`] with the start of your RAM grant, a window of writable memory, and
   your [`Kernel`] and [`Platform`] implementations. This negotiates the break, sets up the stack
   and base register, and performs all fixups.
3. On success you get a [`Running`] application. Call [`Running::enter`] with `main`. You will
   never get control back.

### Examples

```
# use crt0_loader::*;
# struct Tock; struct Noop;
# impl Kernel for Tock {
#     fn request_break(&mut self, _: BreakSelector, brk: u32) -> u32 { brk }
#     fn hint_stack_top(&mut self, _: u32) {}
#     fn yield_now(&mut self) { panic!() }
# }
# impl Platform for Noop {
#     unsafe fn set_stack_pointer(&mut self, _: u32) {}
#     unsafe fn set_base_register(&mut self, _: u32) {}
# }
# fn flash() -> &'static [u8] { &[0; 44] }
# fn main() {
#     fn sub() -> Result<(), BootError> {
#         let mut ram = [0_u8; 4096];
#         let (mut kernel, mut platform) = (Tock, Noop);
#         let (app_start, mem_start) = (0x0003_0000, 0x2000_0000);
// The image as flashed, and the address it lives at.
let image = Image::try_parse(flash(), app_start)?;

// The application's RAM grant, as the kernel handed it to us.
let mem = AppMemory::new(mem_start, &mut ram[..]);

let cfg     = Config::new(2048);
let running = image.try_boot(&cfg, mem_start, mem, &mut kernel, &mut platform)?;
#         let _ = running;
#         Ok(())
#     }
#     sub().unwrap();
# }
```

Afterwards, `running.enter(main)` calls your `main` and parks in a yield loop should it ever
return. On ARM, use `arch::arm::CortexM::enter` instead, which switches to the new stack on the
way into `main`.
 */

#![no_std]

use core::fmt;
use core::slice::Iter;



mod addr;
mod config;
mod context;
mod entry;
mod error;
mod hdr;
mod load;
mod mem;
mod parse;
mod reloc;

pub mod arch;

pub use self::addr::{ Bases, RelocAddr };
pub use self::config::{ Config, DEFAULT_STACK_SIZE, STACK_SIZE };
pub use self::context::{ BreakSelector, Kernel, Platform };
pub use self::entry::Running;
pub use self::error::{ BootError, BreakRejected, HeaderError, RelocTableError };
pub use self::mem::{ AppMemory, Flash, Workspace };

use self::hdr::{ RawHeader, RawRelocEntry };



/// A parsed image whose header has been checked against the image's own size.
#[derive(Copy, Clone, Debug)]
pub struct Image<'a> {
    flash:     Flash<'a>,
    header:    Header,
    heap_size: u32,
}

impl<'a> Image<'a> {
    /// Tries parsing `raw`, which the application sees at address `app_start`.
    ///
    /// Both the header and the relocation table are checked, so a corrupt image is turned away
    /// before anything asks the kernel for memory.
    pub fn try_parse(raw: &'a [u8], app_start: u32) -> Result<Self, BootError> {
        parse::try_parse_image(raw, app_start)
    }

    /// Tries parsing an image straight out of flash.
    ///
    /// The image's length is taken from the furthest region the header and the relocation
    /// table point to.
    ///
    /// # Safety
    ///
    /// `app_start` must point to a readable, immutable image of at least that length.
    #[cfg(target_pointer_width = "32")]
    pub unsafe fn from_raw(app_start: *const u8) -> Result<Image<'static>, BootError> {
        parse::try_parse_raw(app_start)
    }

    /// Runs every start-up stage up to, but excluding, the jump into `main`.
    ///
    /// - `cfg` tells how much stack to reserve above `mem_start`.
    /// - `mem_start` is the start of the application's RAM grant.
    /// - `mem` is a writable window of the RAM grant. It must start at or below
    ///   `ram_base = mem_start + cfg.stack_size` and will only be written between `ram_base` and
    ///   the break.
    ///
    /// Nothing is written to `mem`, and the kernel is not asked for anything, unless `mem`
    /// covers the whole workspace. Nothing is written unless the kernel accepted the break.
    pub fn try_boot<'k, K: Kernel, P: Platform>(
        &self,
        cfg:       &Config,
        mem_start: u32,
        mem:       AppMemory<'_>,
        kernel:    &'k mut K,
        platform:  &mut P,
    ) -> Result<Running<'k, K>, BootError> {
        let res = self.try_boot_inner(cfg, mem_start, mem, kernel, platform);

        match res {
            Ok(layout) => Ok(Running::new(kernel, layout)),
            Err(e)     => {
                log::error!("crt0: {}", e);
                Err(e)
            },
        }
    }

    fn try_boot_inner<K: Kernel, P: Platform>(
        &self,
        cfg:       &Config,
        mem_start: u32,
        mem:       AppMemory<'_>,
        kernel:    &mut K,
        platform:  &mut P,
    ) -> Result<Layout, BootError> {
        let (ram_base, _) = context::workspace_bounds(self, cfg, mem_start)?;
        let mut ws        = mem.into_workspace(ram_base, self.heap_size)?;
        let layout        = self.try_establish(cfg, mem_start, kernel, platform)?;

        self.fixup_got(layout.bases(), &mut ws)?;
        self.load_data_bss(&mut ws)?;
        self.try_relocate(layout.bases(), &mut ws)?;

        Ok(layout)
    }

    /// Negotiates the break and sets up the stack and base register.
    ///
    /// Fails if the kernel accepts less memory than the image needs.
    pub fn try_establish<K: Kernel, P: Platform>(
        &self,
        cfg:       &Config,
        mem_start: u32,
        kernel:    &mut K,
        platform:  &mut P,
    ) -> Result<Layout, BootError> {
        context::try_establish(self, cfg, mem_start, kernel, platform)
    }

    /// Rewrites the GOT into `ws`, returning the number of entries written.
    pub fn fixup_got(&self, bases: Bases, ws: &mut Workspace<'_>) -> Result<usize, HeaderError> {
        reloc::fixup_got(self, bases, ws)
    }

    /// Copies `.data` into `ws` and zeroes `.bss`.
    pub fn load_data_bss(&self, ws: &mut Workspace<'_>) -> Result<(), HeaderError> {
        load::load_data_bss(self, ws)
    }

    /// Applies the relocation table to `ws`, returning the number of words fixed up.
    pub fn try_relocate(&self, bases: Bases, ws: &mut Workspace<'_>)
    -> Result<usize, RelocTableError> {
        reloc::try_relocate(self, bases, ws)
    }

    /// Provides an iterator over the relocation table's entries.
    pub fn try_relocations(&self) -> Result<Relocations<'a>, RelocTableError> {
        reloc::try_relocations(self)
    }

    /// The decoded image header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The raw image.
    pub fn flash(&self) -> Flash<'a> {
        self.flash
    }

    /// Size of the RAM workspace, `got_size + data_size + bss_size`.
    pub fn heap_size(&self) -> u32 {
        self.heap_size
    }

    /// Address of the first instruction of `.text`.
    pub fn text_base(&self) -> u32 {
        self.flash.base().wrapping_add(self.header.text_offset)
    }
}



/// The decoded crt0 header. See the crate docs for what each field means.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct Header {
    pub got_sym_start:  u32,
    pub got_start:      u32,
    pub got_size:       u32,
    pub data_sym_start: u32,
    pub data_start:     u32,
    pub data_size:      u32,
    pub bss_start:      u32,
    pub bss_size:       u32,
    pub reldata_start:  u32,
    pub text_offset:    u32,
}

impl Header {
    fn from_raw(raw: &RawHeader) -> Self {
        Self {
            got_sym_start:  raw.got_sym_start .get(),
            got_start:      raw.got_start     .get(),
            got_size:       raw.got_size      .get(),
            data_sym_start: raw.data_sym_start.get(),
            data_start:     raw.data_start    .get(),
            data_size:      raw.data_size     .get(),
            bss_start:      raw.bss_start     .get(),
            bss_size:       raw.bss_size      .get(),
            reldata_start:  raw.reldata_start .get(),
            text_offset:    raw.text_offset   .get(),
        }
    }

    /// Whether RAM is laid out the way the image packer does it: GOT at offset zero, `.data`
    /// right after the GOT, `.bss` right after `.data`.
    pub fn ram_layout_is_packed(&self) -> bool {
        (self.got_start == 0)
        & (self.data_start == self.got_size)
        & (Some(self.bss_start) == self.data_start.checked_add(self.data_size))
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let rows = [
            ("got_sym_start",  self.got_sym_start ),
            ("got_start",      self.got_start     ),
            ("got_size",       self.got_size      ),
            ("data_sym_start", self.data_sym_start),
            ("data_start",     self.data_start    ),
            ("data_size",      self.data_size     ),
            ("bss_start",      self.bss_start     ),
            ("bss_size",       self.bss_size      ),
            ("reldata_start",  self.reldata_start ),
            ("text_offset",    self.text_offset   ),
        ];

        writeln!(f, "crt0 Header:")?;
        for (name, value) in &rows {
            writeln!(f, "{:>18}: {:>8} {:>#10X}", name, value, value)?;
        }

        Ok(())
    }
}



/// Where everything ended up in RAM.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Layout {
    /// Start of the application's RAM grant, the bottom of the stack reservation.
    pub mem_start: u32,

    /// Start of the workspace and initial stack pointer.
    pub ram_base: u32,

    /// Size of the workspace holding GOT, `.data` and `.bss`.
    pub heap_size: u32,

    /// The break the kernel accepted, at least `ram_base + heap_size`.
    pub brk: u32,

    /// Start of `.text` in flash.
    pub text_base: u32,
}

impl Layout {
    /// The bases address words are resolved against.
    pub fn bases(&self) -> Bases {
        Bases { ram: self.ram_base, text: self.text_base }
    }
}



/// An iterator over the image's relocation table.
#[derive(Clone)]
pub struct Relocations<'a> {
    inner: Iter<'a, RawRelocEntry>,
}

impl<'a> Iterator for Relocations<'a> {
    type Item = RelocEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|raw| RelocEntry {
            offset:   raw.offset  .get(),
            reserved: raw.reserved.get(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> ExactSizeIterator for Relocations<'a> {}

/// One entry of the relocation table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RelocEntry {
    /// Offset of the word to fix up, relative to `ram_base`.
    pub offset: u32,

    /// Reserved for a future relocation kind. Currently ignored.
    pub reserved: u32,
}
