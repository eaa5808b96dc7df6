#![allow(dead_code)]

use crt0_loader::{ BreakSelector, Header, Kernel, Platform };



pub const HEADER_LEN:      u32 = 40;
pub const APP_START:       u32 = 0x0003_0000;
pub const RAM_BASE:        u32 = 0x2000_0000;
pub const MEM_START:       u32 = RAM_BASE - TEST_STACK_SIZE;

/// Deliberately independent of the crate's build-time `STACK_SIZE`.
pub const TEST_STACK_SIZE: u32 = 0x800;



pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}



/// Lays out an image the way the packer does: header, `.text`, GOT, `.data`, relocation table.
#[derive(Clone, Default)]
pub struct ImageBuilder {
    text:   Vec<u8>,
    got:    Vec<u32>,
    data:   Vec<u8>,
    bss:    u32,
    relocs: Vec<(u32, u32)>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { text: vec![0xCC; 16], ..Self::default() }
    }

    pub fn text(mut self, text: &[u8]) -> Self {
        self.text = text.to_vec();
        self
    }

    pub fn got(mut self, got: &[u32]) -> Self {
        self.got = got.to_vec();
        self
    }

    pub fn data(mut self, data: &[u8]) -> Self {
        self.data = data.to_vec();
        self
    }

    pub fn data_words(mut self, words: &[u32]) -> Self {
        self.data = words.iter().flat_map(|w| w.to_le_bytes()).collect();
        self
    }

    pub fn bss(mut self, size: u32) -> Self {
        self.bss = size;
        self
    }

    pub fn reloc(mut self, offset: u32) -> Self {
        self.relocs.push((offset, 0));
        self
    }

    pub fn reloc_with_reserved(mut self, offset: u32, reserved: u32) -> Self {
        self.relocs.push((offset, reserved));
        self
    }

    pub fn build(self) -> BuiltImage {
        let mut bytes = vec![0_u8; HEADER_LEN as usize];

        let text_offset = bytes.len() as u32;
        bytes.extend_from_slice(&self.text);
        pad4(&mut bytes);

        let got_sym_start = bytes.len() as u32;
        self.got.iter().for_each(|w| bytes.extend_from_slice(&w.to_le_bytes()));

        let data_sym_start = bytes.len() as u32;
        bytes.extend_from_slice(&self.data);
        pad4(&mut bytes);

        let reldata_start = bytes.len() as u32;
        let reloc_len     = (self.relocs.len() * 8) as u32;
        bytes.extend_from_slice(&reloc_len.to_le_bytes());
        for (offset, reserved) in &self.relocs {
            bytes.extend_from_slice(&offset  .to_le_bytes());
            bytes.extend_from_slice(&reserved.to_le_bytes());
        }

        let got_size  = (self.got.len() * 4) as u32;
        let data_size = self.data.len() as u32;

        let header = Header {
            got_sym_start,
            got_start: 0,
            got_size,
            data_sym_start,
            data_start: got_size,
            data_size,
            bss_start: got_size + data_size,
            bss_size: self.bss,
            reldata_start,
            text_offset,
        };

        let mut img = BuiltImage { bytes, header };
        img.rewrite_header();
        img
    }
}

fn pad4(bytes: &mut Vec<u8>) {
    while bytes.len() % 4 != 0 { bytes.push(0); }
}



pub struct BuiltImage {
    pub bytes:  Vec<u8>,
    pub header: Header,
}

impl BuiltImage {
    /// Writes `self.header` back into the image bytes, e.g. after corrupting it on purpose.
    pub fn rewrite_header(&mut self) {
        let h = self.header;
        let words = [
            h.got_sym_start, h.got_start, h.got_size,
            h.data_sym_start, h.data_start, h.data_size,
            h.bss_start, h.bss_size,
            h.reldata_start, h.text_offset,
        ];

        for (i, w) in words.iter().enumerate() {
            self.bytes[(i * 4)..(i * 4 + 4)].copy_from_slice(&w.to_le_bytes());
        }
    }

    /// Overwrites the relocation table's length word.
    pub fn set_reloc_len(&mut self, len: u32) {
        let at = self.header.reldata_start as usize;
        self.bytes[at..(at + 4)].copy_from_slice(&len.to_le_bytes());
    }

    pub fn heap_size(&self) -> u32 {
        self.header.got_size + self.header.data_size + self.header.bss_size
    }
}



/// RAM as the application sees it: the stack reservation followed by `len` bytes of
/// workspace and break slack, pre-filled with junk.
pub fn app_ram(len: usize) -> Vec<u8> {
    vec![0xA5; (TEST_STACK_SIZE as usize) + len]
}

pub fn word_at(mem: &[u8], off: usize) -> u32 {
    let mut w = [0_u8; 4];
    w.copy_from_slice(&mem[off..(off + 4)]);
    u32::from_le_bytes(w)
}



#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Call {
    Break(BreakSelector, u32),
    StackTop(u32),
    Yield,
}

/// Records every call. Accepts each break `short_by` bytes lower than requested.
#[derive(Default)]
pub struct MockKernel {
    pub calls:       Vec<Call>,
    pub short_by:    u32,
    pub yield_limit: Option<usize>,
    yields:          usize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn short_by(short_by: u32) -> Self {
        Self { short_by, ..Self::default() }
    }

    /// Panics on the `limit`th yield, the only way out of the parking loop.
    pub fn yield_limit(limit: usize) -> Self {
        Self { yield_limit: Some(limit), ..Self::default() }
    }

    pub fn yields(&self) -> usize {
        self.yields
    }
}

impl Kernel for MockKernel {
    fn request_break(&mut self, selector: BreakSelector, new_break: u32) -> u32 {
        self.calls.push(Call::Break(selector, new_break));
        new_break - self.short_by
    }

    fn hint_stack_top(&mut self, top: u32) {
        self.calls.push(Call::StackTop(top));
    }

    fn yield_now(&mut self) {
        self.calls.push(Call::Yield);
        self.yields += 1;

        if Some(self.yields) == self.yield_limit {
            panic!("yield limit reached");
        }
    }
}

#[derive(Default, Debug)]
pub struct MockPlatform {
    pub sp: Option<u32>,
    pub sb: Option<u32>,
}

impl Platform for MockPlatform {
    unsafe fn set_stack_pointer(&mut self, top: u32) {
        self.sp = Some(top);
    }

    unsafe fn set_base_register(&mut self, base: u32) {
        self.sb = Some(base);
    }
}
