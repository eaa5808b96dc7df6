
use core::fmt;



/// A combined error for everything that can go wrong while booting an image.
///
/// Every variant is fatal. The image is static, so retrying will not help, only re-flashing it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BootError {
    /// The image header describes regions that do not fit the image or the RAM workspace.
    CorruptHeader(HeaderError),

    /// The relocation table is malformed or points outside the RAM workspace.
    CorruptRelocationTable(RelocTableError),

    /// The kernel accepted a smaller memory break than the one requested.
    BreakRejected(BreakRejected),

    /// The writable memory window handed to the loader does not cover the RAM workspace,
    /// `ram_base .. ram_base + heap_size`.
    BadMemoryWindow,
}



/// An error that might occur while trying to parse the image header.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum HeaderError {
    /// The image is smaller than the 40 byte header.
    BufferTooSmall = 0,

    /// The image does not fit into the 32-bit address space at its load address.
    BadBufferSize = 1,

    /// One of `got_size`, `data_size` or `bss_size` is not a multiple of 4.
    MisalignedSize = 2,

    /// The GOT source range goes past the end of the image.
    GotSymRange = 3,

    /// The `.data` source range goes past the end of the image.
    DataSymRange = 4,

    /// The relocation table's length word lies past the end of the image.
    RelDataRange = 5,

    /// The text offset points past the end of the image.
    TextOffsetRange = 6,

    /// `got_size + data_size + bss_size` overflows.
    HeapSizeOverflow = 7,

    /// The GOT destination range goes past the end of the RAM workspace.
    GotRange = 8,

    /// The `.data` destination range goes past the end of the RAM workspace.
    DataRange = 9,

    /// The `.bss` destination range goes past the end of the RAM workspace.
    BssRange = 10,

    /// Two of the GOT, `.data` and `.bss` destination ranges overlap.
    OverlappingRegions = 11,

    /// The RAM workspace would wrap around the end of the 32-bit address space.
    WorkspaceOverflow = 12,

    #[doc(hidden)] _Reserved,
}



/// An error that might occur while trying to apply the relocation table.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u8)]
pub enum RelocTableError {
    /// The table's reported length goes past the end of the image.
    TableRange = 0,

    /// The table's reported length is not a multiple of 8 bytes.
    MisalignedLength = 1,

    /// A table entry wants to modify memory outside the RAM workspace.
    TargetOutOfRange = 2,

    #[doc(hidden)] _Reserved,
}



/// The kernel did not grant the memory break the image needs.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BreakRejected {
    /// The break the loader asked for, `ram_base + heap_size`.
    pub requested: u32,

    /// The break the kernel actually accepted.
    pub accepted: u32,
}



impl HeaderError {
    /// Returns a descriptive short string of what the error is about.
    pub fn as_str(&self) -> &'static str {
        use self::HeaderError::*;

        match *self {
            BufferTooSmall     => "The image is smaller than the 40 byte crt0 header",
            BadBufferSize      => "The image does not fit into the 32-bit address space at its \
                                   load address",
            MisalignedSize     => "One of the header's GOT, `.data` or `.bss` sizes is not a \
                                   multiple of the 4 byte word size",
            GotSymRange        => "The header's GOT source range goes past the end of the image",
            DataSymRange       => "The header's `.data` source range goes past the end of the \
                                   image",
            RelDataRange       => "The header's relocation table offset points past the end of \
                                   the image",
            TextOffsetRange    => "The header's text offset points past the end of the image",
            HeapSizeOverflow   => "The sum of the header's GOT, `.data` and `.bss` sizes \
                                   overflows",
            GotRange           => "The header's GOT destination range goes past the end of the \
                                   RAM workspace",
            DataRange          => "The header's `.data` destination range goes past the end of \
                                   the RAM workspace",
            BssRange           => "The header's `.bss` destination range goes past the end of the \
                                   RAM workspace",
            OverlappingRegions => "The header's GOT, `.data` and `.bss` destination ranges \
                                   overlap",
            WorkspaceOverflow  => "The RAM workspace would wrap around the end of the 32-bit \
                                   address space",

            _Reserved => "",
        }
    }
}

impl fmt::Display for HeaderError {
    #[inline] fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.as_str()) }
}

impl RelocTableError {
    /// Returns a descriptive short string of what the error is about.
    pub fn as_str(&self) -> &'static str {
        use self::RelocTableError::*;

        match *self {
            TableRange       => "The relocation table's reported length goes past the end of \
                                 the image",
            MisalignedLength => "The relocation table's reported length is not a multiple of \
                                 the 8 byte entry size",
            TargetOutOfRange => "A relocation table entry wants to modify memory outside the \
                                 RAM workspace",

            _Reserved => "",
        }
    }
}

impl fmt::Display for RelocTableError {
    #[inline] fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for BreakRejected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "The kernel accepted a break of {:#010X}, but {:#010X} was requested",
            self.accepted, self.requested)
    }
}

impl BootError {
    /// Returns the descriptive short string of what the sub-error is about.
    pub fn as_str(&self) -> &'static str {
        match *self {
            BootError::CorruptHeader(e)          => e.as_str(),
            BootError::CorruptRelocationTable(e) => e.as_str(),
            BootError::BreakRejected(_)          => "The kernel accepted a smaller break than \
                                                     requested",
            BootError::BadMemoryWindow           => "The writable memory window does not cover the \
                                                     RAM workspace",
        }
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            BootError::CorruptHeader(e)          => write!(f, "Corrupt image header: {}", e),
            BootError::CorruptRelocationTable(e) => write!(f, "Corrupt relocation table: {}", e),
            BootError::BreakRejected(e)          => write!(f, "Memory break rejected: {}", e),
            BootError::BadMemoryWindow           => write!(f, "Bad memory window: {}",
                                                        self.as_str()),
        }
    }
}



impl From<HeaderError> for BootError {
    #[inline] fn from(e: HeaderError) -> Self { BootError::CorruptHeader(e) }
}

impl From<RelocTableError> for BootError {
    #[inline] fn from(e: RelocTableError) -> Self { BootError::CorruptRelocationTable(e) }
}

impl From<BreakRejected> for BootError {
    #[inline] fn from(e: BreakRejected) -> Self { BootError::BreakRejected(e) }
}
