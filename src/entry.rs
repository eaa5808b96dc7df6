
use crate::{ Kernel, Layout };



/// A fully booted application, ready to run.
///
/// This is the only state after bootstrapping and there is no way out of it. Its single
/// transition is `yield`, which leads right back here.
pub struct Running<'k, K: Kernel> {
    kernel: &'k mut K,
    layout: Layout,
}

impl<'k, K: Kernel> Running<'k, K> {
    pub(crate) fn new(kernel: &'k mut K, layout: Layout) -> Self {
        Self { kernel, layout }
    }

    /// The memory layout the application was booted into.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Calls `main` once, then parks forever.
    pub fn enter<F: FnOnce()>(self, main: F) -> ! {
        log::debug!("crt0: entering main, stack and base register at {:#010X}", self.layout.ram_base);

        (main)();

        log::debug!("crt0: main returned, parking");

        self.park()
    }

    /// Yields to the kernel, forever.
    pub fn park(mut self) -> ! {
        loop { self.step() }
    }

    /// A single turn of the parking loop.
    #[inline]
    pub fn step(&mut self) {
        self.kernel.yield_now();
    }
}
