
use crate::{ BootError, BreakRejected, Config, HeaderError, Image, Layout };



/// The two memop selectors the start-up routine moves the break with.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[repr(u32)]
pub enum BreakSelector {
    /// Sets the process break to an absolute address.
    Brk = 0,

    /// Tells the kernel where the application's heap begins. The kernel answers with the break
    /// it settled on.
    HeapStart = 11,
}

/// The kernel services consumed while booting.
pub trait Kernel {
    /// Asks the kernel to move the break to `new_break`.
    ///
    /// Returns the break the kernel accepted, which may be lower than the requested one.
    fn request_break(&mut self, selector: BreakSelector, new_break: u32) -> u32;

    /// Tells the kernel where the stack starts. Only used for debugging output.
    fn hint_stack_top(&mut self, top: u32);

    /// Suspends the application until the kernel schedules it again.
    fn yield_now(&mut self);
}

/// Register-level set-up the rest of the start-up routine is independent of.
///
/// Implementations may apply a value right away or hold on to it until control is handed to the
/// application, whichever the target's calling convention allows.
pub trait Platform {
    /// Sets the stack pointer the application starts with.
    ///
    /// # Safety
    ///
    /// `top` must be the top of a writable region big enough for the application's stack. If the
    /// implementation switches stacks right away, nothing stored on the old stack may be used
    /// afterwards.
    unsafe fn set_stack_pointer(&mut self, top: u32);

    /// Sets the register the ABI uses to address the GOT and global data.
    ///
    /// # Safety
    ///
    /// Compiled code relies on this register. It must only be changed before any PIC code runs.
    unsafe fn set_base_register(&mut self, base: u32);
}



/// Returns `ram_base` and the break, `ram_base + heap_size`.
pub fn workspace_bounds(image: &Image<'_>, cfg: &Config, mem_start: u32)
-> Result<(u32, u32), HeaderError> {
    let ram_base = mem_start.checked_add(cfg.stack_size   ).ok_or(HeaderError::WorkspaceOverflow)?;
    let brk      = ram_base .checked_add(image.heap_size()).ok_or(HeaderError::WorkspaceOverflow)?;

    Ok((ram_base, brk))
}

pub fn try_establish<K: Kernel, P: Platform>(
    image:     &Image<'_>,
    cfg:       &Config,
    mem_start: u32,
    kernel:    &mut K,
    platform:  &mut P,
) -> Result<Layout, BootError> {
    let heap_size       = image.heap_size();
    let (ram_base, brk) = workspace_bounds(image, cfg, mem_start)?;

    let request = |kernel: &mut K, selector| {
        let accepted = kernel.request_break(selector, brk);

        if accepted < brk {
            return Err(BreakRejected { requested: brk, accepted });
        }

        log::debug!("crt0: {:?} break {:#010X} accepted at {:#010X}", selector, brk, accepted);
        Ok(accepted)
    };

    // The second request is the one that sticks, the first one only validates the footprint.
    request(kernel, BreakSelector::Brk)?;
    let accepted = request(kernel, BreakSelector::HeapStart)?;

    kernel.hint_stack_top(ram_base);

    // The stack grows down from `ram_base` into the reserved area above `mem_start`.
    unsafe {
        platform.set_stack_pointer(ram_base);
        platform.set_base_register(ram_base);
    }

    Ok(Layout {
        mem_start,
        ram_base,
        heap_size,
        brk: accepted,
        text_base: image.text_base(),
    })
}
