//! Cortex-M running on a Tock-style kernel.
//!
//! The kernel starts an application at `_start` with `r0 = app_start`, `r1 = mem_start`,
//! `r2 = memory_len` and `r3 = app_heap_break`, running on a kernel-provided stack outside the
//! application's workspace.

use crate::{ BreakSelector, Kernel, Platform, Running };
use core::arch::asm;



const MEMOP_SBRK:      u32 =  1;
const MEMOP_STACK_TOP: u32 = 10;



/// Stack pointer and `r9` for the application.
///
/// Both are only written on the way into `main`, in [`CortexM::enter`]. Switching stacks in the
/// middle of a Rust function would leave its frame behind.
#[derive(Copy, Clone, Debug, Default)]
pub struct CortexM {
    sp: u32,
    sb: u32,
}

impl Platform for CortexM {
    unsafe fn set_stack_pointer(&mut self, top: u32) {
        self.sp = top;
    }

    unsafe fn set_base_register(&mut self, base: u32) {
        self.sb = base;
    }
}

impl CortexM {
    /// Switches to the application's stack, sets `r9`, calls `main` and yields forever once
    /// it returns.
    ///
    /// Everything after the stack switch happens in assembly, so no Rust frame outlives it.
    pub fn enter<K: Kernel>(self, running: Running<'_, K>, main: extern "C" fn()) -> ! {
        // Only here to prove that booting succeeded.
        let _ = running;

        unsafe {
            // Fixed registers, so that setting `r9` cannot clobber another operand.
            asm!(
                "mov sp, r2",
                "mov r9, r1",
                "blx r0",
                "2:",
                "svc 0",
                "b 2b",
                in("r0") main,
                in("r1") self.sb,
                in("r2") self.sp,
                options(noreturn),
            )
        }
    }
}



/// Memops and `yield` via `svc`.
#[derive(Copy, Clone, Debug, Default)]
pub struct TockSyscalls;

impl Kernel for TockSyscalls {
    fn request_break(&mut self, selector: BreakSelector, new_break: u32) -> u32 {
        // Memops answer with a status code, not with a break. Ask for the real one on failure.
        match unsafe { memop(selector as u32, new_break) } {
            0 => new_break,
            _ => unsafe { memop(MEMOP_SBRK, 0) },
        }
    }

    fn hint_stack_top(&mut self, top: u32) {
        let _ = unsafe { memop(MEMOP_STACK_TOP, top) };
    }

    fn yield_now(&mut self) {
        unsafe { asm!("svc 0", clobber_abi("C")) };
    }
}

unsafe fn memop(op: u32, arg: u32) -> u32 {
    let ret: u32;

    asm!(
        "svc 4",
        inlateout("r0") op => ret,
        in("r1") arg,
        clobber_abi("C"),
    );

    ret
}



/// Kills the application with an undefined instruction. The kernel takes it from there.
pub fn fault() -> ! {
    loop {
        unsafe { asm!("udf #0", options(nomem, nostack)) };
    }
}



#[cfg(feature = "start")]
mod start {
    use crate::{ AppMemory, Config, Image };
    use super::{ fault, CortexM, TockSyscalls };

    extern "C" {
        fn main();
    }

    extern "C" fn call_main() {
        unsafe { main() }
    }

    #[no_mangle]
    #[link_section = ".start"]
    pub unsafe extern "C" fn _start(
        app_start:       *const u8,
        mem_start:       *mut u8,
        memory_len:      usize,
        _app_heap_break: *const u8,
    ) -> ! {
        let     cfg      = Config::default();
        let mut kernel   = TockSyscalls;
        let mut platform = CortexM::default();

        let image = match Image::from_raw(app_start) {
            Ok(image) => image,
            Err(e)    => {
                log::error!("crt0: {}", e);
                fault()
            },
        };

        // Hand out only what lies above the stack reservation.
        let stack = (cfg.stack_size as usize).min(memory_len);
        let mem   = AppMemory::from_raw(mem_start.add(stack), memory_len - stack);

        match image.try_boot(&cfg, mem_start as usize as u32, mem, &mut kernel, &mut platform) {
            Ok(running) => platform.enter(running, call_main),
            Err(_)      => fault(),
        }
    }
}
