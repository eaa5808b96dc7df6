
/// Stack size used when `CRT0_STACK_SIZE` is not set at build time.
pub const DEFAULT_STACK_SIZE: u32 = 2048;

/// The stack reservation below the RAM workspace, in bytes.
///
/// Taken from the `CRT0_STACK_SIZE` environment variable at build time, if present.
pub const STACK_SIZE: u32 = parse_stack_size(option_env!("CRT0_STACK_SIZE"));



/// Build-time knobs of the start-up routine.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Config {
    /// Bytes reserved for the stack between `mem_start` and `ram_base`.
    pub stack_size: u32,
}

impl Config {
    /// Panics, at compile time if used in a `const`, if `stack_size` is not word-aligned.
    pub const fn new(stack_size: u32) -> Self {
        assert!(stack_size % 4 == 0, "the stack size must be a multiple of 4");

        Self { stack_size }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(STACK_SIZE)
    }
}



const fn parse_stack_size(var: Option<&str>) -> u32 {
    let digits = match var {
        Some(s) => s.as_bytes(),
        None    => return DEFAULT_STACK_SIZE,
    };

    assert!(!digits.is_empty(), "`CRT0_STACK_SIZE` is empty");

    let mut acc = 0_u32;
    let mut i   = 0;

    while i < digits.len() {
        let d = digits[i];

        assert!(d.is_ascii_digit(), "`CRT0_STACK_SIZE` must be a decimal number");

        acc = match acc.checked_mul(10) {
            Some(x) => match x.checked_add((d - b'0') as u32) {
                Some(x) => x,
                None    => panic!("`CRT0_STACK_SIZE` does not fit into 32 bits"),
            },
            None => panic!("`CRT0_STACK_SIZE` does not fit into 32 bits"),
        };
        i += 1;
    }

    assert!(acc % 4 == 0, "`CRT0_STACK_SIZE` must be a multiple of 4");

    acc
}
