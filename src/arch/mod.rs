//! Target support: register set-up, kernel calls and the `_start` symbol.

#[cfg(target_arch = "arm")]
pub mod arm;
