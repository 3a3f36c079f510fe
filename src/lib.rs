pub mod console;
pub mod cpu;
pub mod error;
pub mod image;
pub mod instr;
pub mod memory;
pub mod register;
pub mod trap;
pub mod vm;

pub use error::{Fault, LoadError};

pub fn bit(args: u16, nth: u16) -> u16 {
    (args >> nth) & 0x1
}

/// Widens the low `bitcount` bits of `x` to a 16-bit two's-complement word.
///
/// `x` must not have bits set above `bitcount - 1`; callers mask first.
pub fn sign_extend(x: u16, bitcount: u16) -> u16 {
    debug_assert!((1..=16).contains(&bitcount));
    if bitcount < 16 && bit(x, bitcount - 1) == 1 {
        x | 0xffff << bitcount
    } else {
        x
    }
}
