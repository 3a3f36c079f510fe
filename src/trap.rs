use crate::cpu::{CycleResult, CPU};
use crate::error::Fault;
use crate::register::R;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use log::info;

const IN_PROMPT: &[u8] = b"Enter a character: ";
const HALT_MESSAGE: &[u8] = b"HALT\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u16)]
pub enum TrapVector {
    GETC = 0x20,
    OUT = 0x21,
    PUTS = 0x22,
    IN = 0x23,
    PUTSP = 0x24,
    HALT = 0x25,
}

impl CPU {
    /// Runs the built-in routine for `vector`. R7 already holds the return
    /// address; the routines leave PC where it is.
    pub(crate) fn dispatch_trap(&mut self, vector: u16) -> CycleResult {
        let addr = self.register.read(R::PC).wrapping_sub(1);
        let trap = TrapVector::from_u16(vector).ok_or(Fault::BadTrap { addr, vector })?;

        match trap {
            TrapVector::GETC => self.trap_getc(),
            TrapVector::OUT => self.trap_out(),
            TrapVector::PUTS => self.trap_puts(),
            TrapVector::IN => self.trap_in(),
            TrapVector::PUTSP => self.trap_putsp(),
            TrapVector::HALT => self.trap_halt(),
        }
    }

    fn set_r0(&mut self, val: u16) {
        self.register.write(R::_0, val);
        self.register.update_flag(R::_0);
    }

    fn trap_getc(&mut self) -> CycleResult {
        let key = self.console.read_key()?;
        self.set_r0(key as u16);
        Ok(())
    }

    fn trap_out(&mut self) -> CycleResult {
        let ch = self.register.read(R::_0) as u8;
        self.console.write_bytes(&[ch])?;
        Ok(())
    }

    /// Words from R0 up to the terminating zero.
    fn string_at_r0(&self) -> impl Iterator<Item = u16> + '_ {
        let start = self.register.read(R::_0);
        (0..=u16::MAX)
            .map(move |i| self.memory.peek(start.wrapping_add(i)))
            .take_while(|&word| word != 0)
    }

    fn trap_puts(&mut self) -> CycleResult {
        let out: Vec<u8> = self.string_at_r0().map(|word| word as u8).collect();
        self.console.write_bytes(&out)?;
        Ok(())
    }

    fn trap_in(&mut self) -> CycleResult {
        self.console.write_bytes(IN_PROMPT)?;
        let key = self.console.read_key()?;
        self.console.write_bytes(&[key])?;
        self.set_r0(key as u16);
        Ok(())
    }

    fn trap_putsp(&mut self) -> CycleResult {
        let mut out = Vec::new();
        for word in self.string_at_r0() {
            out.push(word as u8);
            let high = (word >> 8) as u8;
            if high != 0 {
                out.push(high);
            }
        }
        self.console.write_bytes(&out)?;
        Ok(())
    }

    fn trap_halt(&mut self) -> CycleResult {
        self.console.write_bytes(HALT_MESSAGE)?;
        info!("HALT at {:#06x}", self.register.read(R::PC).wrapping_sub(1));
        self.halt();
        Ok(())
    }
}
