use std::io;

use log::trace;

use crate::console::Console;

pub const MEMORY_SIZE: usize = u16::MAX as usize + 1;

/// Keyboard status register; bit 15 set when KBDR holds a fresh key.
pub const KBSR: u16 = 0xfe00;
/// Keyboard data register.
pub const KBDR: u16 = 0xfe02;

const KBSR_READY: u16 = 1 << 15;

pub struct Memory {
    cells: Box<[u16]>,
}

impl Default for Memory {
    fn default() -> Self {
        Memory::new()
    }
}

impl Memory {
    pub fn new() -> Self {
        Memory {
            cells: vec![0; MEMORY_SIZE].into_boxed_slice(),
        }
    }

    /// A load as the program sees it. Reading KBSR polls the keyboard without
    /// blocking and latches any key into KBDR.
    pub fn read(&mut self, addr: u16, console: &dyn Console) -> io::Result<u16> {
        if addr == KBSR {
            let status = match console.poll_key()? {
                Some(key) => {
                    trace!("Mem: key {key:#04x} latched into KBDR");
                    self.cells[KBDR as usize] = key as u16;
                    self.cells[KBSR as usize] | KBSR_READY
                }
                None => self.cells[KBSR as usize] & !KBSR_READY,
            };
            self.cells[KBSR as usize] = status;
        }
        Ok(self.cells[addr as usize])
    }

    /// Raw access with no device side effects.
    pub fn peek(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    pub fn write(&mut self, addr: u16, val: u16) {
        trace!("Mem: writing {val:#06x} to {addr:#06x}");
        self.cells[addr as usize] = val;
    }

    /// Copies `words` in from `origin`, dropping whatever would run past the
    /// top of the address space. Returns how many words landed.
    pub fn load(&mut self, origin: u16, words: &[u16]) -> usize {
        let room = MEMORY_SIZE - origin as usize;
        let n = words.len().min(room);
        self.cells[origin as usize..origin as usize + n].copy_from_slice(&words[..n]);
        n
    }
}
