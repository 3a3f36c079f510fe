use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Conditions that stop the execution loop short of a HALT.
#[derive(Debug, Error)]
pub enum Fault {
    #[error("RTI at {addr:#06x}: no interrupts in this machine")]
    Rti { addr: u16 },

    #[error("reserved opcode {instr:#06x} at {addr:#06x}")]
    ReservedOpcode { addr: u16, instr: u16 },

    #[error("unknown trap vector {vector:#04x} at {addr:#06x}")]
    BadTrap { addr: u16, vector: u16 },

    #[error("console: {0}")]
    Console(#[from] io::Error),
}

impl Fault {
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Fault::Console(e) if e.kind() == io::ErrorKind::Interrupted)
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to load image {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("image {} has no origin word", path.display())]
    Empty { path: PathBuf },
}
