use crate::console::Console;
use crate::cpu::{CycleResult, CPU};
use crate::error::{Fault, LoadError};
use crate::image::Image;
use crate::register::{PC_START, R};
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};

/// Instructions between checks for a Ctrl-C from the console.
const INTERRUPT_CHECK_INTERVAL: u64 = 1024;

pub struct Args {
    pub images: Vec<PathBuf>,
    pub offset: u16,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            images: Vec::new(),
            offset: PC_START,
        }
    }
}

pub struct VM {
    cpu: CPU,
    steps: u64,
}

impl VM {
    pub fn new(console: Arc<dyn Console>) -> Self {
        VM {
            cpu: CPU::new(console),
            steps: 0,
        }
    }

    /// Loads every image in order and points PC at `args.offset`.
    pub fn boot(&mut self, args: &Args) -> Result<(), LoadError> {
        for path in &args.images {
            let image = Image::from_file(path)?;
            info!("Loading {} at {:#06x} ({} words)", path.display(), image.origin, image.words.len());
            self.load(&image);
        }
        self.cpu.reg_store(R::PC, args.offset);
        Ok(())
    }

    pub fn load(&mut self, image: &Image) {
        let loaded = self.cpu.memory_mut().load(image.origin, &image.words);
        if loaded < image.words.len() {
            warn!(
                "Image at {:#06x} runs past the end of memory; dropped {} words",
                image.origin,
                image.words.len() - loaded
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    /// Executes one instruction.
    pub fn next(&mut self) -> CycleResult {
        self.steps += 1;
        self.cpu.tick()
    }

    /// Runs until HALT or the first fault.
    pub fn run(&mut self) -> Result<(), Fault> {
        while self.is_running() {
            if self.steps % INTERRUPT_CHECK_INTERVAL == 0 {
                self.cpu.check_interrupt()?;
            }
            self.next()?;
        }
        info!("Halted after {} instructions", self.steps);
        Ok(())
    }

    pub fn abort(&mut self) {
        self.cpu.halt()
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn cpu(&self) -> &CPU {
        &self.cpu
    }
}
