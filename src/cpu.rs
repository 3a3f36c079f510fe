use crate::console::Console;
use crate::error::Fault;
use crate::instr::{Instr, OpCode};
use crate::memory::Memory;
use crate::register::{Register, R};
use std::sync::Arc;

use log::debug;

pub type CycleResult = Result<(), Fault>;

pub struct CPU {
    pub(crate) register: Register,
    pub(crate) memory: Memory,
    pub(crate) console: Arc<dyn Console>,
    pub(crate) running: bool,
}

impl CPU {
    pub fn new(console: Arc<dyn Console>) -> Self {
        CPU {
            register: Register::new(),
            memory: Memory::new(),
            console,
            running: true,
        }
    }

    pub fn tick(&mut self) -> CycleResult {
        let addr = self.register.read_incr(R::PC);
        let instr = Instr(self.mem_read(addr)?);
        debug!("PC: {addr:#06x}: {instr}");

        match instr.opcode() {
            OpCode::BR => self.mnemonic_br(instr),
            OpCode::ADD => self.mnemonic_add(instr),
            OpCode::LD => self.mnemonic_ld(instr)?,
            OpCode::ST => self.mnemonic_st(instr),
            OpCode::JSR => self.mnemonic_jsr(instr),
            OpCode::AND => self.mnemonic_and(instr),
            OpCode::LDR => self.mnemonic_ldr(instr)?,
            OpCode::STR => self.mnemonic_str(instr),
            OpCode::RTI => return Err(Fault::Rti { addr }),
            OpCode::NOT => self.mnemonic_not(instr),
            OpCode::LDI => self.mnemonic_ldi(instr)?,
            OpCode::STI => self.mnemonic_sti(instr)?,
            OpCode::JMP => self.mnemonic_jmp(instr),
            OpCode::RES => return Err(Fault::ReservedOpcode { addr, instr: instr.0 }),
            OpCode::LEA => self.mnemonic_lea(instr),
            OpCode::TRAP => self.mnemonic_trap(instr)?,
        }

        Ok(())
    }

    pub fn check_interrupt(&self) -> CycleResult {
        Ok(self.console.check_interrupt()?)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn halt(&mut self) {
        self.running = false
    }

    pub fn reg_store(&mut self, r: R, val: u16) {
        self.register.write(r, val);
    }

    pub fn reg_load(&self, r: R) -> u16 {
        self.register.read(r)
    }

    pub fn register(&self) -> &Register {
        &self.register
    }

    /// Program-visible load; goes through the keyboard registers.
    pub fn mem_read(&mut self, addr: u16) -> Result<u16, Fault> {
        Ok(self.memory.read(addr, self.console.as_ref())?)
    }

    pub fn mem_write(&mut self, addr: u16, val: u16) {
        self.memory.write(addr, val);
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn pc_relative(&self, offset: u16) -> u16 {
        self.register.read(R::PC).wrapping_add(offset)
    }

    fn set_reg_with_flag(&mut self, r: R, val: u16) {
        self.register.write(r, val);
        self.register.update_flag(r);
    }

    fn mnemonic_br(&mut self, args: Instr) {
        if args.cond_bits() & self.register.read(R::COND) != 0 {
            self.register.write(R::PC, self.pc_relative(args.pc_offset9()));
        }
    }

    fn mnemonic_imm5_or_sr2<F>(&mut self, args: Instr, func: F)
    where
        F: Fn(u16, u16) -> u16,
    {
        let r0 = args.reg_1st();
        let r1 = args.reg_2nd();
        let operand = if args.imm_mode() {
            args.imm5()
        } else {
            self.register.read(args.reg_3rd())
        };
        self.set_reg_with_flag(r0, func(self.register.read(r1), operand));
    }

    fn mnemonic_add(&mut self, args: Instr) {
        self.mnemonic_imm5_or_sr2(args, |r1, r2| r1.wrapping_add(r2))
    }

    fn mnemonic_and(&mut self, args: Instr) {
        self.mnemonic_imm5_or_sr2(args, |r1, r2| r1 & r2)
    }

    fn mnemonic_not(&mut self, args: Instr) {
        let r0 = args.reg_1st();
        let r1 = args.reg_2nd();
        self.set_reg_with_flag(r0, !self.register.read(r1));
    }

    fn mnemonic_jmp(&mut self, args: Instr) {
        self.register.write(R::PC, self.register.read(args.reg_2nd()));
    }

    fn mnemonic_jsr(&mut self, args: Instr) {
        // TEMP = target, then R7 = PC, as the ISA orders it; JSRR R7 jumps to the old R7.
        let target = if args.long_flag() {
            self.pc_relative(args.pc_offset11())
        } else {
            self.register.read(args.reg_2nd())
        };
        self.register.write(R::_7, self.register.read(R::PC));
        self.register.write(R::PC, target);
    }

    fn mnemonic_ld(&mut self, args: Instr) -> CycleResult {
        let val = self.mem_read(self.pc_relative(args.pc_offset9()))?;
        self.set_reg_with_flag(args.reg_1st(), val);
        Ok(())
    }

    fn mnemonic_ldi(&mut self, args: Instr) -> CycleResult {
        let ptr = self.mem_read(self.pc_relative(args.pc_offset9()))?;
        let val = self.mem_read(ptr)?;
        self.set_reg_with_flag(args.reg_1st(), val);
        Ok(())
    }

    fn mnemonic_ldr(&mut self, args: Instr) -> CycleResult {
        let base = self.register.read(args.reg_2nd());
        let val = self.mem_read(base.wrapping_add(args.offset6()))?;
        self.set_reg_with_flag(args.reg_1st(), val);
        Ok(())
    }

    fn mnemonic_lea(&mut self, args: Instr) {
        self.set_reg_with_flag(args.reg_1st(), self.pc_relative(args.pc_offset9()));
    }

    fn mnemonic_st(&mut self, args: Instr) {
        self.mem_write(self.pc_relative(args.pc_offset9()), self.register.read(args.reg_1st()));
    }

    fn mnemonic_sti(&mut self, args: Instr) -> CycleResult {
        let ptr = self.mem_read(self.pc_relative(args.pc_offset9()))?;
        self.mem_write(ptr, self.register.read(args.reg_1st()));
        Ok(())
    }

    fn mnemonic_str(&mut self, args: Instr) {
        let base = self.register.read(args.reg_2nd());
        self.mem_write(base.wrapping_add(args.offset6()), self.register.read(args.reg_1st()));
    }

    fn mnemonic_trap(&mut self, args: Instr) -> CycleResult {
        self.register.write(R::_7, self.register.read(R::PC));
        self.dispatch_trap(args.trap_vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::PipeConsole;
    use crate::memory::{KBDR, KBSR};
    use crate::register::{Flag, PC_START};

    fn cpu_with(program: &[u16]) -> CPU {
        let mut cpu = CPU::new(Arc::new(PipeConsole::new()));
        cpu.memory_mut().load(PC_START, program);
        cpu
    }

    fn step(cpu: &mut CPU, n: usize) {
        for _ in 0..n {
            cpu.tick().unwrap();
        }
    }

    fn flag(cpu: &CPU) -> Flag {
        cpu.register().get_flag().unwrap()
    }

    #[test]
    fn add_immediate() {
        // ADD R0, R1, #2
        let mut cpu = cpu_with(&[0x1062]);
        cpu.reg_store(R::_0, 5);
        cpu.reg_store(R::_1, 3);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_0), 5);
        assert_eq!(flag(&cpu), Flag::Positive);
    }

    #[test]
    fn add_register_wraps() {
        // ADD R2, R0, R1
        let mut cpu = cpu_with(&[0x1401]);
        cpu.reg_store(R::_0, 0xffff);
        cpu.reg_store(R::_1, 1);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_2), 0);
        assert_eq!(flag(&cpu), Flag::Zero);
    }

    #[test]
    fn add_negative_immediate() {
        // ADD R0, R0, #-1
        let mut cpu = cpu_with(&[0x103f]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_0), 0xffff);
        assert_eq!(flag(&cpu), Flag::Negative);
    }

    #[test]
    fn and_register() {
        // AND R1, R2, R3
        let mut cpu = cpu_with(&[0x5283]);
        cpu.reg_store(R::_2, 0xff0f);
        cpu.reg_store(R::_3, 0x0ff0);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_1), 0x0f00);
        assert_eq!(flag(&cpu), Flag::Positive);
    }

    #[test]
    fn and_immediate_clears() {
        // AND R4, R4, #0
        let mut cpu = cpu_with(&[0x5920]);
        cpu.reg_store(R::_4, 0x1234);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_4), 0);
        assert_eq!(flag(&cpu), Flag::Zero);
    }

    #[test]
    fn not() {
        // NOT R0, R1
        let mut cpu = cpu_with(&[0x907f]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_0), 0xffff);
        assert_eq!(flag(&cpu), Flag::Negative);
    }

    #[test]
    fn branch_taken_on_zero() {
        // AND R0, R0, #0 ; BRz #2
        let mut cpu = cpu_with(&[0x5020, 0x0402]);
        step(&mut cpu, 2);
        assert_eq!(cpu.reg_load(R::PC), PC_START + 2 + 2);
    }

    #[test]
    fn branch_not_taken() {
        // AND R0, R0, #0 ; BRn #2
        let mut cpu = cpu_with(&[0x5020, 0x0802]);
        step(&mut cpu, 2);
        assert_eq!(cpu.reg_load(R::PC), PC_START + 2);
    }

    #[test]
    fn branch_with_empty_mask_never_jumps() {
        // BR with nzp = 000
        let mut cpu = cpu_with(&[0x0005]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::PC), PC_START + 1);
    }

    #[test]
    fn branch_backwards() {
        // ADD R0, R0, #1 ; BRp #-2
        let mut cpu = cpu_with(&[0x1021, 0x03fe]);
        step(&mut cpu, 2);
        assert_eq!(cpu.reg_load(R::PC), PC_START);
    }

    #[test]
    fn ld_and_lea() {
        // LD R3, #1 ; LEA R4, #-2 ; .FILL x8001
        let mut cpu = cpu_with(&[0x2601, 0xe9fe, 0x8001]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_3), 0x8001);
        assert_eq!(flag(&cpu), Flag::Negative);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_4), PC_START);
        assert_eq!(flag(&cpu), Flag::Positive);
    }

    #[test]
    fn ldi_double_indirection() {
        // LDI R0, #1 ; HALT ; .FILL x4000
        let mut cpu = cpu_with(&[0xa001, 0xf025, 0x4000]);
        cpu.mem_write(0x4000, 0x00ab);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_0), 0x00ab);
        assert_eq!(flag(&cpu), Flag::Positive);
    }

    #[test]
    fn ldi_through_keyboard_status() {
        // LDI R0, #0 ; .FILL xFE00
        let console = Arc::new(PipeConsole::with_input(b"k"));
        let mut cpu = CPU::new(console.clone());
        cpu.memory_mut().load(PC_START, &[0xa000, KBSR]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_0) & 0x8000, 0x8000);
        assert_eq!(flag(&cpu), Flag::Negative);
        assert_eq!(cpu.memory().peek(KBDR), b'k' as u16);
    }

    #[test]
    fn ldr_and_str() {
        // LDR R1, R2, #-1 ; STR R1, R2, #3
        let mut cpu = cpu_with(&[0x62bf, 0x7283]);
        cpu.reg_store(R::_2, 0x5000);
        cpu.mem_write(0x4fff, 0x0042);
        step(&mut cpu, 2);
        assert_eq!(cpu.reg_load(R::_1), 0x0042);
        assert_eq!(cpu.memory().peek(0x5003), 0x0042);
    }

    #[test]
    fn st_and_sti() {
        // ST R5, #2 ; STI R5, #2 ; (hole) ; (hole) ; .FILL x6000
        let mut cpu = cpu_with(&[0x3a02, 0xba02, 0, 0, 0x6000]);
        cpu.reg_store(R::_5, 0x0777);
        step(&mut cpu, 2);
        assert_eq!(cpu.memory().peek(PC_START + 3), 0x0777);
        assert_eq!(cpu.memory().peek(0x6000), 0x0777);
    }

    #[test]
    fn stores_leave_flags_alone() {
        // ADD R5, R5, #-1 ; ST R5, #5
        let mut cpu = cpu_with(&[0x1b7f, 0x3a05]);
        step(&mut cpu, 2);
        assert_eq!(flag(&cpu), Flag::Negative);
    }

    #[test]
    fn jsr_and_ret_round_trip() {
        // JSR #2 ; HALT ; (hole) ; ADD R0, R0, #1 ; RET
        let mut cpu = cpu_with(&[0x4802, 0xf025, 0, 0x1021, 0xc1c0]);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_7), PC_START + 1);
        assert_eq!(cpu.reg_load(R::PC), PC_START + 3);
        step(&mut cpu, 2);
        assert_eq!(cpu.reg_load(R::PC), PC_START + 1);
        assert_eq!(cpu.reg_load(R::_0), 1);
    }

    #[test]
    fn jsrr_through_register() {
        // JSRR R3
        let mut cpu = cpu_with(&[0x40c0]);
        cpu.reg_store(R::_3, 0x4444);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::_7), PC_START + 1);
        assert_eq!(cpu.reg_load(R::PC), 0x4444);
    }

    #[test]
    fn jsrr_r7_uses_old_value() {
        // JSRR R7
        let mut cpu = cpu_with(&[0x41c0]);
        cpu.reg_store(R::_7, 0x4100);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::PC), 0x4100);
        assert_eq!(cpu.reg_load(R::_7), PC_START + 1);
    }

    #[test]
    fn jmp_any_register() {
        // JMP R2
        let mut cpu = cpu_with(&[0xc080]);
        cpu.reg_store(R::_2, 0x1234);
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::PC), 0x1234);
    }

    #[test]
    fn rti_faults() {
        let mut cpu = cpu_with(&[0x8000]);
        match cpu.tick() {
            Err(Fault::Rti { addr }) => assert_eq!(addr, PC_START),
            other => panic!("expected RTI fault, got {other:?}"),
        }
    }

    #[test]
    fn reserved_opcode_faults() {
        let mut cpu = cpu_with(&[0xdead]);
        match cpu.tick() {
            Err(Fault::ReservedOpcode { addr, instr }) => {
                assert_eq!(addr, PC_START);
                assert_eq!(instr, 0xdead);
            }
            other => panic!("expected reserved opcode fault, got {other:?}"),
        }
    }

    #[test]
    fn pc_wraps_past_top_of_memory() {
        let mut cpu = cpu_with(&[]);
        cpu.reg_store(R::PC, 0xffff);
        // word at 0xffff is 0: BR with no condition bits
        step(&mut cpu, 1);
        assert_eq!(cpu.reg_load(R::PC), 0);
    }
}
