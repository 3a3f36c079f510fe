// Hand encoders for the handful of instructions the program tests need.
#![allow(dead_code)]

use std::sync::Arc;

use lc3::console::PipeConsole;
use lc3::image::Image;
use lc3::register::PC_START;
use lc3::vm::VM;

pub const N: u16 = 0b100;
pub const Z: u16 = 0b010;
pub const P: u16 = 0b001;

fn field(val: i16, bits: u16) -> u16 {
    (val as u16) & ((1 << bits) - 1)
}

pub fn add_imm(dr: u16, sr: u16, imm: i16) -> u16 {
    0x1000 | dr << 9 | sr << 6 | 1 << 5 | field(imm, 5)
}

pub fn add_reg(dr: u16, sr1: u16, sr2: u16) -> u16 {
    0x1000 | dr << 9 | sr1 << 6 | sr2
}

pub fn and_imm(dr: u16, sr: u16, imm: i16) -> u16 {
    0x5000 | dr << 9 | sr << 6 | 1 << 5 | field(imm, 5)
}

pub fn not(dr: u16, sr: u16) -> u16 {
    0x903f | dr << 9 | sr << 6
}

pub fn br(nzp: u16, offset: i16) -> u16 {
    nzp << 9 | field(offset, 9)
}

pub fn ld(dr: u16, offset: i16) -> u16 {
    0x2000 | dr << 9 | field(offset, 9)
}

pub fn ldi(dr: u16, offset: i16) -> u16 {
    0xa000 | dr << 9 | field(offset, 9)
}

pub fn ldr(dr: u16, base: u16, offset: i16) -> u16 {
    0x6000 | dr << 9 | base << 6 | field(offset, 6)
}

pub fn lea(dr: u16, offset: i16) -> u16 {
    0xe000 | dr << 9 | field(offset, 9)
}

pub fn st(sr: u16, offset: i16) -> u16 {
    0x3000 | sr << 9 | field(offset, 9)
}

pub fn sti(sr: u16, offset: i16) -> u16 {
    0xb000 | sr << 9 | field(offset, 9)
}

pub fn str_at(sr: u16, base: u16, offset: i16) -> u16 {
    0x7000 | sr << 9 | base << 6 | field(offset, 6)
}

pub fn jsr(offset: i16) -> u16 {
    0x4800 | field(offset, 11)
}

pub fn jsrr(base: u16) -> u16 {
    0x4000 | base << 6
}

pub fn jmp(base: u16) -> u16 {
    0xc000 | base << 6
}

pub const RET: u16 = 0xc1c0;
pub const GETC: u16 = 0xf020;
pub const OUT: u16 = 0xf021;
pub const PUTS: u16 = 0xf022;
pub const IN: u16 = 0xf023;
pub const PUTSP: u16 = 0xf024;
pub const HALT: u16 = 0xf025;

pub fn stringz(s: &str) -> Vec<u16> {
    s.bytes().map(u16::from).chain(std::iter::once(0)).collect()
}

pub fn machine(program: &[u16], input: &[u8]) -> (VM, Arc<PipeConsole>) {
    let console = Arc::new(PipeConsole::with_input(input));
    let mut vm = VM::new(console.clone());
    vm.load(&Image { origin: PC_START, words: program.to_vec() });
    (vm, console)
}
