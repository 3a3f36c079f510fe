use crate::register::R;
use crate::{bit, sign_extend};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum OpCode {
    BR,   // 0000
    ADD,  // 0001
    LD,   // 0010
    ST,   // 0011
    JSR,  // 0100
    AND,  // 0101
    LDR,  // 0110
    STR,  // 0111
    RTI,  // 1000
    NOT,  // 1001
    LDI,  // 1010
    STI,  // 1011
    JMP,  // 1100 // JMP R7 == RET
    RES,  // 1101 // reserved
    LEA,  // 1110
    TRAP, // 1111
}

const OPCODES: [OpCode; 16] = [
    OpCode::BR,
    OpCode::ADD,
    OpCode::LD,
    OpCode::ST,
    OpCode::JSR,
    OpCode::AND,
    OpCode::LDR,
    OpCode::STR,
    OpCode::RTI,
    OpCode::NOT,
    OpCode::LDI,
    OpCode::STI,
    OpCode::JMP,
    OpCode::RES,
    OpCode::LEA,
    OpCode::TRAP,
];

/// A fetched instruction word. Decoding is total: every accessor masks its
/// field, so any word yields well-formed operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instr(pub u16);

impl Instr {
    pub fn opcode(self) -> OpCode {
        OPCODES[(self.0 >> 12) as usize]
    }

    /// DR for register writers, SR for stores (bits 11..9).
    pub fn reg_1st(self) -> R {
        R::gpr((self.0 >> 9) & 0x7)
    }

    /// SR1 or BaseR (bits 8..6).
    pub fn reg_2nd(self) -> R {
        R::gpr((self.0 >> 6) & 0x7)
    }

    /// SR2 in register mode (bits 2..0).
    pub fn reg_3rd(self) -> R {
        R::gpr(self.0 & 0x7)
    }

    pub fn imm_mode(self) -> bool {
        bit(self.0, 5) == 1
    }

    /// JSR (PC-relative) versus JSRR (register).
    pub fn long_flag(self) -> bool {
        bit(self.0, 11) == 1
    }

    /// The n/z/p mask of a branch, laid out like the COND register.
    pub fn cond_bits(self) -> u16 {
        (self.0 >> 9) & 0x7
    }

    pub fn imm5(self) -> u16 {
        sign_extend(self.0 & 0x1f, 5)
    }

    pub fn offset6(self) -> u16 {
        sign_extend(self.0 & 0x3f, 6)
    }

    pub fn pc_offset9(self) -> u16 {
        sign_extend(self.0 & 0x1ff, 9)
    }

    pub fn pc_offset11(self) -> u16 {
        sign_extend(self.0 & 0x7ff, 11)
    }

    pub fn trap_vector(self) -> u16 {
        self.0 & 0xff
    }
}

impl From<u16> for Instr {
    fn from(word: u16) -> Self {
        Instr(word)
    }
}

fn signed(word: u16) -> i16 {
    word as i16
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let i = *self;
        match i.opcode() {
            OpCode::ADD | OpCode::AND => {
                let name = if i.opcode() == OpCode::ADD { "ADD" } else { "AND" };
                if i.imm_mode() {
                    write!(f, "{name} {}, {}, #{}", i.reg_1st(), i.reg_2nd(), signed(i.imm5()))
                } else {
                    write!(f, "{name} {}, {}, {}", i.reg_1st(), i.reg_2nd(), i.reg_3rd())
                }
            }
            OpCode::NOT => write!(f, "NOT {}, {}", i.reg_1st(), i.reg_2nd()),
            OpCode::BR => {
                let nzp = i.cond_bits();
                if nzp == 0 {
                    return write!(f, "NOP");
                }
                write!(f, "BR")?;
                if nzp != 0x7 {
                    for (mask, c) in [(0x4, 'n'), (0x2, 'z'), (0x1, 'p')] {
                        if nzp & mask != 0 {
                            write!(f, "{c}")?;
                        }
                    }
                }
                write!(f, " #{}", signed(i.pc_offset9()))
            }
            OpCode::JMP if i.reg_2nd() == R::_7 => write!(f, "RET"),
            OpCode::JMP => write!(f, "JMP {}", i.reg_2nd()),
            OpCode::JSR if i.long_flag() => write!(f, "JSR #{}", signed(i.pc_offset11())),
            OpCode::JSR => write!(f, "JSRR {}", i.reg_2nd()),
            OpCode::LD => write!(f, "LD {}, #{}", i.reg_1st(), signed(i.pc_offset9())),
            OpCode::LDI => write!(f, "LDI {}, #{}", i.reg_1st(), signed(i.pc_offset9())),
            OpCode::LEA => write!(f, "LEA {}, #{}", i.reg_1st(), signed(i.pc_offset9())),
            OpCode::ST => write!(f, "ST {}, #{}", i.reg_1st(), signed(i.pc_offset9())),
            OpCode::STI => write!(f, "STI {}, #{}", i.reg_1st(), signed(i.pc_offset9())),
            OpCode::LDR => write!(f, "LDR {}, {}, #{}", i.reg_1st(), i.reg_2nd(), signed(i.offset6())),
            OpCode::STR => write!(f, "STR {}, {}, #{}", i.reg_1st(), i.reg_2nd(), signed(i.offset6())),
            OpCode::TRAP => write!(f, "TRAP x{:02X}", i.trap_vector()),
            OpCode::RTI => write!(f, "RTI"),
            OpCode::RES => write!(f, ".FILL x{:04X}", i.0),
        }
    }
}
