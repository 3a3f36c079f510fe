use log::trace;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use std::fmt;

pub const PC_START: u16 = 0x3000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum R {
    _0,
    _1,
    _2,
    _3,
    _4,
    _5,
    _6,
    _7,
    PC,
    COND,
}

const GPRS: [R; 8] = [R::_0, R::_1, R::_2, R::_3, R::_4, R::_5, R::_6, R::_7];

impl R {
    /// General purpose register by index. Operand fields are masked to three
    /// bits before they get here, so anything else is a bug.
    pub fn gpr(index: u16) -> R {
        assert!(index < 8, "register index out of bound: {}", index);
        GPRS[index as usize]
    }
}

impl fmt::Display for R {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            R::PC => write!(f, "PC"),
            R::COND => write!(f, "COND"),
            r => write!(f, "R{}", *r as u16),
        }
    }
}

#[derive(Debug, Clone, Copy, FromPrimitive, PartialEq, Eq)]
#[repr(u16)]
pub enum Flag {
    Positive = 1 << 0,
    Zero = 1 << 1,
    Negative = 1 << 2,
}

impl Flag {
    pub fn classify(word: u16) -> Flag {
        match word {
            0 => Flag::Zero,
            x if x >> 15 == 1 => Flag::Negative,
            _ => Flag::Positive,
        }
    }
}

impl TryFrom<u16> for Flag {
    type Error = String;

    fn try_from(val: u16) -> Result<Self, Self::Error> {
        Flag::from_u16(val & 7).ok_or(format!("wrong condition flag `{}`", val & 7))
    }
}

pub struct Register([u16; 10]);

impl Default for Register {
    fn default() -> Self {
        Register::new()
    }
}

impl Register {
    pub fn new() -> Self {
        let mut register = Register([0; 10]);
        register.write(R::PC, PC_START);
        register.set_flag(Flag::Zero);
        register
    }

    pub fn write(&mut self, r: R, val: u16) {
        trace!("Reg: writing {val:#06x} to {r}");
        self.0[r as usize] = val;
    }

    pub fn read(&self, r: R) -> u16 {
        self.0[r as usize]
    }

    pub fn read_incr(&mut self, r: R) -> u16 {
        let val = self.read(r);
        self.incr(r);
        val
    }

    pub fn update_flag(&mut self, r: R) {
        self.set_flag(Flag::classify(self.read(r)));
    }

    pub fn set_flag(&mut self, f: Flag) {
        self.write(R::COND, f as u16);
    }

    pub fn get_flag(&self) -> Result<Flag, String> {
        Flag::try_from(self.read(R::COND))
    }

    pub fn incr(&mut self, r: R) {
        self.write(r, self.read(r).wrapping_add(1));
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, val) in self.0[..8].iter().enumerate() {
            write!(f, "R{i}={val:#06x} ")?;
        }
        write!(f, "PC={:#06x} COND={:03b}", self.read(R::PC), self.read(R::COND))
    }
}
