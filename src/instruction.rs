//! # instruction
//!
//! Every CHIP-8 instruction is a big-endian 16 bit word. The top nibble picks
//! the family; families 0, 8, E and F dispatch again on their low nibble or
//! low byte. Operands sit in fixed fields:
//!
//!   .X..  register index (bits 8-11)
//!   ..Y.  register index (bits 4-7)
//!   ...N  4 bit immediate
//!   ..NN  8 bit immediate
//!   .NNN  12 bit address

/// a raw instruction word, with accessors for the operand fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Opcode(pub u16);

impl Opcode {
    pub fn family(self) -> u8 {
        (self.0 >> 12) as u8
    }
    pub fn x(self) -> usize {
        ((self.0 & 0x0f00) >> 8) as usize
    }
    pub fn y(self) -> usize {
        ((self.0 & 0x00f0) >> 4) as usize
    }
    pub fn n(self) -> u8 {
        (self.0 & 0x000f) as u8
    }
    pub fn nn(self) -> u8 {
        (self.0 & 0x00ff) as u8
    }
    pub fn nnn(self) -> u16 {
        self.0 & 0x0fff
    }
}

/// The base instruction set. Register operands are indices 0x0-0xF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 00E0
    Cls,
    /// 00EE
    Ret,
    /// 1NNN
    Jp(u16),
    /// 2NNN
    Call(u16),
    /// 3XNN
    SeByte(usize, u8),
    /// 4XNN
    SneByte(usize, u8),
    /// 5XY0 (low nibble ignored)
    SeReg(usize, usize),
    /// 6XNN
    LdByte(usize, u8),
    /// 7XNN
    AddByte(usize, u8),
    /// 8XY0
    LdReg(usize, usize),
    /// 8XY1
    Or(usize, usize),
    /// 8XY2
    And(usize, usize),
    /// 8XY3
    Xor(usize, usize),
    /// 8XY4
    AddReg(usize, usize),
    /// 8XY5 -- VX = VX - VY
    Sub(usize, usize),
    /// 8XY6
    Shr(usize, usize),
    /// 8XY7 -- VX = VY - VX
    Subn(usize, usize),
    /// 8XYE
    Shl(usize, usize),
    /// 9XY0 (low nibble ignored)
    SneReg(usize, usize),
    /// ANNN
    LdI(u16),
    /// BNNN
    JpV0(u16),
    /// CXNN
    Rnd(usize, u8),
    /// DXYN
    Drw(usize, usize, u8),
    /// EX9E
    Skp(usize),
    /// EXA1
    Sknp(usize),
    /// FX07
    LdRegDt(usize),
    /// FX0A
    LdKey(usize),
    /// FX15
    LdDtReg(usize),
    /// FX18
    LdSt(usize),
    /// FX1E
    AddI(usize),
    /// FX29
    LdF(usize),
    /// FX33
    LdB(usize),
    /// FX55
    StoreRegs(usize),
    /// FX65
    LoadRegs(usize),
}

impl Instruction {
    /// decode a word; `None` if it isn't part of the base set
    pub fn decode(opcode: Opcode) -> Option<Instruction> {
        use Instruction::*;
        let (x, y) = (opcode.x(), opcode.y());
        let instruction = match opcode.family() {
            0x0 => match opcode.0 {
                0x00e0 => Cls,
                0x00ee => Ret,
                _ => return None,
            },
            0x1 => Jp(opcode.nnn()),
            0x2 => Call(opcode.nnn()),
            0x3 => SeByte(x, opcode.nn()),
            0x4 => SneByte(x, opcode.nn()),
            0x5 => SeReg(x, y),
            0x6 => LdByte(x, opcode.nn()),
            0x7 => AddByte(x, opcode.nn()),
            0x8 => match opcode.n() {
                0x0 => LdReg(x, y),
                0x1 => Or(x, y),
                0x2 => And(x, y),
                0x3 => Xor(x, y),
                0x4 => AddReg(x, y),
                0x5 => Sub(x, y),
                0x6 => Shr(x, y),
                0x7 => Subn(x, y),
                0xe => Shl(x, y),
                _ => return None,
            },
            0x9 => SneReg(x, y),
            0xa => LdI(opcode.nnn()),
            0xb => JpV0(opcode.nnn()),
            0xc => Rnd(x, opcode.nn()),
            0xd => Drw(x, y, opcode.n()),
            0xe => match opcode.nn() {
                0x9e => Skp(x),
                0xa1 => Sknp(x),
                _ => return None,
            },
            0xf => match opcode.nn() {
                0x07 => LdRegDt(x),
                0x0a => LdKey(x),
                0x15 => LdDtReg(x),
                0x18 => LdSt(x),
                0x1e => AddI(x),
                0x29 => LdF(x),
                0x33 => LdB(x),
                0x55 => StoreRegs(x),
                0x65 => LoadRegs(x),
                _ => return None,
            },
            _ => return None,
        };
        Some(instruction)
    }
}
