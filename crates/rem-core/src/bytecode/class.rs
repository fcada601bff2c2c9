//! Instruction Class Definitions
//!
//! Defines the instruction classes and comparison methods of the REM
//! instruction set. This file contains no execution semantics.
//! Class nibbles are an eternal contract.

use crate::error::{RemError, RemResult};

/// Instruction classes, selected by bits 31-28 of every word.
///
/// Nibbles 10-15 are reserved; fetching one is fatal.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrClass {
    Nop = 0x0,
    Exit = 0x1,
    Push = 0x2,
    Pop = 0x3,
    Ret = 0x4,
    Get = 0x5,
    Set = 0x6,
    Branch = 0x7,
    Cmp = 0x8,
    Cvt = 0x9,
}

impl InstrClass {
    /// Convert the high nibble of an instruction word to a class
    pub fn from_nibble(nibble: u8) -> RemResult<Self> {
        match nibble {
            0x0 => Ok(InstrClass::Nop),
            0x1 => Ok(InstrClass::Exit),
            0x2 => Ok(InstrClass::Push),
            0x3 => Ok(InstrClass::Pop),
            0x4 => Ok(InstrClass::Ret),
            0x5 => Ok(InstrClass::Get),
            0x6 => Ok(InstrClass::Set),
            0x7 => Ok(InstrClass::Branch),
            0x8 => Ok(InstrClass::Cmp),
            0x9 => Ok(InstrClass::Cvt),
            _ => Err(RemError::ReservedInstructionClass(nibble)),
        }
    }
}

/// Comparison methods for the `cmp` class.
///
/// The 3-bit method code is shared between the immediate and register
/// forms, but two codes differ by form: 0b100 is logical-not against an
/// immediate and same-instance between registers, while 0b011 and 0b111
/// exist only in the immediate form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpMethod {
    /// Three-way compare: -1 / 0 / 1
    Ordered,
    Eq,
    Lt,
    /// Immediate form only
    Gt,
    /// Immediate form only; eligible for the IRS immediate push
    Not,
    /// Register form only: identity of the two operand cells
    Same,
    Neq,
    Gte,
    /// Immediate form only
    Lte,
}

impl CmpMethod {
    /// Decode a 3-bit method code for the given operand form
    pub fn decode(code: u8, register_form: bool) -> RemResult<Self> {
        match (code, register_form) {
            (0b000, _) => Ok(CmpMethod::Ordered),
            (0b001, _) => Ok(CmpMethod::Eq),
            (0b010, _) => Ok(CmpMethod::Lt),
            (0b011, false) => Ok(CmpMethod::Gt),
            (0b100, false) => Ok(CmpMethod::Not),
            (0b100, true) => Ok(CmpMethod::Same),
            (0b101, _) => Ok(CmpMethod::Neq),
            (0b110, _) => Ok(CmpMethod::Gte),
            (0b111, false) => Ok(CmpMethod::Lte),
            _ => Err(RemError::ReservedComparisonMethod(code)),
        }
    }
}
