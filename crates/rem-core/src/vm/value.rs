//! Machine Value Representation
//!
//! Defines the tagged value model of the Register Execution Machine and the
//! conversion/reinterpretation matrix between value kinds. Values are
//! immutable; every producing operation allocates a fresh cell, so cell
//! identity survives plain moves (register copies, stack traffic) and is
//! lost across conversions.

use std::fmt;
use std::rc::Rc;

use crate::error::{RemError, RemResult};
use crate::host::Callable;

/// Identity of an addressable memory region.
///
/// A pointer never changes region: offset arithmetic preserves the region
/// identity, and pointers into different regions are never interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionId {
    Main,
    Stack,
    Irs,
    CallStack,
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionId::Main => "main memory",
            RegionId::Stack => "stack",
            RegionId::Irs => "IRS",
            RegionId::CallStack => "call stack",
        };
        f.write_str(name)
    }
}

/// The five value kinds, in their 3-bit encoding order.
///
/// Kind codes appear in `cvt` instruction words; codes 5-7 are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null = 0b000,
    Int = 0b001,
    Float = 0b010,
    Ptr = 0b011,
    Ext = 0b100,
}

impl ValueKind {
    /// Decode a raw kind code; `None` for reserved codes
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0b000 => Some(ValueKind::Null),
            0b001 => Some(ValueKind::Int),
            0b010 => Some(ValueKind::Float),
            0b011 => Some(ValueKind::Ptr),
            0b100 => Some(ValueKind::Ext),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Ptr => "ptr",
            ValueKind::Ext => "ext",
        }
    }

    /// Display name for a raw kind code, including reserved ones
    pub fn bits_name(bits: u8) -> &'static str {
        match ValueKind::from_bits(bits) {
            Some(kind) => kind.name(),
            None => "reserved",
        }
    }
}

/// A machine value
#[derive(Clone)]
pub enum Value {
    /// Absence of a value
    Null,

    /// 32-bit two's-complement integer
    Int(i32),

    /// IEEE-754 binary32 float
    Float(f32),

    /// Offset into one specific memory region
    Pointer(RegionId, u32),

    /// Opaque host-owned callable handle
    External(Rc<dyn Callable>),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Pointer(..) => ValueKind::Ptr,
            Value::External(_) => ValueKind::Ext,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.kind().name()
    }

    /// Numeric view used by comparisons: exact for int, float, and pointer
    /// offsets. `None` for null and external values.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f as f64),
            Value::Pointer(_, off) => Some(*off as f64),
            Value::Null | Value::External(_) => None,
        }
    }

    /// The pointer payload, or a fatal type mismatch
    pub fn expect_pointer(&self) -> RemResult<(RegionId, u32)> {
        match self {
            Value::Pointer(region, off) => Ok((*region, *off)),
            other => Err(RemError::TypeMismatch {
                expected: "ptr",
                found: other.type_name(),
            }),
        }
    }

    /// The integer payload, or a fatal type mismatch
    pub fn expect_int(&self) -> RemResult<i32> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(RemError::TypeMismatch {
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    /// Convert this value to the target kind.
    ///
    /// Numeric coercion, not bit reinterpretation: int<->float go through
    /// the standard numeric casts, int->ptr and ptr->int exchange the
    /// offset. Conversion to null always succeeds and discards the payload.
    pub fn convert(&self, target: ValueKind) -> RemResult<Value> {
        use ValueKind::*;

        match (self, target) {
            (_, Null) => Ok(Value::Null),

            (Value::Null, Int) => Ok(Value::Int(0)),
            (Value::Null, Float) => Ok(Value::Float(0.0)),
            (Value::Null, Ptr) => Ok(Value::Pointer(RegionId::Main, 0)),

            (Value::Int(n), Int) => Ok(Value::Int(*n)),
            (Value::Int(n), Float) => Ok(Value::Float(*n as f32)),
            (Value::Int(n), Ptr) => Ok(Value::Pointer(RegionId::Main, *n as u32)),

            (Value::Float(f), Int) => Ok(Value::Int(*f as i32)),
            (Value::Float(f), Float) => Ok(Value::Float(*f)),

            (Value::Pointer(_, off), Int) => Ok(Value::Int(*off as i32)),
            (Value::Pointer(region, off), Ptr) => Ok(Value::Pointer(*region, *off)),

            (from, to) => Err(RemError::UnsupportedConversion {
                from: from.type_name(),
                to: to.name(),
            }),
        }
    }

    /// Reinterpret this value's raw 32-bit pattern as the target kind.
    ///
    /// int<->float exchange the IEEE-754 bit pattern via same-size bit
    /// casts; int<->ptr exchange the offset bits. float<->ptr has no
    /// defined reinterpretation.
    pub fn reinterpret(&self, target: ValueKind) -> RemResult<Value> {
        use ValueKind::*;

        match (self, target) {
            (_, Null) => Ok(Value::Null),

            (Value::Null, Int) => Ok(Value::Int(0)),
            (Value::Null, Float) => Ok(Value::Float(0.0)),
            (Value::Null, Ptr) => Ok(Value::Pointer(RegionId::Main, 0)),

            (Value::Int(n), Int) => Ok(Value::Int(*n)),
            (Value::Int(n), Float) => Ok(Value::Float(f32::from_bits(*n as u32))),
            (Value::Int(n), Ptr) => Ok(Value::Pointer(RegionId::Main, *n as u32)),

            (Value::Float(f), Int) => Ok(Value::Int(f.to_bits() as i32)),
            (Value::Float(f), Float) => Ok(Value::Float(*f)),

            (Value::Pointer(_, off), Int) => Ok(Value::Int(*off as i32)),
            (Value::Pointer(region, off), Ptr) => Ok(Value::Pointer(*region, *off)),

            (from, to) => Err(RemError::UnsupportedReinterpretation {
                from: from.type_name(),
                to: to.name(),
            }),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Int(n) => write!(f, "Int({})", n),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Pointer(region, off) => write!(f, "Pointer({:?}, {:#x})", region, off),
            Value::External(_) => f.write_str("External(..)"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Pointer(ra, oa), Value::Pointer(rb, ob)) => ra == rb && oa == ob,
            (Value::External(a), Value::External(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
