//! Virtual Machine Core
//!
//! The Register Execution Machine: a single-threaded fetch-decode-execute
//! loop over 32-bit big-endian instruction words, a 32-entry register file
//! with special-role registers, and four fixed-capacity memory regions.
//! Host callables invoked by register-mode calls run synchronously inside
//! the current instruction and must not re-enter the loop.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::bytecode::{CmpMethod, InstrClass, Instruction};
use crate::config::RemConfig;
use crate::error::{RemError, RemResult};
use crate::host::{EnvValue, HostBridge};

use super::memory::{ValueRegion, WordRegion};
use super::registers::{
    role_of, RegisterFile, Role, NUM_REGISTERS, REG_COMP, REG_IRSP, REG_PC, REG_SP,
};
use super::value::{RegionId, Value, ValueKind};

/// Exit value recorded by the exit instruction, matching the form used:
/// the signed immediate, or the full value held in a register.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitValue {
    Int(i32),
    Value(Rc<Value>),
}

/// Register Execution Machine
pub struct VirtualMachine {
    config: RemConfig,
    registers: RegisterFile,

    main: WordRegion,
    stack: ValueRegion,
    call_stack: WordRegion,
    irs: WordRegion,
    /// Call stack top; the call stack is never an addressable register target
    csp: u32,

    host: Box<dyn HostBridge>,

    stopped: bool,
    branching: bool,
    exit_value: Option<ExitValue>,
}

impl VirtualMachine {
    /// Create a new machine instance over a host bridge
    pub fn new(config: RemConfig, host: Box<dyn HostBridge>) -> Self {
        VirtualMachine {
            registers: RegisterFile::new(),
            main: WordRegion::new(RegionId::Main, config.main_memory_words),
            stack: ValueRegion::new(RegionId::Stack, config.stack_cells),
            call_stack: WordRegion::new(RegionId::CallStack, config.call_stack_words),
            irs: WordRegion::new(RegionId::Irs, config.irs_words),
            csp: 0,
            host,
            stopped: false,
            branching: false,
            exit_value: None,
            config,
        }
    }

    /// Restore the power-on state. The host environment is untouched.
    pub fn reset(&mut self) {
        self.stopped = false;
        self.branching = false;
        self.exit_value = None;

        self.registers.reset();

        self.main.clear();
        self.stack.clear();
        self.call_stack.clear();
        self.irs.clear();
        self.csp = 0;
    }

    /// Reset the machine, then copy a program image verbatim into main
    /// memory starting at address 0.
    pub fn load_program(&mut self, words: &[u32]) -> RemResult<()> {
        self.reset();

        for (addr, word) in words.iter().enumerate() {
            self.main.write(addr as u32, *word)?;
        }
        Ok(())
    }

    /// Execute instructions until the machine stops
    pub fn run(&mut self) -> RemResult<ExitValue> {
        loop {
            if let Some(exit) = self.step()? {
                return Ok(exit);
            }
        }
    }

    /// Execute a single instruction.
    ///
    /// Once the machine has stopped, further steps are no-ops that keep
    /// returning the recorded exit value.
    pub fn step(&mut self) -> RemResult<Option<ExitValue>> {
        if self.stopped {
            return Ok(self.exit_value.clone());
        }

        let pc = self.pc_offset()?;
        let word = self.main.read(pc)?;
        self.execute(word)?;

        if !self.branching {
            self.write_register(REG_PC, Rc::new(Value::Pointer(RegionId::Main, pc.wrapping_add(1))))?;
        }
        self.branching = false;

        Ok(self.exit_value.clone())
    }

    fn execute(&mut self, word: u32) -> RemResult<()> {
        let instr = Instruction::decode(word)?;
        trace!("executing {:08x} as {:?}", word, instr.class);

        let irs_eligible = match instr.class {
            InstrClass::Nop => true,
            InstrClass::Exit => self.exec_exit(&instr)?,
            InstrClass::Push => self.exec_push(&instr)?,
            InstrClass::Pop => self.exec_pop(&instr)?,
            InstrClass::Ret => self.exec_ret(&instr)?,
            InstrClass::Get => self.exec_env_read(&instr)?,
            InstrClass::Set => self.exec_env_write(&instr)?,
            InstrClass::Branch => self.exec_branch(&instr)?,
            InstrClass::Cmp => self.exec_cmp(&instr)?,
            InstrClass::Cvt => self.exec_cvt(&instr)?,
        };

        if irs_eligible && instr.s {
            self.irs_push(instr.imm_signed())?;
        }
        Ok(())
    }

    // --- instruction handlers -------------------------------------------

    fn exec_exit(&mut self, instr: &Instruction) -> RemResult<bool> {
        let exit = if instr.c0 & 0b001 != 0 {
            ExitValue::Value(self.read_register(instr.r0)?)
        } else {
            ExitValue::Int(instr.imm_signed())
        };

        debug!("halting with {:?}", exit);
        self.stopped = true;
        self.exit_value = Some(exit);
        Ok(false)
    }

    fn exec_push(&mut self, instr: &Instruction) -> RemResult<bool> {
        if instr.c0 & 0b001 != 0 {
            let value = self.read_register(instr.r0)?;
            self.stack_push(value)?;
            Ok(true)
        } else {
            self.stack_push(Rc::new(Value::Int(instr.imm_signed())))?;
            Ok(false)
        }
    }

    fn exec_pop(&mut self, instr: &Instruction) -> RemResult<bool> {
        if instr.c0 & 0b001 != 0 {
            let word = self.irs_pop()?;
            self.write_register(instr.r0, Rc::new(Value::Int(word)))?;
        } else {
            let value = self.stack_pop()?;
            self.write_register(instr.r0, value)?;
        }
        Ok(true)
    }

    fn exec_ret(&mut self, _instr: &Instruction) -> RemResult<bool> {
        self.call_stack_pop()?;
        self.branching = true;
        Ok(true)
    }

    /// `get` and `load`: environment lookup through a string-pointer key
    fn exec_env_read(&mut self, instr: &Instruction) -> RemResult<bool> {
        let key = self.read_env_key(instr.r1)?;
        let load_external = instr.c0 & 0b001 != 0;

        let result = match self.host.environment_get(&key) {
            None => Rc::new(Value::Null),
            Some(EnvValue::Int(n)) => {
                if load_external {
                    return Err(RemError::TypeMismatch {
                        expected: "callable",
                        found: "int",
                    });
                }
                Rc::new(Value::Int(n))
            }
            Some(EnvValue::Callable(callable)) => {
                if !load_external {
                    return Err(RemError::EnvironmentValueNotInteger(key));
                }
                Rc::new(Value::External(callable))
            }
        };

        debug!("environment read {:?} -> {:?}", key, result);
        self.write_register(instr.r0, result)?;
        Ok(false)
    }

    fn exec_env_write(&mut self, instr: &Instruction) -> RemResult<bool> {
        let key = self.read_env_key(instr.r1)?;
        let value = self.read_register(instr.r0)?;
        let n = value.expect_int()?;

        debug!("environment write {:?} = {}", key, n);
        self.host.environment_set(&key, n);
        Ok(false)
    }

    fn exec_branch(&mut self, instr: &Instruction) -> RemResult<bool> {
        let use_register = instr.c0 & 0b001 != 0;
        let absolute = instr.c0 & 0b010 != 0;
        let call = instr.c0 & 0b100 != 0;

        if instr.c1 & 0b100 != 0 {
            let comp = self.read_register(REG_COMP)?;
            if comp.expect_int()? == 0 {
                return Ok(use_register);
            }
        }

        if call && !absolute {
            return Err(RemError::ReservedBranchMode(instr.c0));
        }

        let displacement: i64 = if use_register {
            let target = self.read_register(instr.r0)?;

            if call {
                if let Value::External(callable) = &*target {
                    let callable = Rc::clone(callable);
                    debug!("invoking host callable");
                    callable.invoke(self)?;
                    return Ok(use_register);
                }
            }

            match &*target {
                Value::Int(n) => *n as i64,
                Value::Pointer(_, off) if absolute => *off as i64,
                other => {
                    return Err(RemError::TypeMismatch {
                        expected: if absolute { "int or ptr" } else { "int" },
                        found: other.type_name(),
                    })
                }
            }
        } else {
            instr.imm_signed() as i64
        };

        if call {
            self.call_stack_push()?;
        }

        let pc = self.pc_offset()?;
        let target = if absolute {
            displacement as u32
        } else {
            (pc as i64 + displacement) as u32
        };

        debug!("redirecting control flow to {:#x}", target);
        self.write_register(REG_PC, Rc::new(Value::Pointer(RegionId::Main, target)))?;
        self.branching = true;

        Ok(use_register)
    }

    fn exec_cmp(&mut self, instr: &Instruction) -> RemResult<bool> {
        let register_form = instr.c1 & 0b001 != 0;
        let method = CmpMethod::decode(instr.c0, register_form)?;

        let lhs = self.read_register(instr.r0)?;
        let lhs_scalar = lhs.scalar().ok_or(RemError::TypeMismatch {
            expected: "int, float, or ptr",
            found: lhs.type_name(),
        })?;

        let result: i32 = if register_form {
            let rhs = self.read_register(instr.r2)?;
            let rhs_scalar = rhs.scalar().ok_or(RemError::TypeMismatch {
                expected: "int, float, or ptr",
                found: rhs.type_name(),
            })?;

            match (&*lhs, &*rhs) {
                (Value::Pointer(ra, _), Value::Pointer(rb, _)) => {
                    if ra != rb {
                        return Err(RemError::CrossRegionPointerOperation);
                    }
                }
                (Value::Pointer(..), other) | (other, Value::Pointer(..)) => {
                    return Err(RemError::TypeMismatch {
                        expected: "a second ptr operand",
                        found: other.type_name(),
                    });
                }
                _ => {}
            }

            if method == CmpMethod::Same {
                Rc::ptr_eq(&lhs, &rhs) as i32
            } else {
                compare_scalars(method, lhs_scalar, rhs_scalar)
            }
        } else {
            if matches!(&*lhs, Value::Pointer(..)) {
                return Err(RemError::TypeMismatch {
                    expected: "int or float",
                    found: "ptr",
                });
            }
            compare_scalars(method, lhs_scalar, instr.imm_signed() as f64)
        };

        // In the register form the S bit redirects the result register.
        let dest = if register_form && instr.s {
            instr.r1
        } else {
            REG_COMP
        };
        self.write_register(dest, Rc::new(Value::Int(result)))?;

        Ok(method == CmpMethod::Not)
    }

    fn exec_cvt(&mut self, instr: &Instruction) -> RemResult<bool> {
        let register_form = instr.c1 & 0b001 != 0;

        // Target kind 0 is null in every form.
        if instr.c0 == 0b000 {
            self.write_register(instr.r0, Rc::new(Value::Null))?;
            return Ok(!register_form);
        }

        if register_form {
            let mut source = self.read_register(instr.r2)?;

            // With S set this is a reinterpretation: view the source's raw
            // bits as the kind named by the r1 field, then convert.
            if instr.s {
                let as_kind =
                    ValueKind::from_bits(instr.r1).ok_or(RemError::UnsupportedReinterpretation {
                        from: source.type_name(),
                        to: ValueKind::bits_name(instr.r1),
                    })?;
                source = Rc::new(source.reinterpret(as_kind)?);
            }

            if instr.c0 == 0b111 {
                // deref: load the cell the source pointer addresses
                let (region, off) = source.expect_pointer()?;
                let cell = self.load_cell(region, off)?;
                self.write_register(instr.r0, cell)?;
            } else {
                let target =
                    ValueKind::from_bits(instr.c0).ok_or(RemError::UnsupportedConversion {
                        from: source.type_name(),
                        to: ValueKind::bits_name(instr.c0),
                    })?;
                let converted = source.convert(target)?;
                self.write_register(instr.r0, Rc::new(converted))?;
            }
            Ok(false)
        } else {
            let value = match instr.c0 {
                0b001 => Value::Int(instr.imm_signed()),
                0b010 => Value::Float(instr.imm_signed() as f32),
                0b011 => Value::Pointer(RegionId::Main, instr.imm_signed() as u32),
                code => {
                    return Err(RemError::UnsupportedConversion {
                        from: "immediate",
                        to: ValueKind::bits_name(code),
                    })
                }
            };
            self.write_register(instr.r0, Rc::new(value))?;
            Ok(false)
        }
    }

    // --- register access -------------------------------------------------

    /// Read a register, applying its role: indices 28 and 31 pop from the
    /// IRS and the operand stack respectively.
    pub fn read_register(&mut self, index: u8) -> RemResult<Rc<Value>> {
        if index >= NUM_REGISTERS {
            return Err(RemError::InvalidRegisterIndex(index));
        }

        match role_of(index) {
            Role::IrsPop => {
                let word = self.irs_pop()?;
                Ok(Rc::new(Value::Int(word)))
            }
            Role::StackPop => self.stack_pop(),
            _ => self.registers.get(index),
        }
    }

    /// Write a register, applying its role: discard, type-checked store,
    /// stack push, or a fatal write to a read-only register.
    pub fn write_register(&mut self, index: u8, value: Rc<Value>) -> RemResult<()> {
        if index >= NUM_REGISTERS {
            return Err(RemError::InvalidRegisterIndex(index));
        }

        match role_of(index) {
            Role::ZeroConstant => Ok(()),
            Role::ProgramCounter => {
                expect_region_pointer(&value, RegionId::Main)?;
                self.registers.set(index, value)
            }
            Role::IrsPointer => {
                expect_region_pointer(&value, RegionId::Irs)?;
                self.registers.set(index, value)
            }
            Role::StackPointer => {
                expect_region_pointer(&value, RegionId::Stack)?;
                self.registers.set(index, value)
            }
            Role::StackPush => {
                self.stack_push(Rc::clone(&value))?;
                self.registers.set(index, value)
            }
            Role::IrsPop | Role::StackPop => Err(RemError::ReadOnlyRegisterWrite(index)),
            Role::Ordinary => self.registers.set(index, value),
        }
    }

    /// Raw register read without role side effects, for inspection
    pub fn peek_register(&self, index: u8) -> RemResult<Rc<Value>> {
        self.registers.get(index)
    }

    // --- stack and IRS traffic -------------------------------------------

    /// Push onto the operand stack through the stack pointer register
    pub fn stack_push(&mut self, value: Rc<Value>) -> RemResult<()> {
        let (_, sp) = self.registers.get(REG_SP)?.expect_pointer()?;
        self.stack.write(sp, value)?;
        self.write_register(REG_SP, Rc::new(Value::Pointer(RegionId::Stack, sp.wrapping_add(1))))
    }

    /// Pop from the operand stack; underflow wraps the stack pointer and
    /// fails the bounds check.
    pub fn stack_pop(&mut self) -> RemResult<Rc<Value>> {
        let (_, sp) = self.registers.get(REG_SP)?.expect_pointer()?;
        let top = sp.wrapping_sub(1);
        self.write_register(REG_SP, Rc::new(Value::Pointer(RegionId::Stack, top)))?;
        self.stack.read(top)
    }

    /// Push a word onto the immediate re-use stack
    pub fn irs_push(&mut self, word: i32) -> RemResult<()> {
        let (_, top) = self.registers.get(REG_IRSP)?.expect_pointer()?;
        self.irs.write(top, word as u32)?;
        self.write_register(REG_IRSP, Rc::new(Value::Pointer(RegionId::Irs, top.wrapping_add(1))))
    }

    /// Pop a word from the immediate re-use stack
    pub fn irs_pop(&mut self) -> RemResult<i32> {
        let (_, top) = self.registers.get(REG_IRSP)?.expect_pointer()?;
        let top = top.wrapping_sub(1);
        self.write_register(REG_IRSP, Rc::new(Value::Pointer(RegionId::Irs, top)))?;
        Ok(self.irs.read(top)? as i32)
    }

    fn call_stack_push(&mut self) -> RemResult<()> {
        let pc = self.pc_offset()?;
        self.call_stack.write(self.csp, pc.wrapping_add(1))?;
        self.csp = self.csp.wrapping_add(1);
        Ok(())
    }

    fn call_stack_pop(&mut self) -> RemResult<()> {
        self.csp = self.csp.wrapping_sub(1);
        let addr = self.call_stack.read(self.csp)?;
        self.write_register(REG_PC, Rc::new(Value::Pointer(RegionId::Main, addr)))
    }

    // --- memory and string access ----------------------------------------

    /// Decode a NUL-terminated string through a raw-word-region pointer:
    /// consecutive words are read as 4 big-endian bytes each, stopping at
    /// the first zero byte or at `max_bytes`.
    pub fn read_string(&self, pointer: &Value, max_bytes: usize) -> RemResult<String> {
        let (region, base) = pointer.expect_pointer()?;
        let words = self.word_region(region)?;

        let mut bytes = Vec::new();
        'words: for i in 0u32.. {
            if bytes.len() >= max_bytes {
                break;
            }
            let word = words.read(base.wrapping_add(i))?;
            for byte in word.to_be_bytes() {
                if byte == 0 || bytes.len() >= max_bytes {
                    break 'words;
                }
                bytes.push(byte);
            }
        }

        String::from_utf8(bytes).map_err(|_| RemError::NonUtf8StringData)
    }

    fn read_env_key(&mut self, index: u8) -> RemResult<String> {
        let pointer = self.read_register(index)?;
        self.read_string(&pointer, self.config.max_env_key_bytes)
    }

    /// Load the cell a pointer addresses: raw-word regions yield ints,
    /// the operand stack yields the stored value itself.
    fn load_cell(&self, region: RegionId, addr: u32) -> RemResult<Rc<Value>> {
        match region {
            RegionId::Stack => self.stack.read(addr),
            RegionId::Main => Ok(Rc::new(Value::Int(self.main.read(addr)? as i32))),
            RegionId::Irs => Ok(Rc::new(Value::Int(self.irs.read(addr)? as i32))),
            RegionId::CallStack => Ok(Rc::new(Value::Int(self.call_stack.read(addr)? as i32))),
        }
    }

    fn word_region(&self, id: RegionId) -> RemResult<&WordRegion> {
        match id {
            RegionId::Main => Ok(&self.main),
            RegionId::Irs => Ok(&self.irs),
            RegionId::CallStack => Ok(&self.call_stack),
            RegionId::Stack => Err(RemError::TypeMismatch {
                expected: "raw-word region pointer",
                found: "stack pointer",
            }),
        }
    }

    fn pc_offset(&self) -> RemResult<u32> {
        match &*self.registers.get(REG_PC)? {
            Value::Pointer(RegionId::Main, off) => Ok(*off),
            other => Err(RemError::TypeMismatch {
                expected: "ptr into main memory",
                found: other.type_name(),
            }),
        }
    }

    // --- embedder accessors ----------------------------------------------

    pub fn config(&self) -> &RemConfig {
        &self.config
    }

    pub fn main_memory(&self) -> &WordRegion {
        &self.main
    }

    pub fn main_memory_mut(&mut self) -> &mut WordRegion {
        &mut self.main
    }

    pub fn operand_stack(&self) -> &ValueRegion {
        &self.stack
    }

    pub fn irs(&self) -> &WordRegion {
        &self.irs
    }

    pub fn host(&self) -> &dyn HostBridge {
        &*self.host
    }

    pub fn host_mut(&mut self) -> &mut dyn HostBridge {
        &mut *self.host
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }
}

/// Scalar comparison core shared by both operand forms. `Same` is handled
/// by the caller before scalars are involved.
fn compare_scalars(method: CmpMethod, a: f64, b: f64) -> i32 {
    use std::cmp::Ordering;

    match method {
        CmpMethod::Ordered => match a.partial_cmp(&b) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Greater) => 1,
            _ => 0,
        },
        CmpMethod::Eq => (a == b) as i32,
        CmpMethod::Lt => (a < b) as i32,
        CmpMethod::Gt => (a > b) as i32,
        CmpMethod::Not => (a == 0.0) as i32,
        CmpMethod::Same => 0,
        CmpMethod::Neq => (a != b) as i32,
        CmpMethod::Gte => (a >= b) as i32,
        CmpMethod::Lte => (a <= b) as i32,
    }
}

fn expect_region_pointer(value: &Value, region: RegionId) -> RemResult<()> {
    match value {
        Value::Pointer(r, _) if *r == region => Ok(()),
        other => Err(RemError::TypeMismatch {
            expected: match region {
                RegionId::Main => "ptr into main memory",
                RegionId::Stack => "ptr into the stack",
                RegionId::Irs => "ptr into the IRS",
                RegionId::CallStack => "ptr into the call stack",
            },
            found: other.type_name(),
        }),
    }
}
