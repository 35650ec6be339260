use std::cmp::Ordering;
use std::io::{BufRead, Write};

use quill_ir::builtins::{self, codes, BuiltinKind};
use quill_ir::bytecode::{Instruction, Opcode, Operand, Program};

use crate::{ErrorCode, Host, StubHost, Value, VmError, VmResult};

pub const DEFAULT_STACK_SIZE: usize = 65_536;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmOptions {
    /// Maximum number of cells on the stack.
    pub stack_size: usize,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

enum Flow {
    Continue,
    Halt,
}

/// Executes a frozen [`Program`].
///
/// The stack and frame base survive between calls to [`Vm::run`], so a
/// program's global initialisation can run once and its handlers any number
/// of times afterwards.
pub struct Vm<'p, R, W, E, H = StubHost> {
    program: &'p Program,
    options: VmOptions,

    stack: Vec<Value>,
    base: usize,
    pc: usize,
    fault: Option<VmError>,

    input: R,
    output: W,
    error: E,
    host: H,
}

impl<'p, R, W, E> Vm<'p, R, W, E> {
    pub fn new(program: &'p Program, options: VmOptions, input: R, output: W, error: E) -> Self {
        Self {
            program,
            options,

            stack: vec![],
            base: 0,
            pc: 0,
            fault: None,

            input,
            output,
            error,
            host: StubHost::default(),
        }
    }
}

impl<'p, R, W, E, H> Vm<'p, R, W, E, H> {
    pub fn with_host<H2: Host>(self, host: H2) -> Vm<'p, R, W, E, H2> {
        Vm {
            program: self.program,
            options: self.options,

            stack: self.stack,
            base: self.base,
            pc: self.pc,
            fault: self.fault,

            input: self.input,
            output: self.output,
            error: self.error,
            host,
        }
    }

    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// The fault that stopped the last run, if any.
    pub fn fault(&self) -> Option<&VmError> {
        self.fault.as_ref()
    }

    pub fn reset(&mut self) {
        self.stack.clear();
        self.base = 0;
        self.fault = None;
    }
}

impl<R: BufRead, W: Write, E: Write, H: Host> Vm<'_, R, W, E, H> {
    /// Runs from `entry` until `HALT` or a fault.
    ///
    /// With `debug` set, every executed instruction is traced to the error stream.
    pub fn run(&mut self, entry: usize, debug: bool) -> ErrorCode {
        self.pc = entry;
        self.fault = None;

        loop {
            let pc = self.pc;

            match self.step(debug) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Halt) => {
                    let _ = self.output.flush();
                    return ErrorCode::None;
                }
                Err(err) => {
                    let code = err.code();
                    if debug {
                        let _ = writeln!(self.error, "fault {}: {err} at {pc}", code.as_u8());
                    }
                    let _ = self.output.flush();

                    self.fault = Some(err);
                    return code;
                }
            }
        }
    }

    fn step(&mut self, debug: bool) -> VmResult<Flow> {
        let program = self.program;
        let instruction = program
            .get(self.pc)
            .ok_or(VmError::ProgramCounter(self.pc))?;

        if debug {
            writeln!(
                self.error,
                "{:>5}  {:<24} depth={} base={}",
                self.pc,
                instruction.to_string(),
                self.stack.len(),
                self.base
            )?;
        }

        self.pc += 1;
        self.execute(instruction)
    }

    fn execute(&mut self, instruction: &Instruction) -> VmResult<Flow> {
        let opcode = instruction.opcode;

        match opcode {
            Opcode::AddI => self.int_op(i64::checked_add)?,
            Opcode::SubI => self.int_op(i64::checked_sub)?,
            Opcode::MulI => self.int_op(i64::checked_mul)?,
            Opcode::DivI | Opcode::ModI => {
                let rhs = self.pop()?.as_int()?;
                let lhs = self.pop()?.as_int()?;
                if rhs == 0 {
                    return Err(VmError::DivisionByZero);
                }

                let result = match opcode {
                    Opcode::DivI => lhs.checked_div(rhs),
                    _ => lhs.checked_rem(rhs),
                };
                self.push(Value::Int(result.ok_or(VmError::IntegerOverflow)?))?;
            }
            Opcode::NegI => {
                let n = self.pop()?.as_int()?;
                self.push(Value::Int(n.checked_neg().ok_or(VmError::IntegerOverflow)?))?;
            }

            Opcode::AddF => self.float_op(|a, b| a + b)?,
            Opcode::SubF => self.float_op(|a, b| a - b)?,
            Opcode::MulF => self.float_op(|a, b| a * b)?,
            Opcode::DivF => self.float_op(|a, b| a / b)?,
            Opcode::NegF => {
                let x = self.pop()?.as_float()?;
                self.push(Value::Float(-x))?;
            }
            Opcode::IToF => {
                let count = count_operand(instruction)?;
                let len = self.stack.len();
                if count > len {
                    return Err(VmError::StackUnderflow);
                }

                for cell in &mut self.stack[len - count..] {
                    *cell = Value::Float(cell.as_int()? as f64);
                }
            }

            Opcode::Eq | Opcode::Ne => {
                let rhs = self.pop()?.initialized()?;
                let lhs = self.pop()?.initialized()?;

                let equal = match (&lhs, &rhs) {
                    (Value::Int(a), Value::Int(b)) => a == b,
                    (Value::Float(a), Value::Float(b)) => a == b,
                    (Value::Bool(a), Value::Bool(b)) => a == b,
                    (Value::String(a), Value::String(b)) => a == b,
                    _ => return Err(mismatch(&lhs, &rhs)),
                };
                self.push(Value::Bool(equal == (opcode == Opcode::Eq)))?;
            }
            Opcode::Lt | Opcode::Le | Opcode::Gt | Opcode::Ge => {
                let rhs = self.pop()?.initialized()?;
                let lhs = self.pop()?.initialized()?;

                let ordering = match (&lhs, &rhs) {
                    (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
                    (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
                    (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                    _ => return Err(mismatch(&lhs, &rhs)),
                };

                let result = ordering.is_some_and(|ordering| match opcode {
                    Opcode::Lt => ordering == Ordering::Less,
                    Opcode::Le => ordering != Ordering::Greater,
                    Opcode::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                });
                self.push(Value::Bool(result))?;
            }

            Opcode::And | Opcode::Or => {
                let rhs = self.pop()?.as_bool()?;
                let lhs = self.pop()?.as_bool()?;
                let result = match opcode {
                    Opcode::And => lhs && rhs,
                    _ => lhs || rhs,
                };
                self.push(Value::Bool(result))?;
            }
            Opcode::Not => {
                let b = self.pop()?.as_bool()?;
                self.push(Value::Bool(!b))?;
            }

            Opcode::Concat => {
                let rhs = self.pop()?.into_string()?;
                let mut lhs = self.pop()?.into_string()?;
                lhs.push_str(&rhs);
                self.push(Value::String(lhs))?;
            }

            Opcode::Const => {
                let value = match &instruction.operand {
                    Some(Operand::Int(n)) => Value::Int(*n),
                    Some(Operand::Float(x)) => Value::Float(*x),
                    Some(Operand::Bool(b)) => Value::Bool(*b),
                    Some(Operand::String(s)) => Value::String(s.clone()),
                    Some(Operand::Char(_)) => {
                        return Err(VmError::InvalidOperand {
                            expected: "a constant",
                            found: "char",
                        });
                    }
                    None => return Err(VmError::MissingOperand(opcode)),
                };
                self.push(value)?;
            }

            Opcode::Enter => {
                let locals = count_operand(instruction)?;
                self.push(Value::Address(self.base))?;
                self.base = self.stack.len() - 1;
                self.reserve(locals)?;
            }
            Opcode::Call => {
                let target = count_operand(instruction)?;
                self.push(Value::Address(self.pc))?;
                self.pc = target;
            }
            Opcode::Return => {
                let locals = count_operand(instruction)?;
                self.discard(locals)?;
                self.base = self.pop()?.as_address()?;
                self.pc = self.pop()?.as_address()?;
            }
            Opcode::Halt => return Ok(Flow::Halt),
            Opcode::Jump => self.pc = count_operand(instruction)?,
            Opcode::JumpF => {
                let target = count_operand(instruction)?;
                if !self.pop()?.as_bool()? {
                    self.pc = target;
                }
            }

            Opcode::LoadG => {
                let value = self.cell(int_operand(instruction)?)?.clone();
                self.push(value)?;
            }
            Opcode::StoreG => {
                let value = self.pop()?;
                *self.cell_mut(int_operand(instruction)?)? = value;
            }
            Opcode::AddrG => {
                let address = self.address(int_operand(instruction)?)?;
                self.push(Value::Address(address))?;
            }

            Opcode::LoadL => {
                let address = self.local(instruction)?;
                let value = self.cell(address)?.clone();
                self.push(value)?;
            }
            Opcode::StoreL => {
                let address = self.local(instruction)?;
                let value = self.pop()?;
                *self.cell_mut(address)? = value;
            }
            Opcode::AddrL => {
                let address = self.local(instruction)?;
                let address = self.address(address)?;
                self.push(Value::Address(address))?;
            }

            Opcode::LoadI => {
                let address = self.pop()?.as_address()?;
                let value = self.cell(address as i64)?.clone();
                self.push(value)?;
            }
            Opcode::StoreI => {
                let value = self.pop()?;
                let address = self.pop()?.as_address()?;
                *self.cell_mut(address as i64)? = value;
            }

            Opcode::LoadB => {
                let count = count_operand(instruction)?;
                let address = self.pop()?.as_address()?;
                let block = self.block(address, count)?.to_vec();
                for value in block {
                    self.push(value)?;
                }
            }
            Opcode::StoreB => {
                let count = count_operand(instruction)?;
                let values = self.pop_many(count)?;
                let address = self.pop()?.as_address()?;
                self.block_mut(address, count)?.clone_from_slice(&values);
            }

            Opcode::Check => {
                let size = int_operand(instruction)?;
                let index = self.stack.last().ok_or(VmError::StackUnderflow)?.as_int()?;
                if !(0..size).contains(&index) {
                    return Err(VmError::IndexOutOfRange { index, size });
                }
            }
            Opcode::AddA => {
                let offset = self.pop()?.as_int()?;
                let address = self.pop()?.as_address()?;
                let address = self.address(address as i64 + offset)?;
                self.push(Value::Address(address))?;
            }

            Opcode::Read => {
                let kind = match instruction.operand {
                    Some(Operand::Char(kind)) => kind,
                    _ => return Err(VmError::MissingOperand(opcode)),
                };
                let value = self.read(kind)?;
                self.push(value)?;
            }
            Opcode::Adjust => {
                let n = int_operand(instruction)?;
                match usize::try_from(n) {
                    Ok(n) => self.reserve(n)?,
                    Err(_) => self.discard(n.unsigned_abs() as usize)?,
                }
            }
            Opcode::Syscall => {
                let code = int_operand(instruction)?;
                self.syscall(code)?;
            }
        }

        Ok(Flow::Continue)
    }

    fn syscall(&mut self, code: i64) -> VmResult<()> {
        let builtin = u16::try_from(code)
            .ok()
            .and_then(builtins::by_code)
            .ok_or(VmError::UnknownBuiltin(code))?;

        let args = self.pop_many(builtin.arg_cells())?;

        if let BuiltinKind::Read(kind) = builtin.kind {
            let value = self.read(kind)?;
            return self.push(value);
        }

        let result = match builtin.code {
            codes::PRINT | codes::PRINTLN => {
                let value = args[0].clone().initialized()?;
                write!(self.output, "{value}")?;
                if builtin.code == codes::PRINTLN {
                    writeln!(self.output)?;
                }
                None
            }

            codes::SUBSTRING => {
                let chars: Vec<char> = args[0].as_str()?.chars().collect();
                let start = args[1].as_int()?;
                let length = args[2].as_int()?;

                let size = chars.len() as i64;
                if !(0..=size).contains(&start) {
                    return Err(VmError::IndexOutOfRange { index: start, size });
                }
                if length < 0 || length > size - start {
                    return Err(VmError::IndexOutOfRange {
                        index: start.saturating_add(length),
                        size,
                    });
                }

                let range = start as usize..(start + length) as usize;
                Some(Value::String(chars[range].iter().collect()))
            }
            codes::STRLEN => Some(Value::Int(args[0].as_str()?.chars().count() as i64)),
            codes::CHAR_VAL => Some(Value::Int(char_at(args[0].as_str()?, 0)?)),
            codes::CHAR_VAL_AT => Some(Value::Int(char_at(args[0].as_str()?, args[1].as_int()?)?)),
            codes::BUILD_STRING_FROM_CHARS => {
                let address = args[0].as_address()?;
                let count = args[1].as_int()?;
                let count = usize::try_from(count)
                    .map_err(|_| VmError::IndexOutOfRange { index: count, size: 0 })?;

                let mut s = String::with_capacity(count);
                for cell in self.block(address, count)? {
                    let code = cell.as_int()?;
                    let ch = u32::try_from(code)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or(VmError::InvalidOperand {
                            expected: "a character code",
                            found: "int",
                        })?;
                    s.push(ch);
                }
                Some(Value::String(s))
            }

            codes::NOW => Some(Value::Int(self.host.now())),
            codes::GET_IMEI => Some(Value::String(self.host.imei())),
            codes::SEND_EMAIL => Some(Value::Bool(self.host.send_email(
                args[0].as_str()?,
                args[1].as_str()?,
                args[2].as_str()?,
            ))),
            codes::SEND_SMS => Some(Value::Bool(
                self.host.send_sms(args[0].as_str()?, args[1].as_str()?),
            )),
            codes::SHOW_DIALOG => {
                self.host.show_dialog(args[0].as_str()?, args[1].as_str()?);
                None
            }
            codes::SHOW_TOAST => {
                self.host.show_toast(args[0].as_str()?);
                None
            }
            codes::GET_USER_ID => Some(Value::String(self.host.user_id())),
            codes::GET_VAR_VALUE => Some(Value::String(self.host.var_value(args[0].as_str()?))),
            codes::SET_VAR_VALUE => {
                self.host.set_var_value(args[0].as_str()?, args[1].as_str()?);
                None
            }
            codes::GO_TO_ROUTE => {
                self.host.go_to_route(args[0].as_str()?);
                None
            }
            codes::GET_TRANSITION => Some(Value::String(self.host.transition())),
            codes::GET_HEADER => Some(Value::String(self.host.header(args[0].as_str()?))),

            codes::TO_STRING => Some(Value::String(args[0].clone().initialized()?.to_string())),
            codes::FLOAT_TO_INT => {
                let x = args[0].as_float()?.trunc();
                if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
                    return Err(VmError::IntegerOverflow);
                }
                Some(Value::Int(x as i64))
            }

            other => return Err(VmError::UnknownBuiltin(i64::from(other))),
        };

        if let Some(value) = result {
            self.push(value)?;
        }
        Ok(())
    }

    /// Reads one line of input as a value of the given kind.
    fn read(&mut self, kind: char) -> VmResult<Value> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line)?;
        let text = line.trim_end_matches(['\n', '\r']);

        let (name, value) = match kind {
            'i' => ("int", text.trim().parse().ok().map(Value::Int)),
            'f' => ("float", text.trim().parse().ok().map(Value::Float)),
            'b' => (
                "bool",
                match text.trim() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    _ => None,
                },
            ),
            's' => ("string", (read > 0).then(|| Value::String(text.to_owned()))),
            _ => {
                return Err(VmError::InvalidOperand {
                    expected: "a read kind",
                    found: "char",
                })
            }
        };

        value.ok_or_else(|| VmError::BadInput {
            kind: name,
            text: text.to_owned(),
        })
    }

    fn int_op(&mut self, op: fn(i64, i64) -> Option<i64>) -> VmResult<()> {
        let rhs = self.pop()?.as_int()?;
        let lhs = self.pop()?.as_int()?;
        let result = op(lhs, rhs).ok_or(VmError::IntegerOverflow)?;
        self.push(Value::Int(result))
    }

    fn float_op(&mut self, op: fn(f64, f64) -> f64) -> VmResult<()> {
        let rhs = self.pop()?.as_float()?;
        let lhs = self.pop()?.as_float()?;
        self.push(Value::Float(op(lhs, rhs)))
    }
}

impl<R, W, E, H> Vm<'_, R, W, E, H> {
    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= self.options.stack_size {
            return Err(VmError::StackOverflow);
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pops `count` cells, returned in the order they were pushed.
    fn pop_many(&mut self, count: usize) -> VmResult<Vec<Value>> {
        let len = self.stack.len();
        if count > len {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.stack.split_off(len - count))
    }

    fn reserve(&mut self, count: usize) -> VmResult<()> {
        let len = self.stack.len();
        if count > self.options.stack_size.saturating_sub(len) {
            return Err(VmError::StackOverflow);
        }
        self.stack.resize(len + count, Value::Null);
        Ok(())
    }

    fn discard(&mut self, count: usize) -> VmResult<()> {
        let len = self.stack.len();
        if count > len {
            return Err(VmError::StackUnderflow);
        }
        self.stack.truncate(len - count);
        Ok(())
    }

    fn local(&self, instruction: &Instruction) -> VmResult<i64> {
        Ok(self.base as i64 + int_operand(instruction)?)
    }

    fn address(&self, address: i64) -> VmResult<usize> {
        usize::try_from(address).map_err(|_| VmError::InvalidAddress(address))
    }

    fn cell(&self, address: i64) -> VmResult<&Value> {
        usize::try_from(address)
            .ok()
            .and_then(|address| self.stack.get(address))
            .ok_or(VmError::InvalidAddress(address))
    }

    fn cell_mut(&mut self, address: i64) -> VmResult<&mut Value> {
        usize::try_from(address)
            .ok()
            .and_then(|address| self.stack.get_mut(address))
            .ok_or(VmError::InvalidAddress(address))
    }

    fn block(&self, address: usize, count: usize) -> VmResult<&[Value]> {
        address
            .checked_add(count)
            .and_then(|end| self.stack.get(address..end))
            .ok_or(VmError::InvalidAddress(address as i64))
    }

    fn block_mut(&mut self, address: usize, count: usize) -> VmResult<&mut [Value]> {
        address
            .checked_add(count)
            .and_then(|end| self.stack.get_mut(address..end))
            .ok_or(VmError::InvalidAddress(address as i64))
    }
}

fn int_operand(instruction: &Instruction) -> VmResult<i64> {
    match &instruction.operand {
        Some(Operand::Int(n)) => Ok(*n),
        _ => Err(VmError::MissingOperand(instruction.opcode)),
    }
}

fn count_operand(instruction: &Instruction) -> VmResult<usize> {
    let n = int_operand(instruction)?;
    usize::try_from(n).map_err(|_| VmError::InvalidOperand {
        expected: "a non-negative count",
        found: "negative int",
    })
}

fn mismatch(lhs: &Value, rhs: &Value) -> VmError {
    VmError::InvalidOperand {
        expected: lhs.type_name(),
        found: rhs.type_name(),
    }
}

fn char_at(s: &str, index: i64) -> VmResult<i64> {
    usize::try_from(index)
        .ok()
        .and_then(|i| s.chars().nth(i))
        .map(|ch| i64::from(u32::from(ch)))
        .ok_or_else(|| VmError::IndexOutOfRange {
            index,
            size: s.chars().count() as i64,
        })
}
