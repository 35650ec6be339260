//! The instruction set shared by the code generator and the virtual machine.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    AddI,
    SubI,
    MulI,
    DivI,
    ModI,
    NegI,

    AddF,
    SubF,
    MulF,
    DivF,
    NegF,
    /// Converts the top `n` cells from int to float.
    IToF,

    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    And,
    Or,
    Not,

    Concat,

    /// Pushes the operand.
    Const,

    Enter,
    Call,
    Return,
    Halt,
    Jump,
    JumpF,

    /// Absolute (global) addressing.
    LoadG,
    StoreG,
    AddrG,

    /// Base-relative (local and parameter) addressing.
    LoadL,
    StoreL,
    AddrL,

    /// Indirect access through an address on the stack.
    LoadI,
    StoreI,

    /// Whole-vector copies.
    LoadB,
    StoreB,

    /// Bounds check of the index on top of the stack.
    Check,
    /// Pops an offset and an address, pushes the offset address.
    AddA,

    Read,
    Adjust,
    Syscall,
}

impl Opcode {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Opcode::AddI => "ADDI",
            Opcode::SubI => "SUBI",
            Opcode::MulI => "MULI",
            Opcode::DivI => "DIVI",
            Opcode::ModI => "MODI",
            Opcode::NegI => "NEGI",
            Opcode::AddF => "ADDF",
            Opcode::SubF => "SUBF",
            Opcode::MulF => "MULF",
            Opcode::DivF => "DIVF",
            Opcode::NegF => "NEGF",
            Opcode::IToF => "ITOF",
            Opcode::Eq => "EQ",
            Opcode::Ne => "NE",
            Opcode::Lt => "LT",
            Opcode::Le => "LE",
            Opcode::Gt => "GT",
            Opcode::Ge => "GE",
            Opcode::And => "AND",
            Opcode::Or => "OR",
            Opcode::Not => "NOT",
            Opcode::Concat => "CONCAT",
            Opcode::Const => "CONST",
            Opcode::Enter => "ENTER",
            Opcode::Call => "CALL",
            Opcode::Return => "RETURN",
            Opcode::Halt => "HALT",
            Opcode::Jump => "JUMP",
            Opcode::JumpF => "JUMPF",
            Opcode::LoadG => "LOADG",
            Opcode::StoreG => "STOREG",
            Opcode::AddrG => "ADDRG",
            Opcode::LoadL => "LOADL",
            Opcode::StoreL => "STOREL",
            Opcode::AddrL => "ADDRL",
            Opcode::LoadI => "LOADI",
            Opcode::StoreI => "STOREI",
            Opcode::LoadB => "LOADB",
            Opcode::StoreB => "STOREB",
            Opcode::Check => "CHECK",
            Opcode::AddA => "ADDA",
            Opcode::Read => "READ",
            Opcode::Adjust => "ADJUST",
            Opcode::Syscall => "SYSCALL",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// An immediate instruction argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    Char(char),
}

impl Operand {
    pub fn tag(&self) -> char {
        match self {
            Operand::Int(_) => '#',
            Operand::Float(_) => '%',
            Operand::Bool(_) => ':',
            Operand::String(_) => '"',
            Operand::Char(_) => '\'',
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())?;

        match self {
            Operand::Int(n) => write!(f, "{n}"),
            Operand::Float(x) => write!(f, "{x}"),
            Operand::Bool(b) => write!(f, "{b}"),
            Operand::String(s) => {
                for ch in s.chars() {
                    match ch {
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\\' => f.write_str("\\\\")?,
                        ch => write!(f, "{ch}")?,
                    }
                }
                Ok(())
            }
            Operand::Char(ch) => write!(f, "{ch}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operand: Option<Operand>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    pub fn with_operand(opcode: Opcode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {operand}", self.opcode),
            None => write!(f, "{}", self.opcode),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("program exceeds its capacity of {capacity} instructions")]
pub struct ProgramFull {
    pub capacity: usize,
}

/// Accumulates instructions during code generation.
///
/// `next_address` is the compile-time "next free slot"; the VM keeps its own
/// program counter and only ever sees a frozen [`Program`].
#[derive(Debug, Clone)]
pub struct ProgramBuilder {
    instructions: Vec<Instruction>,
    capacity: usize,
    next_address: usize,
}

impl ProgramBuilder {
    pub fn new(capacity: usize) -> Self {
        Self {
            instructions: Vec::with_capacity(capacity.min(4096)),
            capacity,
            next_address: 0,
        }
    }

    pub fn next_address(&self) -> usize {
        self.next_address
    }

    pub fn emit(&mut self, instruction: Instruction) -> Result<usize, ProgramFull> {
        if self.next_address >= self.capacity {
            return Err(ProgramFull {
                capacity: self.capacity,
            });
        }

        let address = self.next_address;
        self.instructions.push(instruction);
        self.next_address += 1;

        Ok(address)
    }

    /// Replaces the operand of an already emitted instruction.
    ///
    /// # Panics
    /// Panics if nothing was emitted at `address`.
    pub fn patch(&mut self, address: usize, operand: Operand) {
        let instruction = self
            .instructions
            .get_mut(address)
            .expect("patched address was never emitted");
        instruction.operand = Some(operand);
    }

    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    pub fn freeze(self, start: usize) -> Program {
        Program {
            instructions: self.instructions.into_boxed_slice(),
            start,
        }
    }
}

/// A finished, immutable program.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    instructions: Box<[Instruction]>,
    start: usize,
}

impl Program {
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn get(&self, address: usize) -> Option<&Instruction> {
        self.instructions.get(address)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// The diagnostic listing: a `SIZE`/`START` header then one instruction per line.
    pub fn listing(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SIZE {}", self.len())?;
        writeln!(f, "START {}", self.start)?;

        for instruction in self.instructions.iter() {
            writeln!(f, "{instruction}")?;
        }

        Ok(())
    }
}
