//! AST for MIPS (SPIM) assembly
//!
//! ASDL:
//!   program = Program(line* lines)
//!   line = Instruction(opcode, operand* operands, string? comment)
//!        | Label(label, string? comment)
//!        | Directive(directive)
//!        | Data(label, directive)
//!   operand = Reg(reg) | Imm(int) | Indexed(int offset, reg base) | Label(label)
//!   directive = Data | Text | Align(int) | Globl(label) | Word(int) | Asciiz(string)
//!
//! Register Usage:
//!
//!   V0: accumulator, return value, syscall service code
//!   A0: syscall argument
//!   T0: saved frame pointer during the epilogue
//!   T1: left operand of binary operators, case constants
//!   T2: loop counter of `**`
//!   SP, FP, RA: stack pointer, frame pointer, return address
//!

use crate::id_gen::Label;
use derive_more::Display;
use std::fmt::{Display as FmtDisplay, Formatter};

/// Register every generated expression leaves its value in.
pub const ACC: Reg = Reg::V0;

pub const TRUE: i32 = -1;
pub const FALSE: i32 = 0;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum Reg {
    #[display("$v0")]
    V0,
    #[display("$a0")]
    A0,
    #[display("$t0")]
    T0,
    #[display("$t1")]
    T1,
    #[display("$t2")]
    T2,
    #[display("$sp")]
    SP,
    #[display("$fp")]
    FP,
    #[display("$ra")]
    RA,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
    /// `offset(base)`
    Indexed { offset: i32, base: Reg },
    Label(Label),
}

impl From<Reg> for Operand {
    fn from(reg: Reg) -> Self {
        Operand::Reg(reg)
    }
}

impl From<i32> for Operand {
    fn from(imm: i32) -> Self {
        Operand::Imm(imm)
    }
}

impl From<Label> for Operand {
    fn from(label: Label) -> Self {
        Operand::Label(label)
    }
}

impl From<&Label> for Operand {
    fn from(label: &Label) -> Self {
        Operand::Label(label.clone())
    }
}

impl FmtDisplay for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{reg}"),
            Operand::Imm(i) => write!(f, "{i}"),
            Operand::Indexed { offset, base } => write!(f, "{offset}({base})"),
            Operand::Label(label) => write!(f, "{label}"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum Opcode {
    #[display("lw")]
    Lw,
    #[display("sw")]
    Sw,
    #[display("li")]
    Li,
    #[display("la")]
    La,
    #[display("move")]
    Move,
    #[display("add")]
    Add,
    #[display("addu")]
    Addu,
    #[display("sub")]
    Sub,
    #[display("subu")]
    Subu,
    #[display("mul")]
    Mul,
    #[display("div")]
    Div,
    #[display("mflo")]
    Mflo,
    #[display("neg")]
    Neg,
    #[display("not")]
    Not,
    #[display("beq")]
    Beq,
    #[display("bne")]
    Bne,
    #[display("blt")]
    Blt,
    #[display("bgt")]
    Bgt,
    #[display("ble")]
    Ble,
    #[display("bge")]
    Bge,
    #[display("bgez")]
    Bgez,
    #[display("blez")]
    Blez,
    #[display("j")]
    J,
    #[display("jal")]
    Jal,
    #[display("jr")]
    Jr,
    #[display("syscall")]
    Syscall,
}

impl Opcode {
    pub fn is_branch(self) -> bool {
        matches!(
            self,
            Opcode::Beq
                | Opcode::Bne
                | Opcode::Blt
                | Opcode::Bgt
                | Opcode::Ble
                | Opcode::Bge
                | Opcode::Bgez
                | Opcode::Blez
        )
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Directive {
    Data,
    Text,
    Align(u32),
    Globl(Label),
    Word(i32),
    Asciiz(String),
}

impl FmtDisplay for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Directive::Data => write!(f, ".data"),
            Directive::Text => write!(f, ".text"),
            Directive::Align(n) => write!(f, ".align {n}"),
            Directive::Globl(label) => write!(f, ".globl {label}"),
            Directive::Word(value) => write!(f, ".word {value}"),
            Directive::Asciiz(text) => write!(f, ".asciiz \"{text}\""),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Line {
    Instruction {
        opcode: Opcode,
        operands: Vec<Operand>,
        comment: Option<String>,
    },
    Label {
        label: Label,
        comment: Option<String>,
    },
    Directive(Directive),
    /// A labelled data-section entry.
    Data { label: Label, directive: Directive },
}

impl Line {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Line::Instruction { opcode, .. } => Some(*opcode),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Program {
    pub lines: Vec<Line>,
}

impl Program {
    pub fn instructions(&self) -> impl Iterator<Item = (Opcode, &[Operand])> {
        self.lines.iter().filter_map(|line| match line {
            Line::Instruction {
                opcode, operands, ..
            } => Some((*opcode, operands.as_slice())),
            _ => None,
        })
    }
}
