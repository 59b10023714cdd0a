use crate::asm::{self, Directive, Line, Opcode, Operand, Reg};
use crate::context::CompileOptions;
use crate::id_gen::{IdGenerator, Label};
use std::io::Write;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct EmitterError {
    pub message: String,
    #[source]
    pub source: std::io::Error,
}

/// Width the opcode column is padded to.
const MAXLEN: usize = 4;

/// Accumulates assembly lines for one compilation and hands out fresh labels.
#[derive(Debug, Default)]
pub struct Emitter {
    lines: Vec<Line>,
    labels: IdGenerator,
}

impl Emitter {
    pub fn new() -> Self {
        Emitter::default()
    }

    pub fn next_label(&mut self) -> Label {
        self.labels.next_label()
    }

    /// Takes the lines generated so far, leaving the label counter untouched.
    pub fn finish(&mut self) -> asm::Program {
        asm::Program {
            lines: std::mem::take(&mut self.lines),
        }
    }

    pub fn generate(&mut self, opcode: Opcode, operands: impl IntoIterator<Item = Operand>) {
        self.lines.push(Line::Instruction {
            opcode,
            operands: operands.into_iter().collect(),
            comment: None,
        });
    }

    pub fn generate_with_comment(
        &mut self,
        opcode: Opcode,
        comment: &str,
        operands: impl IntoIterator<Item = Operand>,
    ) {
        self.lines.push(Line::Instruction {
            opcode,
            operands: operands.into_iter().collect(),
            comment: Some(comment.to_string()),
        });
    }

    /// `opcode reg, offset(base)  # comment`
    pub fn generate_indexed(
        &mut self,
        opcode: Opcode,
        reg: Reg,
        base: Reg,
        offset: i32,
        comment: Option<&str>,
    ) {
        self.lines.push(Line::Instruction {
            opcode,
            operands: vec![Operand::Reg(reg), Operand::Indexed { offset, base }],
            comment: comment.map(str::to_string),
        });
    }

    pub fn gen_label(&mut self, label: &Label, comment: Option<&str>) {
        self.lines.push(Line::Label {
            label: label.clone(),
            comment: comment.map(str::to_string),
        });
    }

    pub fn directive(&mut self, directive: Directive) {
        self.lines.push(Line::Directive(directive));
    }

    pub fn data(&mut self, label: &Label, directive: Directive) {
        self.lines.push(Line::Data {
            label: label.clone(),
            directive,
        });
    }

    pub fn gen_push(&mut self, reg: Reg) {
        self.generate_indexed(Opcode::Sw, reg, Reg::SP, 0, Some("PUSH"));
        self.generate(Opcode::Subu, [Reg::SP.into(), Reg::SP.into(), 4.into()]);
    }

    pub fn gen_pop(&mut self, reg: Reg) {
        self.generate_indexed(Opcode::Lw, reg, Reg::SP, 4, Some("POP"));
        self.generate(Opcode::Addu, [Reg::SP.into(), Reg::SP.into(), 4.into()]);
    }

    /// Turns a comparison of `$t1` (left) and the accumulator (right) into a boolean
    /// in the accumulator:
    ///
    /// ```text
    ///         <branch> $t1, $v0, true
    ///         li       $v0, FALSE
    ///         j        end
    /// true:   li       $v0, TRUE
    /// end:
    /// ```
    pub fn gen_compare(&mut self, branch: Opcode) {
        assert!(branch.is_branch(), "{branch} is not a branch");
        let true_label = self.next_label();
        let end_label = self.next_label();
        self.generate(
            branch,
            [Reg::T1.into(), asm::ACC.into(), (&true_label).into()],
        );
        self.generate(Opcode::Li, [asm::ACC.into(), asm::FALSE.into()]);
        self.generate(Opcode::J, [(&end_label).into()]);
        self.gen_label(&true_label, None);
        self.generate(Opcode::Li, [asm::ACC.into(), asm::TRUE.into()]);
        self.gen_label(&end_label, None);
    }
}

pub fn emit(
    program: &asm::Program,
    writer: &mut impl Write,
    options: &CompileOptions,
) -> Result<(), EmitterError> {
    log::info!("Emitting {} assembly lines", program.lines.len());

    write_out(program, writer, options).map_err(|e| EmitterError {
        message: format!("{e} while writing assembly"),
        source: e,
    })
}

fn write_out(
    program: &asm::Program,
    writer: &mut impl Write,
    options: &CompileOptions,
) -> std::io::Result<()> {
    let indent = "\t";

    for line in &program.lines {
        match line {
            Line::Instruction {
                opcode,
                operands,
                comment,
            } => {
                let opcode = opcode.to_string();
                write!(writer, "{indent}{opcode}")?;
                if !operands.is_empty() {
                    let space = (MAXLEN + 2).saturating_sub(opcode.len()).max(1);
                    let operands = operands
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(writer, "{:space$}{operands}", "")?;
                }
                write_comment(writer, comment, options)?;
                writeln!(writer)?;
            }
            Line::Label { label, comment } => {
                write!(writer, "{label}:")?;
                write_comment(writer, comment, options)?;
                writeln!(writer)?;
            }
            Line::Directive(directive) => {
                writeln!(writer, "{indent}{directive}")?;
            }
            Line::Data { label, directive } => {
                writeln!(writer, "{label}:{indent}{directive}")?;
            }
        }
    }

    writer.flush()
}

fn write_comment(
    writer: &mut impl Write,
    comment: &Option<String>,
    options: &CompileOptions,
) -> std::io::Result<()> {
    match comment {
        Some(comment) if options.emit_comments => write!(writer, "\t\t# {comment}"),
        _ => Ok(()),
    }
}
