use crate::asm::{self, ACC, Directive, FALSE, Opcode, Operand, Reg, TRUE};
use crate::ast::{
    BinaryOperator, Call, Declaration, Expression, Id, MethodDecl, PrintKind, Program, Statement,
    UnaryOperator, VarDecl,
};
use crate::context::CompilationContext;
use crate::emitter::Emitter;
use crate::id_gen::Label;
use crate::symbol_table::{SLOT_SIZE, Storage, Symbol};

/// Data-section label of the string `print` writes after every value.
pub const NEWLINE_LABEL: &str = "._newline";
pub const TRUE_LABEL: &str = "._true";
pub const FALSE_LABEL: &str = "._false";

const PRINT_INT: i32 = 1;
const PRINT_STRING: i32 = 4;

/// Generates SPIM assembly for a resolved and type checked program.
///
/// Must only run when no diagnostics were reported; an erroneous program yields an
/// empty listing.
pub fn generate(program: &Program, ctx: &mut CompilationContext) -> asm::Program {
    if ctx.failed() {
        log::error!(
            "Code generation skipped: {} error(s) reported",
            ctx.diagnostics.len()
        );
        return asm::Program::default();
    }

    log::info!("Generating code for class {}", program.name.name);

    let emitter = &mut ctx.emitter;
    gen_header(emitter);

    for declaration in &program.body.decls {
        match declaration {
            Declaration::Field(field) => gen_field(field, emitter),
            Declaration::Method(method) => gen_method(method, emitter),
        }
    }

    let program = emitter.finish();
    log::debug!("Generated {} lines", program.lines.len());
    program
}

fn gen_header(emitter: &mut Emitter) {
    emitter.directive(Directive::Data);
    emitter.data(
        &Label::named(TRUE_LABEL),
        Directive::Asciiz("true".to_string()),
    );
    emitter.data(
        &Label::named(FALSE_LABEL),
        Directive::Asciiz("false".to_string()),
    );
    emitter.data(
        &Label::named(NEWLINE_LABEL),
        Directive::Asciiz("\\n".to_string()),
    );
}

fn gen_field(field: &VarDecl, emitter: &mut Emitter) {
    let label = Label::named(&field.name.name);
    emitter.directive(Directive::Data);
    emitter.directive(Directive::Align(2));
    emitter.directive(Directive::Globl(label.clone()));
    emitter.data(&label, Directive::Word(0));
}

/// Entry label of a method. Only `main` keeps its own name.
pub fn method_label(name: &str) -> Label {
    if name == "main" {
        Label::named("main")
    } else {
        Label::named(format!("_{name}"))
    }
}

fn gen_method(method: &MethodDecl, emitter: &mut Emitter) {
    let symbol = method.name.resolved();
    let info = symbol
        .method
        .as_ref()
        .unwrap_or_else(|| panic!("method {} has no frame information", symbol.name));
    let entry = method_label(&method.name.name);

    emitter.directive(Directive::Text);
    if method.name.name == "main" {
        emitter.directive(Directive::Globl(entry.clone()));
    }
    emitter.gen_label(&entry, Some("METHOD ENTRY"));

    // Prologue
    emitter.gen_push(Reg::RA);
    emitter.gen_push(Reg::FP);
    emitter.generate_with_comment(
        Opcode::Addu,
        "set the frame pointer",
        [Reg::FP.into(), Reg::SP.into(), (2 * SLOT_SIZE).into()],
    );
    let frame_size = info.frame_size();
    if frame_size > 0 {
        emitter.generate_with_comment(
            Opcode::Subu,
            "reserve space for locals",
            [Reg::SP.into(), Reg::SP.into(), frame_size.into()],
        );
    }

    let exit = emitter.next_label();
    for statement in &method.body.stmts {
        gen_statement(statement, &exit, emitter);
    }

    // Epilogue
    emitter.gen_label(&exit, Some("METHOD EXIT"));
    emitter.generate_indexed(Opcode::Lw, Reg::RA, Reg::FP, 0, Some("load return address"));
    emitter.generate_with_comment(
        Opcode::Move,
        "save frame pointer",
        [Reg::T0.into(), Reg::FP.into()],
    );
    emitter.generate_indexed(
        Opcode::Lw,
        Reg::FP,
        Reg::FP,
        -SLOT_SIZE,
        Some("restore frame pointer"),
    );
    emitter.generate_with_comment(
        Opcode::Move,
        "restore stack pointer",
        [Reg::SP.into(), Reg::T0.into()],
    );
    emitter.generate_with_comment(Opcode::Jr, "return", [Reg::RA.into()]);
}

fn gen_statements(statements: &[Statement], exit: &Label, emitter: &mut Emitter) {
    for statement in statements {
        gen_statement(statement, exit, emitter);
    }
}

fn gen_statement(statement: &Statement, exit: &Label, emitter: &mut Emitter) {
    match statement {
        Statement::Print { exp, kind } => {
            let service = match kind {
                Some(PrintKind::Int) => PRINT_INT,
                Some(PrintKind::String) => PRINT_STRING,
                None => panic!("print at {} was not type checked", exp.span()),
            };
            gen_exp(exp, emitter);
            emitter.generate(Opcode::Move, [Reg::A0.into(), ACC.into()]);
            emitter.generate(Opcode::Li, [ACC.into(), service.into()]);
            emitter.generate(Opcode::Syscall, []);
            emitter.generate(
                Opcode::La,
                [Reg::A0.into(), Label::named(NEWLINE_LABEL).into()],
            );
            emitter.generate(Opcode::Li, [ACC.into(), PRINT_STRING.into()]);
            emitter.generate(Opcode::Syscall, []);
        }
        Statement::Assign { target, value } => {
            gen_exp(value, emitter);
            gen_store(target, emitter);
        }
        Statement::If {
            condition,
            then_block,
        } => {
            let end = emitter.next_label();
            gen_exp(condition, emitter);
            emitter.generate(Opcode::Beq, [ACC.into(), FALSE.into(), (&end).into()]);
            gen_statements(then_block, exit, emitter);
            emitter.gen_label(&end, None);
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
        } => {
            let else_label = emitter.next_label();
            let end = emitter.next_label();
            gen_exp(condition, emitter);
            emitter.generate(
                Opcode::Beq,
                [ACC.into(), FALSE.into(), (&else_label).into()],
            );
            gen_statements(then_block, exit, emitter);
            emitter.generate(Opcode::J, [(&end).into()]);
            emitter.gen_label(&else_label, None);
            gen_statements(else_block, exit, emitter);
            emitter.gen_label(&end, None);
        }
        Statement::While { condition, body } => {
            let start = emitter.next_label();
            let end = emitter.next_label();
            emitter.gen_label(&start, None);
            gen_exp(condition, emitter);
            emitter.generate(Opcode::Beq, [ACC.into(), FALSE.into(), (&end).into()]);
            gen_statements(body, exit, emitter);
            emitter.generate(Opcode::J, [(&start).into()]);
            emitter.gen_label(&end, None);
        }
        Statement::Call(call) => gen_call(call, emitter),
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                gen_exp(value, emitter);
            }
            emitter.generate(Opcode::J, [exit.into()]);
        }
        Statement::Switch {
            scrutinee,
            cases,
            default,
        } => {
            let end = emitter.next_label();
            let case_labels = cases
                .iter()
                .map(|_| emitter.next_label())
                .collect::<Vec<_>>();
            let default_label = default.as_ref().map(|_| emitter.next_label());

            gen_exp(scrutinee, emitter);
            for (case, label) in cases.iter().zip(&case_labels) {
                let Expression::IntLit { value, .. } = case.label else {
                    panic!("case label at {} is not a constant", case.label.span());
                };
                emitter.generate(Opcode::Li, [Reg::T1.into(), value.into()]);
                emitter.generate(Opcode::Beq, [ACC.into(), Reg::T1.into(), label.into()]);
            }
            emitter.generate(
                Opcode::J,
                [default_label.as_ref().unwrap_or(&end).into()],
            );

            for (case, label) in cases.iter().zip(&case_labels) {
                emitter.gen_label(label, None);
                gen_statements(&case.body, exit, emitter);
                emitter.generate(Opcode::J, [(&end).into()]);
            }
            if let (Some(body), Some(label)) = (default, &default_label) {
                emitter.gen_label(label, Some("default"));
                gen_statements(body, exit, emitter);
            }
            emitter.gen_label(&end, None);
        }
        Statement::Block(block) => gen_statements(&block.stmts, exit, emitter),
    }
}

/// Where a variable lives: its field label, or a frame-pointer relative slot.
fn location(symbol: &Symbol) -> Operand {
    match symbol.storage {
        Storage::Global => Label::named(&symbol.name).into(),
        storage => Operand::Indexed {
            offset: storage
                .frame_offset()
                .unwrap_or_else(|| panic!("{} has no frame slot", symbol.name)),
            base: Reg::FP,
        },
    }
}

fn gen_load(id: &Id, emitter: &mut Emitter) {
    let symbol = id.resolved();
    emitter.generate_with_comment(Opcode::Lw, &id.name, [ACC.into(), location(symbol)]);
}

fn gen_store(id: &Id, emitter: &mut Emitter) {
    let symbol = id.resolved();
    emitter.generate_with_comment(Opcode::Sw, &id.name, [ACC.into(), location(symbol)]);
}

/// Pushes the actuals last to first, jumps, then drops them again.
fn gen_call(call: &Call, emitter: &mut Emitter) {
    for arg in call.args.iter().rev() {
        gen_exp(arg, emitter);
        emitter.gen_push(ACC);
    }
    emitter.generate(Opcode::Jal, [method_label(&call.callee.name).into()]);
    if !call.args.is_empty() {
        let size = call.args.len() as i32 * SLOT_SIZE;
        emitter.generate_with_comment(
            Opcode::Addu,
            "pop arguments",
            [Reg::SP.into(), Reg::SP.into(), size.into()],
        );
    }
}

/// Leaves the value of `exp` in the accumulator. The stack pointer is the same
/// before and after.
fn gen_exp(exp: &Expression, emitter: &mut Emitter) {
    match exp {
        Expression::IntLit { value, .. } => {
            let label = emitter.next_label();
            emitter.directive(Directive::Data);
            emitter.data(&label, Directive::Word(*value));
            emitter.directive(Directive::Text);
            emitter.generate(Opcode::Lw, [ACC.into(), label.into()]);
        }
        Expression::StrLit { value, .. } => {
            let label = emitter.next_label();
            emitter.directive(Directive::Data);
            emitter.data(&label, Directive::Asciiz(value.clone()));
            emitter.directive(Directive::Text);
            emitter.generate(Opcode::La, [ACC.into(), label.into()]);
        }
        Expression::True(_) => emitter.generate(Opcode::Li, [ACC.into(), TRUE.into()]),
        Expression::False(_) => emitter.generate(Opcode::Li, [ACC.into(), FALSE.into()]),
        Expression::Id(id) => gen_load(id, emitter),
        Expression::Call(call) => gen_call(call, emitter),
        Expression::Unary(op, operand) => {
            gen_exp(operand, emitter);
            let opcode = match op {
                UnaryOperator::Negate => Opcode::Neg,
                UnaryOperator::Not => Opcode::Not,
            };
            emitter.generate(opcode, [ACC.into(), ACC.into()]);
        }
        Expression::Binary(BinaryOperator::And, left, right) => {
            gen_short_circuit(Opcode::Beq, FALSE, left, right, emitter)
        }
        Expression::Binary(BinaryOperator::Or, left, right) => {
            gen_short_circuit(Opcode::Bne, TRUE, left, right, emitter)
        }
        Expression::Binary(op, left, right) => {
            gen_exp(left, emitter);
            emitter.gen_push(ACC);
            gen_exp(right, emitter);
            emitter.gen_pop(Reg::T1);
            gen_binary(*op, emitter);
        }
    }
}

/// `&&` and `||`. Each operand is tested with `branch` against `FALSE`; a taken branch
/// settles the result as `settled`.
///
/// ```text
///           <left>
///           <branch> $v0, FALSE, settled
///           <right>
///           <branch> $v0, FALSE, settled
///           li       $v0, !settled
///           j        end
/// settled:  li       $v0, settled
/// end:
/// ```
fn gen_short_circuit(
    branch: Opcode,
    settled: i32,
    left: &Expression,
    right: &Expression,
    emitter: &mut Emitter,
) {
    let settled_label = emitter.next_label();
    let end = emitter.next_label();
    let otherwise = if settled == TRUE { FALSE } else { TRUE };

    gen_exp(left, emitter);
    emitter.generate(
        branch,
        [ACC.into(), FALSE.into(), (&settled_label).into()],
    );
    gen_exp(right, emitter);
    emitter.generate(
        branch,
        [ACC.into(), FALSE.into(), (&settled_label).into()],
    );
    emitter.generate(Opcode::Li, [ACC.into(), otherwise.into()]);
    emitter.generate(Opcode::J, [(&end).into()]);
    emitter.gen_label(&settled_label, None);
    emitter.generate(Opcode::Li, [ACC.into(), settled.into()]);
    emitter.gen_label(&end, None);
}

/// Combines the left operand in `$t1` with the right operand in the accumulator.
fn gen_binary(op: BinaryOperator, emitter: &mut Emitter) {
    let opcode = match op {
        BinaryOperator::Add => Opcode::Add,
        BinaryOperator::Subtract => Opcode::Sub,
        BinaryOperator::Multiply => Opcode::Mul,
        BinaryOperator::Divide => {
            emitter.generate(Opcode::Div, [Reg::T1.into(), ACC.into()]);
            emitter.generate(Opcode::Mflo, [ACC.into()]);
            return;
        }
        BinaryOperator::Power => return gen_power(emitter),
        BinaryOperator::Equal => return emitter.gen_compare(Opcode::Beq),
        BinaryOperator::NotEqual => return emitter.gen_compare(Opcode::Bne),
        BinaryOperator::LessThan => return emitter.gen_compare(Opcode::Blt),
        BinaryOperator::GreaterThan => return emitter.gen_compare(Opcode::Bgt),
        BinaryOperator::LessOrEqual => return emitter.gen_compare(Opcode::Ble),
        BinaryOperator::GreaterOrEqual => return emitter.gen_compare(Opcode::Bge),
        BinaryOperator::And | BinaryOperator::Or => {
            panic!("{op} must be generated with short-circuit evaluation")
        }
    };
    emitter.generate(opcode, [ACC.into(), Reg::T1.into(), ACC.into()]);
}

/// `$t1 ** $v0` by repeated multiplication. A negative exponent gives 0.
fn gen_power(emitter: &mut Emitter) {
    let loop_label = emitter.next_label();
    let end = emitter.next_label();

    emitter.generate_with_comment(Opcode::Move, "exponent", [Reg::T2.into(), ACC.into()]);
    emitter.generate(Opcode::Li, [ACC.into(), 1.into()]);
    emitter.generate(Opcode::Bgez, [Reg::T2.into(), (&loop_label).into()]);
    emitter.generate(Opcode::Li, [ACC.into(), 0.into()]);
    emitter.generate(Opcode::J, [(&end).into()]);
    emitter.gen_label(&loop_label, None);
    emitter.generate(Opcode::Blez, [Reg::T2.into(), (&end).into()]);
    emitter.generate(Opcode::Mul, [ACC.into(), ACC.into(), Reg::T1.into()]);
    emitter.generate(Opcode::Subu, [Reg::T2.into(), Reg::T2.into(), 1.into()]);
    emitter.generate(Opcode::J, [(&loop_label).into()]);
    emitter.gen_label(&end, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::Line;
    use crate::ast::{Block, Case, ReturnType, TypeNode};
    use crate::context::CompileOptions;
    use crate::testing::*;
    use crate::{resolve, typecheck};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn compiled(mut program: Program) -> asm::Program {
        init_logger();
        let mut ctx = CompilationContext::new(CompileOptions::default());
        resolve::analyse(&mut program, &mut ctx);
        typecheck::check(&mut program, &mut ctx);
        assert!(
            !ctx.failed(),
            "{:?}",
            ctx.diagnostics.iter().collect::<Vec<_>>()
        );
        generate(&program, &mut ctx)
    }

    fn opcodes(program: &asm::Program) -> Vec<Opcode> {
        program.instructions().map(|(opcode, _)| opcode).collect()
    }

    fn ops(opcode: Opcode, operands: Vec<Operand>) -> (Opcode, Vec<Operand>) {
        (opcode, operands)
    }

    fn index_of_label(program: &asm::Program, label: &str) -> usize {
        program
            .lines
            .iter()
            .position(|line| matches!(line, Line::Label { label: l, .. } if l.as_str() == label))
            .unwrap_or_else(|| panic!("no label {label}"))
    }

    /// Instructions between the entry label of `method` and its exit label, prologue
    /// excluded.
    fn body_of(program: &asm::Program, method: &str) -> Vec<(Opcode, Vec<Operand>)> {
        let start = index_of_label(program, method);
        let lines = &program.lines[start + 1..];
        let end = lines
            .iter()
            .position(|line| matches!(line, Line::Label { comment: Some(c), .. } if c == "METHOD EXIT"))
            .unwrap();
        lines[..end]
            .iter()
            .filter_map(|line| match line {
                Line::Instruction {
                    opcode, operands, ..
                } => Some((*opcode, operands.clone())),
                _ => None,
            })
            .skip_while(|(opcode, operands)| {
                // The prologue ends with the frame set-up.
                !(*opcode == Opcode::Addu && operands.first() == Some(&Reg::FP.into()))
            })
            .skip(1)
            .skip_while(|(opcode, operands)| {
                *opcode == Opcode::Subu && operands.first() == Some(&Reg::SP.into())
            })
            .collect()
    }

    /// Net change of `$sp` made by a run of instructions.
    fn stack_delta(instructions: &[(Opcode, Vec<Operand>)]) -> i32 {
        instructions
            .iter()
            .map(|(opcode, operands)| match (opcode, operands.as_slice()) {
                (Opcode::Subu, [Operand::Reg(Reg::SP), Operand::Reg(Reg::SP), Operand::Imm(n)]) => -n,
                (Opcode::Addu, [Operand::Reg(Reg::SP), Operand::Reg(Reg::SP), Operand::Imm(n)]) => *n,
                _ => 0,
            })
            .sum()
    }

    fn data_label(program: &asm::Program, directive: &Directive) -> Label {
        program
            .lines
            .iter()
            .find_map(|line| match line {
                Line::Data { label, directive: d } if d == directive => Some(label.clone()),
                _ => None,
            })
            .unwrap_or_else(|| panic!("no data entry {directive}"))
    }

    #[test]
    fn test_header_comes_first() {
        let program = compiled(program(vec![main_method(Block::default())]));
        assert_eq!(
            program.lines[..4],
            [
                Line::Directive(Directive::Data),
                Line::Data {
                    label: Label::named(TRUE_LABEL),
                    directive: Directive::Asciiz("true".into())
                },
                Line::Data {
                    label: Label::named(FALSE_LABEL),
                    directive: Directive::Asciiz("false".into())
                },
                Line::Data {
                    label: Label::named(NEWLINE_LABEL),
                    directive: Directive::Asciiz("\\n".into())
                },
            ]
        );
    }

    #[test]
    fn test_field() {
        let program = compiled(program(vec![
            field(TypeNode::Int, "count"),
            main_method(block(vec![], vec![Statement::assign("count", Expression::int(1))])),
        ]));
        let label = Label::named("count");
        let at = index_of_label(&program, "main");
        assert!(program.lines[..at].contains(&Line::Directive(Directive::Globl(label.clone()))));
        assert!(program.lines[..at].contains(&Line::Data {
            label: label.clone(),
            directive: Directive::Word(0)
        }));
        assert_eq!(
            body_of(&program, "main").last(),
            Some(&ops(Opcode::Sw, vec![ACC.into(), label.into()]))
        );
    }

    #[test]
    fn test_assign_sum_to_local() {
        let program = compiled(program(vec![main_method(block(
            vec![int_var("x")],
            vec![Statement::assign(
                "x",
                Expression::binary(BinaryOperator::Add, Expression::int(3), Expression::int(4)),
            )],
        ))]));

        let three = data_label(&program, &Directive::Word(3));
        let four = data_label(&program, &Directive::Word(4));
        assert_eq!(
            body_of(&program, "main"),
            vec![
                ops(Opcode::Lw, vec![ACC.into(), three.into()]),
                ops(Opcode::Sw, vec![ACC.into(), Operand::Indexed { offset: 0, base: Reg::SP }]),
                ops(Opcode::Subu, vec![Reg::SP.into(), Reg::SP.into(), 4.into()]),
                ops(Opcode::Lw, vec![ACC.into(), four.into()]),
                ops(Opcode::Lw, vec![Reg::T1.into(), Operand::Indexed { offset: 4, base: Reg::SP }]),
                ops(Opcode::Addu, vec![Reg::SP.into(), Reg::SP.into(), 4.into()]),
                ops(Opcode::Add, vec![ACC.into(), Reg::T1.into(), ACC.into()]),
                ops(Opcode::Sw, vec![ACC.into(), Operand::Indexed { offset: -8, base: Reg::FP }]),
            ]
        );
    }

    #[test]
    fn test_unary_operators() {
        let program = compiled(program(vec![main_method(block(
            vec![bool_var("b"), int_var("x")],
            vec![
                Statement::assign("b", Expression::unary(UnaryOperator::Not, truth())),
                Statement::assign("x", Expression::unary(UnaryOperator::Negate, Expression::var("x"))),
            ],
        ))]));

        assert_eq!(
            body_of(&program, "main"),
            vec![
                ops(Opcode::Li, vec![ACC.into(), TRUE.into()]),
                ops(Opcode::Not, vec![ACC.into(), ACC.into()]),
                ops(Opcode::Sw, vec![ACC.into(), Operand::Indexed { offset: -8, base: Reg::FP }]),
                ops(Opcode::Lw, vec![ACC.into(), Operand::Indexed { offset: -12, base: Reg::FP }]),
                ops(Opcode::Neg, vec![ACC.into(), ACC.into()]),
                ops(Opcode::Sw, vec![ACC.into(), Operand::Indexed { offset: -12, base: Reg::FP }]),
            ]
        );
        // `not` is a bitwise complement, which swaps the two boolean encodings.
        assert_eq!(!TRUE, FALSE);
        assert_eq!(!FALSE, TRUE);
    }

    #[test]
    fn test_prologue_and_epilogue() {
        let program = compiled(program(vec![
            method(
                "f",
                ReturnType::Int,
                vec![int_var("a")],
                block(
                    vec![int_var("b"), int_var("c")],
                    vec![Statement::return_value(Expression::var("a"))],
                ),
            ),
            main_method(Block::default()),
        ]));

        let start = index_of_label(&program, "_f");
        let prologue = program.lines[start + 1..start + 6]
            .iter()
            .map(|line| line.opcode().unwrap())
            .collect::<Vec<_>>();
        assert_eq!(
            prologue,
            vec![Opcode::Sw, Opcode::Subu, Opcode::Sw, Opcode::Subu, Opcode::Addu]
        );
        assert_matches!(
            &program.lines[start + 6],
            Line::Instruction { opcode: Opcode::Subu, operands, .. } if operands[2] == Operand::Imm(8)
        );

        assert_eq!(
            body_of(&program, "_f")[0],
            ops(Opcode::Lw, vec![ACC.into(), Operand::Indexed { offset: 4, base: Reg::FP }])
        );

        let exit = program.lines[start..]
            .iter()
            .position(|line| matches!(line, Line::Label { comment: Some(c), .. } if c == "METHOD EXIT"))
            .unwrap()
            + start;
        let epilogue = program.lines[exit + 1..exit + 6]
            .iter()
            .map(|line| match line {
                Line::Instruction { opcode, operands, .. } => (*opcode, operands.clone()),
                other => panic!("unexpected {other:?}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(
            epilogue,
            vec![
                ops(Opcode::Lw, vec![Reg::RA.into(), Operand::Indexed { offset: 0, base: Reg::FP }]),
                ops(Opcode::Move, vec![Reg::T0.into(), Reg::FP.into()]),
                ops(Opcode::Lw, vec![Reg::FP.into(), Operand::Indexed { offset: -4, base: Reg::FP }]),
                ops(Opcode::Move, vec![Reg::SP.into(), Reg::T0.into()]),
                ops(Opcode::Jr, vec![Reg::RA.into()]),
            ]
        );
    }

    #[test]
    fn test_main_is_global() {
        let program = compiled(program(vec![main_method(Block::default())]));
        let at = index_of_label(&program, "main");
        assert_eq!(
            program.lines[at - 1],
            Line::Directive(Directive::Globl(Label::named("main")))
        );
        // No locals: no frame reservation.
        assert_eq!(
            opcodes(&program),
            vec![
                Opcode::Sw,
                Opcode::Subu,
                Opcode::Sw,
                Opcode::Subu,
                Opcode::Addu,
                Opcode::Lw,
                Opcode::Move,
                Opcode::Lw,
                Opcode::Move,
                Opcode::Jr
            ]
        );
    }

    #[test]
    fn test_call_pushes_reversed_and_pops() {
        let program = compiled(program(vec![
            method(
                "f",
                ReturnType::Void,
                vec![int_var("a"), int_var("b")],
                Block::default(),
            ),
            main_method(block(
                vec![],
                vec![Statement::call(
                    "f",
                    vec![Expression::int(1), Expression::int(2)],
                )],
            )),
        ]));

        let one = data_label(&program, &Directive::Word(1));
        let two = data_label(&program, &Directive::Word(2));
        let body = body_of(&program, "main");
        assert_eq!(body[0], ops(Opcode::Lw, vec![ACC.into(), two.into()]));
        assert_eq!(body[3], ops(Opcode::Lw, vec![ACC.into(), one.into()]));
        assert_eq!(body[6], ops(Opcode::Jal, vec![Label::named("_f").into()]));
        assert_eq!(
            body[7],
            ops(Opcode::Addu, vec![Reg::SP.into(), Reg::SP.into(), 8.into()])
        );
        assert_eq!(stack_delta(&body), 0);
    }

    #[test]
    fn test_expressions_are_stack_neutral() {
        use BinaryOperator::*;
        let nested = Expression::binary(
            Add,
            Expression::binary(Multiply, Expression::var("x"), Expression::int(2)),
            Expression::binary(
                Power,
                Expression::call("f", vec![Expression::var("x"), Expression::int(1)]),
                Expression::binary(Divide, Expression::int(8), Expression::var("x")),
            ),
        );
        let boolean = Expression::binary(
            Or,
            Expression::binary(LessThan, Expression::var("x"), Expression::int(2)),
            Expression::binary(
                And,
                Expression::unary(UnaryOperator::Not, Expression::var("b")),
                Expression::binary(NotEqual, Expression::var("s"), Expression::string("s")),
            ),
        );
        let program = compiled(program(vec![
            method(
                "f",
                ReturnType::Int,
                vec![int_var("p"), int_var("q")],
                block(vec![], vec![Statement::return_value(Expression::var("p"))]),
            ),
            main_method(block(
                vec![int_var("x"), bool_var("b"), string_var("s")],
                vec![
                    Statement::assign("x", nested),
                    Statement::assign("b", boolean),
                ],
            )),
        ]));

        let body = body_of(&program, "main");
        assert_eq!(stack_delta(&body), 0);
        // Pushes and pops pair up.
        let pushes = body
            .iter()
            .filter(|(opcode, operands)| *opcode == Opcode::Sw && operands[1] == Operand::Indexed { offset: 0, base: Reg::SP })
            .count();
        let pops = body
            .iter()
            .filter(|(opcode, operands)| *opcode == Opcode::Lw && operands[1] == Operand::Indexed { offset: 4, base: Reg::SP })
            .count();
        // Arguments are dropped by the caller, not popped.
        assert_eq!(pushes, 8);
        assert_eq!(pops, 6);
    }

    #[test]
    fn test_and_skips_right_operand() {
        // false && (1 / 0 == 0)
        let exp = Expression::binary(
            BinaryOperator::And,
            falsity(),
            Expression::binary(
                BinaryOperator::Equal,
                Expression::binary(BinaryOperator::Divide, Expression::int(1), Expression::int(0)),
                Expression::int(0),
            ),
        );
        let program = compiled(program(vec![main_method(block(
            vec![bool_var("b")],
            vec![Statement::assign("b", exp)],
        ))]));

        let body = body_of(&program, "main");
        assert_eq!(body[0], ops(Opcode::Li, vec![ACC.into(), FALSE.into()]));
        let Some((Opcode::Beq, operands)) = body.get(1) else {
            panic!("left operand is not tested first: {body:?}");
        };
        assert_eq!(operands[..2], [Operand::Reg(ACC), Operand::Imm(FALSE)]);
        let Operand::Label(false_label) = &operands[2] else {
            panic!()
        };

        let div = body.iter().position(|(opcode, _)| *opcode == Opcode::Div).unwrap();
        assert!(div > 1);

        // The false label settles the result without running the division.
        let at = index_of_label(&program, false_label.as_str());
        assert_matches!(
            &program.lines[at + 1],
            Line::Instruction { opcode: Opcode::Li, operands, .. } if operands[1] == Operand::Imm(FALSE)
        );
        assert!(
            program.lines[at..]
                .iter()
                .take_while(|line| line.opcode() != Some(Opcode::Sw))
                .all(|line| line.opcode() != Some(Opcode::Div))
        );
    }

    #[test]
    fn test_or_branches_on_true() {
        let program = compiled(program(vec![main_method(block(
            vec![bool_var("b")],
            vec![Statement::assign(
                "b",
                Expression::binary(BinaryOperator::Or, Expression::var("b"), truth()),
            )],
        ))]));
        let body = body_of(&program, "main");
        assert_eq!(
            body.iter().map(|(opcode, _)| *opcode).collect::<Vec<_>>(),
            vec![
                Opcode::Lw,
                Opcode::Bne,
                Opcode::Li,
                Opcode::Bne,
                Opcode::Li,
                Opcode::J,
                Opcode::Li,
                Opcode::Sw
            ]
        );
        assert_eq!(body[4], ops(Opcode::Li, vec![ACC.into(), FALSE.into()]));
        assert_eq!(body[6], ops(Opcode::Li, vec![ACC.into(), TRUE.into()]));
    }

    #[test]
    fn test_comparison_operators() {
        for (op, branch) in [
            (BinaryOperator::Equal, Opcode::Beq),
            (BinaryOperator::NotEqual, Opcode::Bne),
            (BinaryOperator::LessThan, Opcode::Blt),
            (BinaryOperator::GreaterThan, Opcode::Bgt),
            (BinaryOperator::LessOrEqual, Opcode::Ble),
            (BinaryOperator::GreaterOrEqual, Opcode::Bge),
        ] {
            let program = compiled(program(vec![main_method(block(
                vec![bool_var("b"), int_var("x")],
                vec![Statement::assign(
                    "b",
                    Expression::binary(op, Expression::var("x"), Expression::int(1)),
                )],
            ))]));
            let body = body_of(&program, "main");
            assert_eq!(body[6].0, branch);
            assert_eq!(body[6].1[..2], [Operand::Reg(Reg::T1), Operand::Reg(ACC)]);
        }
    }

    #[test]
    fn test_power_loop() {
        let program = compiled(program(vec![main_method(block(
            vec![int_var("x")],
            vec![Statement::assign(
                "x",
                Expression::binary(BinaryOperator::Power, Expression::var("x"), Expression::int(3)),
            )],
        ))]));
        let body = body_of(&program, "main");
        let tail = body[6..].iter().map(|(opcode, _)| *opcode).collect::<Vec<_>>();
        assert_eq!(
            tail,
            vec![
                Opcode::Move,
                Opcode::Li,
                Opcode::Bgez,
                Opcode::Li,
                Opcode::J,
                Opcode::Blez,
                Opcode::Mul,
                Opcode::Subu,
                Opcode::J,
                Opcode::Sw
            ]
        );
        assert_eq!(body[9], ops(Opcode::Li, vec![ACC.into(), 0.into()]));
    }

    #[test]
    fn test_print_selects_service() {
        let program = compiled(program(vec![main_method(block(
            vec![],
            vec![
                Statement::print(Expression::int(7)),
                Statement::print(Expression::string("hi")),
            ],
        ))]));
        let body = body_of(&program, "main");
        let services = body
            .iter()
            .filter_map(|(opcode, operands)| match (opcode, operands.as_slice()) {
                (Opcode::Li, [Operand::Reg(Reg::V0), Operand::Imm(n)]) => Some(*n),
                _ => None,
            })
            .collect::<Vec<_>>();
        assert_eq!(services, vec![1, 4, 4, 4]);
        assert!(body.contains(&ops(
            Opcode::La,
            vec![Reg::A0.into(), Label::named(NEWLINE_LABEL).into()]
        )));
        let hi = data_label(&program, &Directive::Asciiz("hi".into()));
        assert!(body.contains(&ops(Opcode::La, vec![ACC.into(), hi.into()])));
    }

    #[test]
    fn test_if_else_and_while() {
        let program = compiled(program(vec![main_method(block(
            vec![int_var("x")],
            vec![
                Statement::IfElse {
                    condition: truth(),
                    then_block: vec![Statement::assign("x", Expression::int(1))],
                    else_block: vec![Statement::assign("x", Expression::int(2))],
                },
                Statement::While {
                    condition: Expression::binary(
                        BinaryOperator::LessThan,
                        Expression::var("x"),
                        Expression::int(10),
                    ),
                    body: vec![Statement::assign(
                        "x",
                        Expression::binary(BinaryOperator::Add, Expression::var("x"), Expression::int(1)),
                    )],
                },
            ],
        ))]));
        let body = body_of(&program, "main");
        assert_eq!(
            body[..6].iter().map(|(opcode, _)| *opcode).collect::<Vec<_>>(),
            vec![Opcode::Li, Opcode::Beq, Opcode::Lw, Opcode::Sw, Opcode::J, Opcode::Lw]
        );

        // The loop jumps back to a label placed before the guard.
        let (_, back) = body
            .iter()
            .rev()
            .find(|(opcode, _)| *opcode == Opcode::J)
            .unwrap();
        let Operand::Label(start) = &back[0] else {
            panic!()
        };
        let at = index_of_label(&program, start.as_str());
        assert_matches!(
            &program.lines[at + 1],
            Line::Instruction { opcode: Opcode::Lw, comment: Some(c), .. } if c == "x"
        );
    }

    #[test]
    fn test_switch_has_no_fall_through() {
        let program = compiled(program(vec![main_method(block(
            vec![int_var("x")],
            vec![Statement::Switch {
                scrutinee: Expression::var("x"),
                cases: vec![
                    Case {
                        label: Expression::int(1),
                        body: vec![Statement::print(Expression::int(10))],
                    },
                    Case {
                        label: Expression::int(2),
                        body: vec![],
                    },
                ],
                default: Some(vec![Statement::print(Expression::int(0))]),
            }],
        ))]));
        let body = body_of(&program, "main");
        assert_eq!(
            body[..6],
            [
                ops(Opcode::Lw, vec![ACC.into(), Operand::Indexed { offset: -8, base: Reg::FP }]),
                ops(Opcode::Li, vec![Reg::T1.into(), 1.into()]),
                ops(Opcode::Beq, vec![ACC.into(), Reg::T1.into(), Label::named("._L2").into()]),
                ops(Opcode::Li, vec![Reg::T1.into(), 2.into()]),
                ops(Opcode::Beq, vec![ACC.into(), Reg::T1.into(), Label::named("._L3").into()]),
                ops(Opcode::J, vec![Label::named("._L4").into()]),
            ]
        );
        // Both case bodies end by jumping past the default.
        let to_end = body
            .iter()
            .filter(|instruction| **instruction == ops(Opcode::J, vec![Label::named("._L1").into()]))
            .count();
        assert_eq!(to_end, 2);
    }

    #[test]
    fn test_return_jumps_to_exit() {
        let program = compiled(program(vec![
            method(
                "f",
                ReturnType::Int,
                vec![],
                block(
                    vec![],
                    vec![
                        Statement::If {
                            condition: truth(),
                            then_block: vec![Statement::return_value(Expression::int(1))],
                        },
                        Statement::return_value(Expression::int(2)),
                    ],
                ),
            ),
            main_method(Block::default()),
        ]));
        let body = body_of(&program, "_f");
        let exit = Label::named("._L0");
        let jumps = body
            .iter()
            .filter(|instruction| **instruction == ops(Opcode::J, vec![exit.clone().into()]))
            .count();
        assert_eq!(jumps, 2);
    }

    #[test]
    fn test_nested_block_uses_reserved_slots() {
        let program = compiled(program(vec![main_method(block(
            vec![int_var("x")],
            vec![Statement::Block(block(
                vec![int_var("x")],
                vec![Statement::assign("x", Expression::int(1))],
            ))],
        ))]));
        let start = index_of_label(&program, "main");
        assert_matches!(
            &program.lines[start + 6],
            Line::Instruction { opcode: Opcode::Subu, operands, .. } if operands[2] == Operand::Imm(8)
        );
        assert_eq!(
            body_of(&program, "main").last(),
            Some(&ops(Opcode::Sw, vec![ACC.into(), Operand::Indexed { offset: -12, base: Reg::FP }]))
        );
    }

    #[test]
    fn test_erroneous_program_generates_nothing() {
        let mut program = program(vec![]);
        let mut ctx = CompilationContext::new(CompileOptions::default());
        resolve::analyse(&mut program, &mut ctx);
        assert!(ctx.failed());
        assert_eq!(generate(&program, &mut ctx), asm::Program::default());
    }
}
