//! Renders a syntax tree back to Simple source text.
//!
//! Every function takes the sink and the number of spaces to indent by; nested
//! constructs are indented two spaces deeper than their parent. Binary
//! expressions are fully parenthesised.

use crate::ast::{
    Block, Call, Declaration, Expression, MethodDecl, Program, Statement, VarDecl,
};
use std::io::{self, Write};

const STEP: usize = 2;

fn do_indent(sink: &mut impl Write, indent: usize) -> io::Result<()> {
    write!(sink, "{:indent$}", "")
}

pub fn decompile(program: &Program, sink: &mut impl Write, indent: usize) -> io::Result<()> {
    do_indent(sink, indent)?;
    writeln!(sink, "public class {} {{", program.name.name)?;
    for declaration in &program.body.decls {
        decompile_declaration(declaration, sink, indent + STEP)?;
    }
    do_indent(sink, indent)?;
    writeln!(sink, "}}")
}

pub fn decompile_declaration(
    declaration: &Declaration,
    sink: &mut impl Write,
    indent: usize,
) -> io::Result<()> {
    match declaration {
        Declaration::Field(field) => {
            do_indent(sink, indent)?;
            writeln!(sink, "static {} {};", field.type_, field.name.name)
        }
        Declaration::Method(method) => decompile_method(method, sink, indent),
    }
}

fn decompile_method(method: &MethodDecl, sink: &mut impl Write, indent: usize) -> io::Result<()> {
    let formals = method
        .formals
        .iter()
        .map(|formal| format!("{} {}", formal.type_, formal.name.name))
        .collect::<Vec<_>>()
        .join(", ");
    do_indent(sink, indent)?;
    writeln!(
        sink,
        "public static {} {}({formals}) {{",
        method.return_type, method.name.name
    )?;
    decompile_block_contents(&method.body, sink, indent + STEP)?;
    do_indent(sink, indent)?;
    writeln!(sink, "}}")
}

pub fn decompile_var_decl(decl: &VarDecl, sink: &mut impl Write, indent: usize) -> io::Result<()> {
    do_indent(sink, indent)?;
    writeln!(sink, "{} {};", decl.type_, decl.name.name)
}

fn decompile_block_contents(block: &Block, sink: &mut impl Write, indent: usize) -> io::Result<()> {
    for decl in &block.decls {
        decompile_var_decl(decl, sink, indent)?;
    }
    decompile_statements(&block.stmts, sink, indent)
}

fn decompile_statements(
    statements: &[Statement],
    sink: &mut impl Write,
    indent: usize,
) -> io::Result<()> {
    for statement in statements {
        decompile_statement(statement, sink, indent)?;
    }
    Ok(())
}

/// `{`, the statements one level deeper, and a closing `}` at `indent`, with no
/// leading indentation or trailing newline.
fn decompile_body(
    statements: &[Statement],
    sink: &mut impl Write,
    indent: usize,
) -> io::Result<()> {
    writeln!(sink, "{{")?;
    decompile_statements(statements, sink, indent + STEP)?;
    do_indent(sink, indent)?;
    write!(sink, "}}")
}

pub fn decompile_statement(
    statement: &Statement,
    sink: &mut impl Write,
    indent: usize,
) -> io::Result<()> {
    do_indent(sink, indent)?;
    match statement {
        Statement::Print { exp, .. } => {
            write!(sink, "System.out.println(")?;
            decompile_exp(exp, sink)?;
            writeln!(sink, ");")
        }
        Statement::Assign { target, value } => {
            write!(sink, "{} = ", target.name)?;
            decompile_exp(value, sink)?;
            writeln!(sink, ";")
        }
        Statement::If {
            condition,
            then_block,
        } => {
            write!(sink, "if (")?;
            decompile_exp(condition, sink)?;
            write!(sink, ") ")?;
            decompile_body(then_block, sink, indent)?;
            writeln!(sink)
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
        } => {
            write!(sink, "if (")?;
            decompile_exp(condition, sink)?;
            write!(sink, ") ")?;
            decompile_body(then_block, sink, indent)?;
            write!(sink, " else ")?;
            decompile_body(else_block, sink, indent)?;
            writeln!(sink)
        }
        Statement::While { condition, body } => {
            write!(sink, "while (")?;
            decompile_exp(condition, sink)?;
            write!(sink, ") ")?;
            decompile_body(body, sink, indent)?;
            writeln!(sink)
        }
        Statement::Call(call) => {
            decompile_call(call, sink)?;
            writeln!(sink, ";")
        }
        Statement::Return { value: None, .. } => writeln!(sink, "return;"),
        Statement::Return {
            value: Some(value), ..
        } => {
            write!(sink, "return ")?;
            decompile_exp(value, sink)?;
            writeln!(sink, ";")
        }
        Statement::Switch {
            scrutinee,
            cases,
            default,
        } => {
            write!(sink, "switch (")?;
            decompile_exp(scrutinee, sink)?;
            writeln!(sink, ") {{")?;
            for case in cases {
                do_indent(sink, indent + STEP)?;
                write!(sink, "case ")?;
                decompile_exp(&case.label, sink)?;
                writeln!(sink, ":")?;
                decompile_statements(&case.body, sink, indent + 2 * STEP)?;
                do_indent(sink, indent + 2 * STEP)?;
                writeln!(sink, "break;")?;
            }
            if let Some(default) = default {
                do_indent(sink, indent + STEP)?;
                writeln!(sink, "default:")?;
                decompile_statements(default, sink, indent + 2 * STEP)?;
            }
            do_indent(sink, indent)?;
            writeln!(sink, "}}")
        }
        Statement::Block(block) => {
            writeln!(sink, "{{")?;
            decompile_block_contents(block, sink, indent + STEP)?;
            do_indent(sink, indent)?;
            writeln!(sink, "}}")
        }
    }
}

fn decompile_call(call: &Call, sink: &mut impl Write) -> io::Result<()> {
    write!(sink, "{}(", call.callee.name)?;
    for (i, arg) in call.args.iter().enumerate() {
        if i > 0 {
            write!(sink, ", ")?;
        }
        decompile_exp(arg, sink)?;
    }
    write!(sink, ")")
}

pub fn decompile_exp(exp: &Expression, sink: &mut impl Write) -> io::Result<()> {
    match exp {
        Expression::IntLit { value, .. } => write!(sink, "{value}"),
        Expression::StrLit { value, .. } => write!(sink, "\"{value}\""),
        Expression::True(_) => write!(sink, "true"),
        Expression::False(_) => write!(sink, "false"),
        Expression::Id(id) => write!(sink, "{}", id.name),
        Expression::Call(call) => decompile_call(call, sink),
        Expression::Unary(op, operand) => {
            write!(sink, "{op}")?;
            match **operand {
                Expression::IntLit { value, .. } if value < 0 => write!(sink, "({value})"),
                Expression::Unary(..) => {
                    write!(sink, "(")?;
                    decompile_exp(operand, sink)?;
                    write!(sink, ")")
                }
                _ => decompile_exp(operand, sink),
            }
        }
        Expression::Binary(op, left, right) => {
            write!(sink, "(")?;
            decompile_exp(left, sink)?;
            write!(sink, " {op} ")?;
            decompile_exp(right, sink)?;
            write!(sink, ")")
        }
    }
}
