use crate::ast::{
    BinaryOperator, Block, Call, Declaration, Expression, MethodDecl, PrintKind, Program,
    ReturnType, Statement, UnaryOperator,
};
use crate::context::CompilationContext;
use crate::diagnostics::{Diagnostics, SemanticError};
use crate::types::Type;
use std::collections::HashSet;

/// Type checks a resolved program. Declines to run if name analysis reported errors.
pub fn check(program: &mut Program, ctx: &mut CompilationContext) {
    if ctx.failed() {
        log::error!(
            "Type checking skipped: name analysis reported {} error(s)",
            ctx.diagnostics.len()
        );
        return;
    }

    log::info!("Type checking class {}", program.name.name);

    let diagnostics = &mut ctx.diagnostics;
    for declaration in &mut program.body.decls {
        match declaration {
            Declaration::Field(_) => {}
            Declaration::Method(method) => typecheck_method(method, diagnostics),
        }
    }
}

fn mismatch(diagnostics: &mut Diagnostics, exp: &Expression, message: String) {
    diagnostics.report(exp.span(), SemanticError::TypeMismatch(message));
}

fn typecheck_method(method: &mut MethodDecl, diagnostics: &mut Diagnostics) {
    let return_type = method.return_type;
    typecheck_block(&mut method.body, return_type, diagnostics);
}

fn typecheck_block(block: &mut Block, return_type: ReturnType, diagnostics: &mut Diagnostics) {
    typecheck_statements(&mut block.stmts, return_type, diagnostics);
}

fn typecheck_statements(
    statements: &mut [Statement],
    return_type: ReturnType,
    diagnostics: &mut Diagnostics,
) {
    for statement in statements {
        typecheck_statement(statement, return_type, diagnostics);
    }
}

fn typecheck_statement(
    statement: &mut Statement,
    return_type: ReturnType,
    diagnostics: &mut Diagnostics,
) {
    match statement {
        Statement::Print { exp, kind } => match typecheck_exp(exp, diagnostics) {
            Type::Int => *kind = Some(PrintKind::Int),
            Type::String => *kind = Some(PrintKind::String),
            Type::Error => {}
            other => mismatch(
                diagnostics,
                exp,
                format!("print expects an int or a String, found {other}"),
            ),
        },
        Statement::Assign { target, value } => {
            let symbol = target.resolved();
            let value_type = typecheck_exp(value, diagnostics);
            if symbol.type_.is_method() {
                diagnostics.report(
                    target.span,
                    SemanticError::TypeMismatch(format!(
                        "cannot assign to method {}",
                        target.name
                    )),
                );
            } else if !value_type.is_error() && value_type != symbol.type_ {
                mismatch(
                    diagnostics,
                    value,
                    format!(
                        "cannot assign {value_type} to {} of type {}",
                        target.name, symbol.type_
                    ),
                );
            }
        }
        Statement::If {
            condition,
            then_block,
        } => {
            typecheck_condition(condition, Type::Boolean, "if", diagnostics);
            typecheck_statements(then_block, return_type, diagnostics);
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
        } => {
            typecheck_condition(condition, Type::Boolean, "if", diagnostics);
            typecheck_statements(then_block, return_type, diagnostics);
            typecheck_statements(else_block, return_type, diagnostics);
        }
        Statement::While { condition, body } => {
            typecheck_condition(condition, Type::Boolean, "while", diagnostics);
            typecheck_statements(body, return_type, diagnostics);
        }
        Statement::Call(call) => {
            typecheck_call(call, diagnostics);
        }
        Statement::Return { value, span } => match (value, return_type) {
            (Some(value), ReturnType::Int) => {
                let value_type = typecheck_exp(value, diagnostics);
                if !value_type.is_error() && value_type != Type::Int {
                    mismatch(
                        diagnostics,
                        value,
                        format!("int method returns a value of type {value_type}"),
                    );
                }
            }
            (Some(value), ReturnType::Void) => {
                typecheck_exp(value, diagnostics);
                mismatch(
                    diagnostics,
                    value,
                    "return with a value in a void method".to_string(),
                );
            }
            (None, ReturnType::Int) => diagnostics.report(
                *span,
                SemanticError::TypeMismatch("missing return value in int method".to_string()),
            ),
            (None, ReturnType::Void) => {}
        },
        Statement::Switch {
            scrutinee,
            cases,
            default,
        } => {
            typecheck_condition(scrutinee, Type::Int, "switch", diagnostics);

            let mut seen = HashSet::new();
            for case in cases.iter_mut() {
                match &case.label {
                    Expression::IntLit { value, span } => {
                        if !seen.insert(*value) {
                            diagnostics.report(
                                *span,
                                SemanticError::InvalidCaseLabel(format!("duplicate case {value}")),
                            );
                        }
                    }
                    other => diagnostics.report(
                        other.span(),
                        SemanticError::InvalidCaseLabel(
                            "case label must be an integer literal".to_string(),
                        ),
                    ),
                }
                typecheck_statements(&mut case.body, return_type, diagnostics);
            }
            if let Some(default) = default {
                typecheck_statements(default, return_type, diagnostics);
            }
        }
        Statement::Block(block) => typecheck_block(block, return_type, diagnostics),
    }
}

fn typecheck_condition(
    condition: &Expression,
    expected: Type,
    construct: &str,
    diagnostics: &mut Diagnostics,
) {
    let found = typecheck_exp(condition, diagnostics);
    if !found.is_error() && found != expected {
        mismatch(
            diagnostics,
            condition,
            format!("{construct} condition must be {expected}, found {found}"),
        );
    }
}

/// Checks the callee and the actuals. Returns the callee's method type, or `Error`
/// when the callee is not a method.
fn typecheck_call(call: &Call, diagnostics: &mut Diagnostics) -> Type {
    let symbol = call.callee.resolved();
    let actual_types = call
        .args
        .iter()
        .map(|arg| typecheck_exp(arg, diagnostics))
        .collect::<Vec<_>>();

    let Some(info) = symbol.method.as_ref().filter(|_| symbol.type_.is_method()) else {
        diagnostics.report(
            call.callee.span,
            SemanticError::TypeMismatch(format!("{} is not a method", call.callee.name)),
        );
        return Type::Error;
    };

    if info.param_count != call.args.len() {
        diagnostics.report(
            call.callee.span,
            SemanticError::ArityMismatch {
                name: call.callee.name.clone(),
                expected: info.param_count,
                found: call.args.len(),
            },
        );
        return symbol.type_;
    }

    for (position, ((arg, found), expected)) in call
        .args
        .iter()
        .zip(actual_types)
        .zip(info.formal_types.iter().copied())
        .enumerate()
    {
        if !found.is_error() && found != expected {
            diagnostics.report(
                arg.span(),
                SemanticError::ArgumentTypeMismatch {
                    name: call.callee.name.clone(),
                    position: position + 1,
                    expected,
                    found,
                },
            );
        }
    }

    symbol.type_
}

/// Type of `exp`, reporting every inconsistency below it. `Error` never triggers
/// further reports.
fn typecheck_exp(exp: &Expression, diagnostics: &mut Diagnostics) -> Type {
    match exp {
        Expression::IntLit { .. } => Type::Int,
        Expression::StrLit { .. } => Type::String,
        Expression::True(_) | Expression::False(_) => Type::Boolean,
        Expression::Id(id) => id.resolved().type_,
        Expression::Call(call) => match typecheck_call(call, diagnostics) {
            Type::Error => Type::Error,
            method => method.call_result().unwrap_or_else(|| {
                mismatch(
                    diagnostics,
                    exp,
                    format!("void method {} used as a value", call.callee.name),
                );
                Type::Error
            }),
        },
        Expression::Unary(op, operand) => {
            let expected = match op {
                UnaryOperator::Negate => Type::Int,
                UnaryOperator::Not => Type::Boolean,
            };
            match typecheck_exp(operand, diagnostics) {
                Type::Error => Type::Error,
                found if found == expected => expected,
                found => {
                    mismatch(
                        diagnostics,
                        operand,
                        format!("operand of unary {op} must be {expected}, found {found}"),
                    );
                    Type::Error
                }
            }
        }
        Expression::Binary(op, left, right) => {
            let left_type = typecheck_exp(left, diagnostics);
            let right_type = typecheck_exp(right, diagnostics);
            let operands = [("left", &**left, left_type), ("right", &**right, right_type)];

            if op.is_arithmetic() {
                typecheck_operands(*op, operands, Type::Int, Type::Int, diagnostics)
            } else if op.is_logical() {
                typecheck_operands(*op, operands, Type::Boolean, Type::Boolean, diagnostics)
            } else if op.is_relational() {
                typecheck_operands(*op, operands, Type::Int, Type::Boolean, diagnostics)
            } else {
                typecheck_equality(*op, left, left_type, right_type, diagnostics)
            }
        }
    }
}

fn typecheck_operands(
    op: BinaryOperator,
    operands: [(&str, &Expression, Type); 2],
    expected: Type,
    result: Type,
    diagnostics: &mut Diagnostics,
) -> Type {
    let mut ok = true;
    for (side, exp, found) in operands {
        if found.is_error() {
            ok = false;
        } else if found != expected {
            mismatch(
                diagnostics,
                exp,
                format!("{side} operand of {op} must be {expected}, found {found}"),
            );
            ok = false;
        }
    }
    if ok { result } else { Type::Error }
}

fn typecheck_equality(
    op: BinaryOperator,
    left: &Expression,
    left_type: Type,
    right_type: Type,
    diagnostics: &mut Diagnostics,
) -> Type {
    debug_assert!(op.is_equality());
    if left_type.is_error() || right_type.is_error() {
        return Type::Error;
    }
    if left_type.is_method() || right_type.is_method() {
        mismatch(
            diagnostics,
            left,
            format!("{op} applied to a method name"),
        );
        return Type::Error;
    }
    if left_type == Type::Class || right_type == Type::Class {
        mismatch(
            diagnostics,
            left,
            format!("{op} applied to the class name"),
        );
        return Type::Error;
    }
    if left_type != right_type {
        mismatch(
            diagnostics,
            left,
            format!("{op} compares {left_type} with {right_type}"),
        );
        return Type::Error;
    }
    Type::Boolean
}
