//! Name analysis.
//!
//! Binds every identifier to its declaration, assigns storage classes and frame
//! offsets, and reports duplicate declarations, undeclared identifiers, a missing
//! `main` and int methods without a `return` value. The whole tree is always
//! visited so one run reports every error.

use crate::ast::{
    Block, Call, Declaration, Expression, Id, MethodDecl, Program, ReturnType, Statement, VarDecl,
    count_locals,
};
use crate::context::CompilationContext;
use crate::diagnostics::{Diagnostics, SemanticError};
use crate::symbol_table::{DeclKind, MethodInfo, ScopeKind, ScopeStack};
use crate::types::Type;

pub fn analyse(program: &mut Program, ctx: &mut CompilationContext) {
    log::info!("Name analysis of class {}", program.name.name);

    let diagnostics = &mut ctx.diagnostics;
    let mut scopes = ScopeStack::new();

    scopes.with_scope(ScopeKind::Program, |scopes| {
        declare(
            &mut program.name,
            Type::Class,
            DeclKind::Class,
            None,
            scopes,
            diagnostics,
        );

        scopes.with_scope(ScopeKind::Class, |scopes| {
            for declaration in &mut program.body.decls {
                resolve_declaration(declaration, scopes, diagnostics);
            }
            check_entry_point(&program.name, scopes, diagnostics);
        });
    });
}

fn declare(
    id: &mut Id,
    type_: Type,
    kind: DeclKind,
    method: Option<MethodInfo>,
    scopes: &mut ScopeStack,
    diagnostics: &mut Diagnostics,
) {
    match scopes.declare(&id.name, type_, kind, method) {
        Ok(symbol) => {
            log::debug!("Declared {} as {} ({:?})", symbol.name, symbol.type_, symbol.storage);
            id.symbol = Some(symbol);
        }
        Err(e) => diagnostics.report(id.span, e),
    }
}

fn resolve_id(id: &mut Id, scopes: &ScopeStack, diagnostics: &mut Diagnostics) {
    match scopes.resolve(&id.name) {
        Ok(symbol) => id.symbol = Some(symbol),
        Err(e) => diagnostics.report(id.span, e),
    }
}

fn check_entry_point(class_name: &Id, scopes: &ScopeStack, diagnostics: &mut Diagnostics) {
    match scopes.resolve("main") {
        Ok(symbol) if symbol.type_ == Type::MethodVoid => {}
        _ => diagnostics.report(class_name.span, SemanticError::MissingEntryPoint),
    }
}

fn resolve_declaration(
    declaration: &mut Declaration,
    scopes: &mut ScopeStack,
    diagnostics: &mut Diagnostics,
) {
    match declaration {
        Declaration::Field(VarDecl { type_, name }) => {
            declare(
                name,
                (*type_).into(),
                DeclKind::Field,
                None,
                scopes,
                diagnostics,
            );
        }
        Declaration::Method(method) => resolve_method(method, scopes, diagnostics),
    }
}

fn resolve_method(method: &mut MethodDecl, scopes: &mut ScopeStack, diagnostics: &mut Diagnostics) {
    let MethodDecl {
        name,
        return_type,
        formals,
        body,
    } = method;

    // The signature and frame size must be known before the body is walked,
    // so recursive calls see a complete symbol.
    let info = MethodInfo::new(
        formals.iter().map(|formal| Type::from(formal.type_)).collect(),
        count_locals(body),
    );
    declare(
        name,
        return_type.method_type(),
        DeclKind::Method,
        Some(info),
        scopes,
        diagnostics,
    );

    scopes.with_scope(ScopeKind::Formals, |scopes| {
        for formal in formals.iter_mut() {
            declare(
                &mut formal.name,
                formal.type_.into(),
                DeclKind::Formal,
                None,
                scopes,
                diagnostics,
            );
        }

        let (_, body_scope) = scopes.with_scope(ScopeKind::MethodBody, |scopes| {
            resolve_block(body, scopes, diagnostics);
        });

        if *return_type == ReturnType::Int && !body_scope.has_return() {
            diagnostics.report(name.span, SemanticError::MissingReturn(name.name.clone()));
        }
    });
}

/// Declares the block's locals in the innermost scope and resolves its statements.
fn resolve_block(block: &mut Block, scopes: &mut ScopeStack, diagnostics: &mut Diagnostics) {
    for VarDecl { type_, name } in &mut block.decls {
        declare(
            name,
            (*type_).into(),
            DeclKind::Local,
            None,
            scopes,
            diagnostics,
        );
    }
    resolve_statements(&mut block.stmts, scopes, diagnostics);
}

fn resolve_statements(
    statements: &mut [Statement],
    scopes: &mut ScopeStack,
    diagnostics: &mut Diagnostics,
) {
    for statement in statements {
        resolve_statement(statement, scopes, diagnostics);
    }
}

fn resolve_statement(
    statement: &mut Statement,
    scopes: &mut ScopeStack,
    diagnostics: &mut Diagnostics,
) {
    match statement {
        Statement::Print { exp, .. } => resolve_exp(exp, scopes, diagnostics),
        Statement::Assign { target, value } => {
            resolve_id(target, scopes, diagnostics);
            resolve_exp(value, scopes, diagnostics);
        }
        Statement::If {
            condition,
            then_block,
        } => {
            resolve_exp(condition, scopes, diagnostics);
            resolve_statements(then_block, scopes, diagnostics);
        }
        Statement::IfElse {
            condition,
            then_block,
            else_block,
        } => {
            resolve_exp(condition, scopes, diagnostics);
            resolve_statements(then_block, scopes, diagnostics);
            resolve_statements(else_block, scopes, diagnostics);
        }
        Statement::While { condition, body } => {
            resolve_exp(condition, scopes, diagnostics);
            resolve_statements(body, scopes, diagnostics);
        }
        Statement::Call(call) => resolve_call(call, scopes, diagnostics),
        Statement::Return { value, .. } => {
            if let Some(value) = value {
                resolve_exp(value, scopes, diagnostics);
                scopes.mark_return();
            }
        }
        Statement::Switch {
            scrutinee,
            cases,
            default,
        } => {
            resolve_exp(scrutinee, scopes, diagnostics);
            for case in cases {
                resolve_exp(&mut case.label, scopes, diagnostics);
                resolve_statements(&mut case.body, scopes, diagnostics);
            }
            if let Some(default) = default {
                resolve_statements(default, scopes, diagnostics);
            }
        }
        Statement::Block(block) => {
            scopes.with_scope(ScopeKind::Block, |scopes| {
                resolve_block(block, scopes, diagnostics);
            });
        }
    }
}

fn resolve_call(call: &mut Call, scopes: &mut ScopeStack, diagnostics: &mut Diagnostics) {
    resolve_id(&mut call.callee, scopes, diagnostics);
    for arg in &mut call.args {
        resolve_exp(arg, scopes, diagnostics);
    }
}

fn resolve_exp(exp: &mut Expression, scopes: &mut ScopeStack, diagnostics: &mut Diagnostics) {
    match exp {
        Expression::IntLit { .. }
        | Expression::StrLit { .. }
        | Expression::True(_)
        | Expression::False(_) => {}
        Expression::Id(id) => resolve_id(id, scopes, diagnostics),
        Expression::Call(call) => resolve_call(call, scopes, diagnostics),
        Expression::Unary(_, exp) => resolve_exp(exp, scopes, diagnostics),
        Expression::Binary(_, left, right) => {
            resolve_exp(left, scopes, diagnostics);
            resolve_exp(right, scopes, diagnostics);
        }
    }
}
