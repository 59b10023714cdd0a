//! Tree builders and logger setup shared by the unit tests.

use crate::ast::{
    Block, ClassBody, Declaration, Expression, Id, MethodDecl, Program, ReturnType, Statement,
    TypeNode, VarDecl,
};
use std::sync::Once;

static INIT: Once = Once::new();

pub(crate) fn init_logger() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
            .is_test(true)
            .try_init()
            .ok();
    });
}

pub(crate) fn program(decls: Vec<Declaration>) -> Program {
    Program {
        name: Id::new("Test"),
        body: ClassBody { decls },
    }
}

pub(crate) fn field(type_: TypeNode, name: &str) -> Declaration {
    Declaration::Field(VarDecl::new(type_, name))
}

pub(crate) fn method(
    name: &str,
    return_type: ReturnType,
    formals: Vec<VarDecl>,
    body: Block,
) -> Declaration {
    Declaration::Method(MethodDecl {
        name: Id::new(name),
        return_type,
        formals,
        body,
    })
}

pub(crate) fn main_method(body: Block) -> Declaration {
    method("main", ReturnType::Void, vec![], body)
}

pub(crate) fn block(decls: Vec<VarDecl>, stmts: Vec<Statement>) -> Block {
    Block { decls, stmts }
}

pub(crate) fn int_var(name: &str) -> VarDecl {
    VarDecl::new(TypeNode::Int, name)
}

pub(crate) fn bool_var(name: &str) -> VarDecl {
    VarDecl::new(TypeNode::Boolean, name)
}

pub(crate) fn string_var(name: &str) -> VarDecl {
    VarDecl::new(TypeNode::String, name)
}

pub(crate) fn truth() -> Expression {
    Expression::True(Default::default())
}

pub(crate) fn falsity() -> Expression {
    Expression::False(Default::default())
}

/// The method declaration named `name`.
pub(crate) fn find_method<'a>(program: &'a Program, name: &str) -> &'a MethodDecl {
    program
        .body
        .decls
        .iter()
        .find_map(|decl| match decl {
            Declaration::Method(m) if m.name.name == name => Some(m),
            _ => None,
        })
        .unwrap_or_else(|| panic!("no method {name}"))
}
