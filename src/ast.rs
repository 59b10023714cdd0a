//! AST for the Simple language
//!
//! ASDL:
//!   program = Program(identifier name, class_body)
//!   class_body = ClassBody(declaration* decls)
//!   declaration = Field(var_decl) | Method(method_decl)
//!   var_decl = VarDecl(type, identifier)
//!   method_decl = MethodDecl(identifier, return_type, var_decl* formals, block body)
//!   block = Block(var_decl* decls, statement* stmts)
//!   type = Int | Boolean | String
//!   return_type = Void | Int
//!   statement = Print(exp)
//!             | Assign(identifier, exp)
//!             | If(exp, statement*)
//!             | IfElse(exp, statement*, statement*)
//!             | While(exp, statement*)
//!             | Call(call)
//!             | Return(exp?)
//!             | Switch(exp, case*, statement*?)
//!             | Block(block)
//!   case = Case(exp label, statement* body)
//!   call = Call(identifier callee, exp* args)
//!   exp = IntLit(int) | StrLit(string) | True | False | Id(identifier)
//!       | Call(call)
//!       | Unary(unary_operator, exp)
//!       | Binary(binary_operator, exp, exp)
//!   unary_operator = Negate | Not
//!   binary_operator = Add | Subtract | Multiply | Divide | Power | And | Or
//!                   | Equal | NotEqual | LessThan | GreaterThan | LessOrEqual | GreaterOrEqual
//!
//! Trees are built by an external parser. Name analysis attaches a symbol to every
//! identifier, and type checking records the operand type of every `print`; nothing
//! else changes after parsing.

use crate::symbol_table::Symbol;
use crate::types::Type;
use derive_more::Display;
use std::rc::Rc;

/// Source position, 1-based. `0:0` means unknown.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Display)]
#[display("{line}:{column}")]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn new(line: usize, column: usize) -> Self {
        Span { line, column }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Id {
    pub name: String,
    pub span: Span,
    pub(crate) symbol: Option<Rc<Symbol>>,
}

impl Id {
    pub fn new(name: impl Into<String>) -> Self {
        Id::at(name, Span::default())
    }

    pub fn at(name: impl Into<String>, span: Span) -> Self {
        Id {
            name: name.into(),
            span,
            symbol: None,
        }
    }

    /// The declaration this identifier was bound to by name analysis.
    pub fn symbol(&self) -> Option<&Symbol> {
        self.symbol.as_deref()
    }

    /// Like [`Id::symbol`], for passes that run only on a fully resolved tree.
    pub(crate) fn resolved(&self) -> &Symbol {
        self.symbol.as_deref().unwrap_or_else(|| {
            panic!(
                "identifier `{}` at {} was not resolved by name analysis",
                self.name, self.span
            )
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Program {
    pub name: Id,
    pub body: ClassBody,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct ClassBody {
    pub decls: Vec<Declaration>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Declaration {
    Field(VarDecl),
    Method(MethodDecl),
}

/// A typed name: a field, a formal parameter or a local variable.
#[derive(Debug, PartialEq, Clone)]
pub struct VarDecl {
    pub type_: TypeNode,
    pub name: Id,
}

impl VarDecl {
    pub fn new(type_: TypeNode, name: impl Into<String>) -> Self {
        VarDecl {
            type_,
            name: Id::new(name),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct MethodDecl {
    pub name: Id,
    pub return_type: ReturnType,
    pub formals: Vec<VarDecl>,
    pub body: Block,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum TypeNode {
    #[display("int")]
    Int,
    #[display("boolean")]
    Boolean,
    #[display("String")]
    String,
}

impl From<TypeNode> for Type {
    fn from(node: TypeNode) -> Self {
        match node {
            TypeNode::Int => Type::Int,
            TypeNode::Boolean => Type::Boolean,
            TypeNode::String => Type::String,
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum ReturnType {
    #[display("void")]
    Void,
    #[display("int")]
    Int,
}

impl ReturnType {
    pub fn method_type(self) -> Type {
        match self {
            ReturnType::Void => Type::MethodVoid,
            ReturnType::Int => Type::MethodInt,
        }
    }
}

/// Declarations followed by statements. Used for method bodies and nested blocks.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Block {
    pub decls: Vec<VarDecl>,
    pub stmts: Vec<Statement>,
}

/// How a `print` statement converts its operand, as decided by the type checker.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PrintKind {
    Int,
    String,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Statement {
    Print {
        exp: Expression,
        kind: Option<PrintKind>,
    },
    Assign {
        target: Id,
        value: Expression,
    },
    If {
        condition: Expression,
        then_block: Vec<Statement>,
    },
    IfElse {
        condition: Expression,
        then_block: Vec<Statement>,
        else_block: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Call(Call),
    Return {
        value: Option<Expression>,
        span: Span,
    },
    Switch {
        scrutinee: Expression,
        cases: Vec<Case>,
        default: Option<Vec<Statement>>,
    },
    Block(Block),
}

impl Statement {
    pub fn print(exp: Expression) -> Self {
        Statement::Print { exp, kind: None }
    }

    pub fn assign(target: impl Into<String>, value: Expression) -> Self {
        Statement::Assign {
            target: Id::new(target),
            value,
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Statement::Call(Call::new(callee, args))
    }

    pub fn return_value(value: Expression) -> Self {
        Statement::Return {
            value: Some(value),
            span: Span::default(),
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Case {
    pub label: Expression,
    pub body: Vec<Statement>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Call {
    pub callee: Id,
    pub args: Vec<Expression>,
}

impl Call {
    pub fn new(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Call {
            callee: Id::new(callee),
            args,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expression {
    IntLit {
        value: i32,
        span: Span,
    },
    /// `value` is the literal's text between the quotes, escapes left as written.
    StrLit {
        value: String,
        span: Span,
    },
    True(Span),
    False(Span),
    Id(Id),
    Call(Call),
    Unary(UnaryOperator, Box<Expression>),
    Binary(BinaryOperator, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn int(value: i32) -> Self {
        Expression::IntLit {
            value,
            span: Span::default(),
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::StrLit {
            value: value.into(),
            span: Span::default(),
        }
    }

    pub fn var(name: impl Into<String>) -> Self {
        Expression::Id(Id::new(name))
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call(Call::new(callee, args))
    }

    pub fn unary(op: UnaryOperator, exp: Expression) -> Self {
        Expression::Unary(op, Box::new(exp))
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::Binary(op, Box::new(left), Box::new(right))
    }

    /// Position of the leftmost token of the expression.
    pub fn span(&self) -> Span {
        match self {
            Expression::IntLit { span, .. }
            | Expression::StrLit { span, .. }
            | Expression::True(span)
            | Expression::False(span) => *span,
            Expression::Id(id) => id.span,
            Expression::Call(call) => call.callee.span,
            Expression::Unary(_, exp) => exp.span(),
            Expression::Binary(_, left, _) => left.span(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum UnaryOperator {
    #[display("-")]
    Negate,
    #[display("!")]
    Not,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Display)]
pub enum BinaryOperator {
    #[display("+")]
    Add,
    #[display("-")]
    Subtract,
    #[display("*")]
    Multiply,
    #[display("/")]
    Divide,
    #[display("**")]
    Power,
    #[display("&&")]
    And,
    #[display("||")]
    Or,
    #[display("==")]
    Equal,
    #[display("!=")]
    NotEqual,
    #[display("<")]
    LessThan,
    #[display(">")]
    GreaterThan,
    #[display("<=")]
    LessOrEqual,
    #[display(">=")]
    GreaterOrEqual,
}

impl BinaryOperator {
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
                | BinaryOperator::Power
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            BinaryOperator::LessThan
                | BinaryOperator::GreaterThan
                | BinaryOperator::LessOrEqual
                | BinaryOperator::GreaterOrEqual
        )
    }

    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOperator::Equal | BinaryOperator::NotEqual)
    }
}

/// Count of the local variable declarations of a block, nested blocks included.
pub(crate) fn count_locals(block: &Block) -> usize {
    block.decls.len() + block.stmts.iter().map(count_statement_locals).sum::<usize>()
}

fn count_statement_locals(statement: &Statement) -> usize {
    match statement {
        Statement::Block(block) => count_locals(block),
        Statement::If { then_block, .. } => then_block.iter().map(count_statement_locals).sum(),
        Statement::IfElse {
            then_block,
            else_block,
            ..
        } => then_block
            .iter()
            .chain(else_block.iter())
            .map(count_statement_locals)
            .sum(),
        Statement::While { body, .. } => body.iter().map(count_statement_locals).sum(),
        Statement::Switch { cases, default, .. } => cases
            .iter()
            .flat_map(|case| case.body.iter())
            .chain(default.iter().flatten())
            .map(count_statement_locals)
            .sum(),
        Statement::Print { .. }
        | Statement::Assign { .. }
        | Statement::Call(_)
        | Statement::Return { .. } => 0,
    }
}
