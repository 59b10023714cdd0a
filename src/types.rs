//! Semantic types of the Simple language.

use derive_more::Display;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Display)]
pub enum Type {
    #[display("class")]
    Class,
    #[display("int")]
    Int,
    #[display("boolean")]
    Boolean,
    #[display("String")]
    String,
    #[display("method void")]
    MethodVoid,
    #[display("method int")]
    MethodInt,
    #[display("error")]
    Error,
    /// Pseudo-type of the marker left behind by a `return` with a value.
    #[display("return int")]
    ReturnInt,
}

impl Type {
    pub fn is_method(self) -> bool {
        matches!(self, Type::MethodVoid | Type::MethodInt)
    }

    pub fn is_error(self) -> bool {
        self == Type::Error
    }

    /// The type a call to a method of this type evaluates to.
    pub fn call_result(self) -> Option<Type> {
        match self {
            Type::MethodInt => Some(Type::Int),
            Type::MethodVoid => None,
            _ => None,
        }
    }
}
