use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Bool,
    Text,
    /// Type of the `null` literal before it meets a target type.
    Null,
    Record(String),
    List(Box<Type>),
    Nullable(Box<Type>),
    Function(FunctionType),
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

impl Type {
    pub fn record(name: impl Into<String>) -> Self {
        Type::Record(name.into())
    }

    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function(FunctionType {
            params,
            ret: Box::new(ret),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// Reference types already admit `null` without lifting.
    pub fn is_reference(&self) -> bool {
        match self {
            Type::Text | Type::Null | Type::Record(_) | Type::List(_) | Type::Function(_) => true,
            Type::Int | Type::Bool | Type::Nullable(_) | Type::Error => false,
        }
    }

    pub fn admits_null(&self) -> bool {
        self.is_reference() || matches!(self, Type::Nullable(_) | Type::Error)
    }

    /// Result type of a member reached through `?.`.
    pub fn lift_nullable(self) -> Type {
        match self {
            Type::Int | Type::Bool => Type::Nullable(Box::new(self)),
            other => other,
        }
    }

    /// Receiver type seen inside the when-not-null branch of `?.`.
    pub fn strip_nullable(&self) -> Type {
        match self {
            Type::Nullable(inner) => (**inner).clone(),
            other => other.clone(),
        }
    }

    pub fn is_assignable_from(&self, source: &Type) -> bool {
        if self.is_error() || source.is_error() || self == source {
            return true;
        }
        match (self, source) {
            (target, Type::Null) => target.admits_null(),
            (Type::Nullable(inner), source) => inner.is_assignable_from(source),
            (Type::List(target), Type::List(source)) => {
                matches!(**source, Type::Null) || target.is_assignable_from(source)
            }
            (Type::Function(target), Type::Function(source)) => {
                target.params.len() == source.params.len()
                    && target
                        .params
                        .iter()
                        .zip(&source.params)
                        .all(|(t, s)| s.is_assignable_from(t))
                    && target.ret.is_assignable_from(&source.ret)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Bool => write!(f, "Bool"),
            Type::Text => write!(f, "Text"),
            Type::Null => write!(f, "null"),
            Type::Record(name) => write!(f, "{name}"),
            Type::List(elem) => write!(f, "List<{elem}>"),
            Type::Nullable(inner) => write!(f, "{inner}?"),
            Type::Function(func) => {
                write!(f, "(")?;
                for (idx, param) in func.params.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {}", func.ret)
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}
