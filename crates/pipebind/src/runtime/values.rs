use std::fmt;
use std::sync::Arc;

use crate::bound::BoundExpr;
use crate::symbols::{FunctionRef, LocalRef};

use super::environment::Env;

#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Record(Arc<RecordValue>),
    List(im::Vector<Value>),
    Function(Arc<FunctionValue>),
}

#[derive(Clone, PartialEq)]
pub struct RecordValue {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

pub enum FunctionValue {
    Closure {
        params: Vec<LocalRef>,
        body: Arc<BoundExpr>,
        env: Env,
    },
    Named(FunctionRef),
}

impl Value {
    pub fn text(value: &str) -> Self {
        Value::Text(value.to_string())
    }

    pub fn record(type_name: &str, fields: Vec<(&str, Value)>) -> Self {
        Value::Record(Arc::new(RecordValue {
            type_name: type_name.to_string(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(record) => record
                .fields
                .iter()
                .find(|(field, _)| field == name)
                .map(|(_, value)| value),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "Bool",
            Value::Int(_) => "Int",
            Value::Text(_) => "Text",
            Value::Record(record) => &record.type_name,
            Value::List(_) => "List",
            Value::Function(_) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => Arc::ptr_eq(a, b) || a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Text(value) => write!(f, "{value:?}"),
            Value::Record(record) => {
                write!(f, "{} {{", record.type_name)?;
                for (idx, (name, value)) in record.fields.iter().enumerate() {
                    let sep = if idx == 0 { " " } else { ", " };
                    write!(f, "{sep}{name}: {value}")?;
                }
                if record.fields.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
            Value::List(items) => {
                write!(f, "[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Function(func) => match func.as_ref() {
                FunctionValue::Closure { params, .. } => write!(f, "<lambda/{}>", params.len()),
                FunctionValue::Named(function) => match &function.owner {
                    Some(owner) => write!(f, "<function {owner}.{}>", function.name),
                    None => write!(f, "<function {}>", function.name),
                },
            },
        }
    }
}
