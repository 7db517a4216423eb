use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::binder::{bind_function, BoundFunction};
use crate::bound::{BoundExpr, BoundKind, BoundUpdate};
use crate::diagnostics::Span;
use crate::symbols::{Environment, FunctionBody, FunctionRef, FunctionSymbol, LocalRef};
use crate::syntax::{BinaryOp, ExprRef, Literal};

mod environment;
#[cfg(test)]
mod tests;
mod values;

pub use self::environment::Env;
pub use self::values::{FunctionValue, RecordValue, Value};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuntimeError {
    #[error("null reference")]
    NullReference,
    #[error("index {index} is out of range for a list of length {len}")]
    IndexOutOfRange { index: i64, len: usize },
    #[error("division by zero")]
    DivideByZero,
    #[error("reached an error node at {line}:{column}")]
    ErrorNode { line: usize, column: usize },
    #[error("local `{0}` has no value")]
    UnboundLocal(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("unknown record type `{0}`")]
    UnknownRecord(String),
    #[error("function `{0}` failed to bind")]
    InvalidBody(String),
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: String, found: String },
    #[error("{0}")]
    Native(String),
}

impl RuntimeError {
    fn error_node(span: Span) -> Self {
        RuntimeError::ErrorNode {
            line: span.start.line,
            column: span.start.column,
        }
    }

    fn mismatch(expected: &str, found: &Value) -> Self {
        RuntimeError::Mismatch {
            expected: expected.to_string(),
            found: found.type_name().to_string(),
        }
    }
}

/// Evaluates `expr` against the functions and records of `env`.
pub fn evaluate(env: &Environment, expr: &BoundExpr) -> Result<Value, RuntimeError> {
    Interpreter::new(env).eval(expr, &Env::new(None))
}

/// Tree-walking evaluator for bound expressions.
pub struct Interpreter<'env> {
    env: &'env Environment,
    bodies: Mutex<HashMap<FunctionRef, Arc<BoundFunction>>>,
}

impl<'env> Interpreter<'env> {
    pub fn new(env: &'env Environment) -> Self {
        Self {
            env,
            bodies: Mutex::new(HashMap::new()),
        }
    }

    pub fn eval(&self, expr: &BoundExpr, scope: &Env) -> Result<Value, RuntimeError> {
        match &expr.kind {
            BoundKind::Literal { value } => Ok(literal_value(value)),
            BoundKind::Local { local } => scope
                .get(local.id)
                .ok_or_else(|| RuntimeError::UnboundLocal(local.name.clone())),
            BoundKind::List { items } => {
                let mut values = im::Vector::new();
                for item in items {
                    values.push_back(self.eval(item, scope)?);
                }
                Ok(Value::List(values))
            }
            BoundKind::FieldAccess {
                receiver, index, ..
            } => {
                let receiver = self.eval(receiver, scope)?;
                read_field(&receiver, *index)
            }
            BoundKind::ElementAccess { receiver, index } => {
                let receiver = self.eval(receiver, scope)?;
                let index = self.eval(index, scope)?;
                read_element(&receiver, &index)
            }
            BoundKind::ConditionalAccess {
                receiver,
                local,
                when_not_null,
            } => {
                let receiver = self.eval(receiver, scope)?;
                if receiver.is_null() {
                    return Ok(Value::Null);
                }
                let inner = scope.child();
                inner.set(local.id, receiver);
                self.eval(when_not_null, &inner)
            }
            BoundKind::MethodGroup { name, .. } => Err(RuntimeError::Mismatch {
                expected: "value".to_string(),
                found: format!("method group `{name}`"),
            }),
            BoundKind::FunctionValue { function } => {
                Ok(Value::Function(Arc::new(FunctionValue::Named(function.clone()))))
            }
            BoundKind::Call {
                function,
                receiver,
                args,
            } => {
                let receiver = match receiver {
                    Some(receiver) => {
                        let value = self.eval(receiver, scope)?;
                        if value.is_null() {
                            return Err(RuntimeError::NullReference);
                        }
                        Some(value)
                    }
                    None => None,
                };
                let args = self.eval_all(args, scope)?;
                self.call(function, receiver, args)
            }
            BoundKind::Invoke { callee, args } => {
                let callee = self.eval(callee, scope)?;
                let args = self.eval_all(args, scope)?;
                self.apply(&callee, args)
            }
            BoundKind::ObjectCreation { record, args } => {
                let symbol = self
                    .env
                    .record(record)
                    .ok_or_else(|| RuntimeError::UnknownRecord(record.clone()))?;
                let args = self.eval_all(args, scope)?;
                Ok(Value::Record(Arc::new(RecordValue {
                    type_name: record.clone(),
                    fields: symbol
                        .fields
                        .iter()
                        .map(|field| field.name.clone())
                        .zip(args)
                        .collect(),
                })))
            }
            BoundKind::Binary { op, left, right } => {
                let left = self.eval(left, scope)?;
                let right = self.eval(right, scope)?;
                eval_binary(*op, left, right)
            }
            BoundKind::Lambda { params, body } => {
                Ok(Value::Function(Arc::new(FunctionValue::Closure {
                    params: params.clone(),
                    body: body.clone(),
                    env: scope.clone(),
                })))
            }
            BoundKind::Assignment { local, value } => {
                let value = self.eval(value, scope)?;
                scope.set(local.id, value.clone());
                Ok(value)
            }
            BoundKind::Sequence {
                side_effects,
                value,
                ..
            } => {
                let inner = scope.child();
                for effect in side_effects {
                    self.eval(effect, &inner)?;
                }
                self.eval(value, &inner)
            }
            BoundKind::RecordUpdate { receiver, updates } => {
                let receiver = self.eval(receiver, scope)?;
                self.apply_updates(receiver, updates, scope)
            }
            BoundKind::Error { .. } => Err(RuntimeError::error_node(expr.span)),
        }
    }

    fn eval_all(&self, exprs: &[BoundExpr], scope: &Env) -> Result<Vec<Value>, RuntimeError> {
        exprs.iter().map(|expr| self.eval(expr, scope)).collect()
    }

    fn apply_updates(
        &self,
        receiver: Value,
        updates: &[BoundUpdate],
        scope: &Env,
    ) -> Result<Value, RuntimeError> {
        match receiver {
            Value::Null => Err(RuntimeError::NullReference),
            Value::Record(record) => {
                let mut record = record.as_ref().clone();
                for update in updates {
                    let BoundUpdate::Field { index, value, .. } = update else {
                        return Err(RuntimeError::Mismatch {
                            expected: "list".to_string(),
                            found: record.type_name,
                        });
                    };
                    let value = self.eval(value, scope)?;
                    let len = record.fields.len();
                    let slot = record
                        .fields
                        .get_mut(*index)
                        .ok_or(RuntimeError::IndexOutOfRange {
                            index: *index as i64,
                            len,
                        })?;
                    slot.1 = value;
                }
                Ok(Value::Record(Arc::new(record)))
            }
            Value::List(mut items) => {
                for update in updates {
                    let BoundUpdate::Element { index, value } = update else {
                        return Err(RuntimeError::mismatch("record", &Value::List(items)));
                    };
                    let index = self.eval(index, scope)?;
                    let value = self.eval(value, scope)?;
                    let position = list_position(&index, items.len())?;
                    items = items.update(position, value);
                }
                Ok(Value::List(items))
            }
            other => Err(RuntimeError::mismatch("record or list", &other)),
        }
    }

    /// Calls a value of function type.
    pub fn apply(&self, callee: &Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let Value::Function(function) = callee else {
            if callee.is_null() {
                return Err(RuntimeError::NullReference);
            }
            return Err(RuntimeError::mismatch("function", callee));
        };
        match function.as_ref() {
            FunctionValue::Closure { params, body, env } => {
                let frame = env.child();
                bind_arguments(&frame, params, args);
                self.eval(body, &frame)
            }
            FunctionValue::Named(function) => self.call(function, None, args),
        }
    }

    fn call(
        &self,
        function: &FunctionRef,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<Value, RuntimeError> {
        let symbol = self
            .env
            .resolve(function)
            .ok_or_else(|| RuntimeError::UnknownFunction(function.name.clone()))?;
        trace!(function = %function.name, args = args.len(), "call");
        let args: Vec<Value> = receiver.into_iter().chain(args).collect();
        match &symbol.body {
            FunctionBody::Native(native) => native.call(&args),
            FunctionBody::Syntax(body) => {
                let bound = self.bound_body(function, symbol, body)?;
                let frame = Env::new(None);
                bind_arguments(&frame, &bound.params, args);
                self.eval(&bound.body, &frame)
            }
        }
    }

    fn bound_body(
        &self,
        function: &FunctionRef,
        symbol: &FunctionSymbol,
        body: &ExprRef,
    ) -> Result<Arc<BoundFunction>, RuntimeError> {
        if let Ok(bodies) = self.bodies.lock() {
            if let Some(bound) = bodies.get(function) {
                return Ok(bound.clone());
            }
        }
        let (bound, diagnostics) =
            bind_function(self.env, function.owner.as_deref(), symbol, body);
        if !diagnostics.is_empty() {
            return Err(RuntimeError::InvalidBody(function.name.clone()));
        }
        let bound = Arc::new(bound);
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.insert(function.clone(), bound.clone());
        }
        Ok(bound)
    }
}

fn bind_arguments(frame: &Env, params: &[LocalRef], args: Vec<Value>) {
    for (param, arg) in params.iter().zip(args) {
        frame.set(param.id, arg);
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Null => Value::Null,
        Literal::Bool(value) => Value::Bool(*value),
        Literal::Int(value) => Value::Int(*value),
        Literal::Text(value) => Value::Text(value.clone()),
    }
}

fn read_field(receiver: &Value, index: usize) -> Result<Value, RuntimeError> {
    match receiver {
        Value::Record(record) => record
            .fields
            .get(index)
            .map(|(_, value)| value.clone())
            .ok_or(RuntimeError::IndexOutOfRange {
                index: index as i64,
                len: record.fields.len(),
            }),
        Value::Null => Err(RuntimeError::NullReference),
        other => Err(RuntimeError::mismatch("record", other)),
    }
}

fn read_element(receiver: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match receiver {
        Value::List(items) => {
            let position = list_position(index, items.len())?;
            Ok(items[position].clone())
        }
        Value::Null => Err(RuntimeError::NullReference),
        other => Err(RuntimeError::mismatch("list", other)),
    }
}

fn list_position(index: &Value, len: usize) -> Result<usize, RuntimeError> {
    let index = match index {
        Value::Int(index) => *index,
        Value::Null => return Err(RuntimeError::NullReference),
        other => return Err(RuntimeError::mismatch("Int", other)),
    };
    usize::try_from(index)
        .ok()
        .filter(|position| *position < len)
        .ok_or(RuntimeError::IndexOutOfRange { index, len })
}

fn eval_binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Equals => return Ok(Value::Bool(left == right)),
        BinaryOp::NotEquals => return Ok(Value::Bool(left != right)),
        BinaryOp::Pipe => {
            return Err(RuntimeError::Mismatch {
                expected: "bound pipe".to_string(),
                found: "raw `|>` operator".to_string(),
            })
        }
        _ => {}
    }
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => match op {
            BinaryOp::LessThan | BinaryOp::GreaterThan => Ok(Value::Bool(false)),
            _ => Ok(Value::Null),
        },
        (Value::Int(a), Value::Int(b)) => int_binary(op, a, b),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::BitwiseAnd => Ok(Value::Bool(a & b)),
            BinaryOp::BitwiseOr => Ok(Value::Bool(a | b)),
            BinaryOp::ExclusiveOr => Ok(Value::Bool(a ^ b)),
            _ => Err(RuntimeError::mismatch("Int", &Value::Bool(a))),
        },
        (Value::Text(a), Value::Text(b)) if op == BinaryOp::Add => Ok(Value::Text(a + &b)),
        (left, _) => Err(RuntimeError::mismatch("Int", &left)),
    }
}

fn int_binary(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeError> {
    let value = match op {
        BinaryOp::Add => Value::Int(a.wrapping_add(b)),
        BinaryOp::Subtract => Value::Int(a.wrapping_sub(b)),
        BinaryOp::Multiply => Value::Int(a.wrapping_mul(b)),
        BinaryOp::Divide => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Value::Int(a.wrapping_div(b))
        }
        BinaryOp::Modulo => {
            if b == 0 {
                return Err(RuntimeError::DivideByZero);
            }
            Value::Int(a.wrapping_rem(b))
        }
        BinaryOp::LeftShift => Value::Int(a.wrapping_shl(b as u32)),
        BinaryOp::RightShift => Value::Int(a.wrapping_shr(b as u32)),
        BinaryOp::BitwiseAnd => Value::Int(a & b),
        BinaryOp::BitwiseOr => Value::Int(a | b),
        BinaryOp::ExclusiveOr => Value::Int(a ^ b),
        BinaryOp::LessThan => Value::Bool(a < b),
        BinaryOp::GreaterThan => Value::Bool(a > b),
        BinaryOp::Equals | BinaryOp::NotEquals | BinaryOp::Pipe => {
            unreachable!("handled before operand dispatch")
        }
    };
    Ok(value)
}
