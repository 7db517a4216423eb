use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::runtime::{RuntimeError, Value};
use crate::syntax::{ExprRef, Param};
use crate::types::{FunctionType, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LocalId(pub u32);

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalKind {
    User,
    Parameter,
    /// Holds the left operand of a pipe.
    PlaceholderReceiver,
    /// Holds the receiver of a desugared with-expression.
    WithReceiver,
    /// Holds the non-null receiver inside `?.`.
    ConditionalReceiver,
}

/// A local whose type is fixed when the symbol is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalSymbol {
    pub id: LocalId,
    pub name: String,
    pub kind: LocalKind,
    pub ty: Type,
}

pub type LocalRef = Arc<LocalSymbol>;

impl LocalSymbol {
    pub fn new(id: LocalId, name: impl Into<String>, kind: LocalKind, ty: Type) -> LocalRef {
        Arc::new(Self {
            id,
            name: name.into(),
            kind,
            ty,
        })
    }
}

/// Id source for one top-level bind (or lower-then-bind) run.
#[derive(Debug, Default)]
pub struct IdGen {
    locals: u32,
    receivers: u32,
    pipes: u32,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_local(&mut self) -> LocalId {
        let id = LocalId(self.locals);
        self.locals += 1;
        id
    }

    pub fn next_receiver(&mut self) -> u32 {
        let id = self.receivers;
        self.receivers += 1;
        id
    }

    pub fn next_pipe(&mut self) -> u32 {
        let id = self.pipes;
        self.pipes += 1;
        id
    }
}

pub type NativeFunc = dyn Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync;

#[derive(Clone)]
pub struct NativeFn(Arc<NativeFunc>);

impl NativeFn {
    pub fn new(
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(func))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, RuntimeError> {
        (self.0)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native>")
    }
}

#[derive(Debug, Clone)]
pub enum FunctionBody {
    Native(NativeFn),
    /// Bound lazily, the first time the function is called.
    Syntax(ExprRef),
}

#[derive(Debug, Clone)]
pub struct FunctionSymbol {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: FunctionBody,
}

impl FunctionSymbol {
    pub fn signature(&self) -> FunctionType {
        FunctionType {
            params: self.params.iter().map(|param| param.ty.clone()).collect(),
            ret: Box::new(self.ret.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordSymbol {
    pub name: String,
    pub fields: Vec<Param>,
    pub methods: Vec<FunctionSymbol>,
}

impl RecordSymbol {
    pub fn new(name: impl Into<String>, fields: Vec<(&str, Type)>) -> Self {
        Self {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| Param {
                    name: name.to_string(),
                    ty,
                })
                .collect(),
            methods: Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<(usize, &Param)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Method slots named `name`, in declaration order.
    pub fn methods_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (usize, &'a FunctionSymbol)> + 'a {
        self.methods
            .iter()
            .enumerate()
            .filter(move |(_, method)| method.name == name)
    }
}

/// Identifies one overload: a free function (`owner == None`) or a method.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FunctionRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub name: String,
    pub slot: usize,
    #[serde(skip)]
    pub signature: FunctionType,
}

/// Record types and free functions visible to a bind.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    records: HashMap<String, Arc<RecordSymbol>>,
    functions: HashMap<String, Vec<Arc<FunctionSymbol>>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_record(&mut self, record: RecordSymbol) {
        self.records.insert(record.name.clone(), Arc::new(record));
    }

    /// Adds an overload; existing overloads with the same name are kept.
    pub fn define_function(&mut self, function: FunctionSymbol) {
        self.functions
            .entry(function.name.clone())
            .or_default()
            .push(Arc::new(function));
    }

    pub fn define_native(
        &mut self,
        name: &str,
        params: Vec<Type>,
        ret: Type,
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + Send + Sync + 'static,
    ) {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(idx, ty)| Param {
                name: format!("arg{idx}"),
                ty,
            })
            .collect();
        self.define_function(FunctionSymbol {
            name: name.to_string(),
            params,
            ret,
            body: FunctionBody::Native(NativeFn::new(func)),
        });
    }

    pub fn record(&self, name: &str) -> Option<&Arc<RecordSymbol>> {
        self.records.get(name)
    }

    pub fn functions(&self, name: &str) -> &[Arc<FunctionSymbol>] {
        self.functions
            .get(name)
            .map(|overloads| overloads.as_slice())
            .unwrap_or(&[])
    }

    /// Overload references for the free function `name`.
    pub fn function_refs(&self, name: &str) -> Vec<FunctionRef> {
        self.functions(name)
            .iter()
            .enumerate()
            .map(|(slot, function)| FunctionRef {
                owner: None,
                name: name.to_string(),
                slot,
                signature: function.signature(),
            })
            .collect()
    }

    /// Overload references for the methods `name` of record `owner`.
    pub fn method_refs(&self, owner: &str, name: &str) -> Vec<FunctionRef> {
        let Some(record) = self.record(owner) else {
            return Vec::new();
        };
        record
            .methods_named(name)
            .map(|(slot, method)| FunctionRef {
                owner: Some(owner.to_string()),
                name: name.to_string(),
                slot,
                signature: method.signature(),
            })
            .collect()
    }

    pub fn resolve(&self, function: &FunctionRef) -> Option<&FunctionSymbol> {
        match &function.owner {
            None => self
                .functions(&function.name)
                .get(function.slot)
                .map(|function| function.as_ref()),
            Some(owner) => self.record(owner)?.methods.get(function.slot),
        }
    }
}
