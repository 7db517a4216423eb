use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::binder::{bind_function, bind_root_with_ids};
use crate::bound::BoundExpr;
use crate::diagnostics::{diagnostics_have_errors, Diagnostic};
use crate::runtime::{evaluate, Value};
use crate::symbols::{Environment, FunctionBody, FunctionSymbol, IdGen, RecordSymbol};
use crate::syntax::{lower, ExprRef, Param};
use crate::types::Type;
use crate::PipebindError;

/// A JSON program: record types, functions and the expression to bind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub records: Vec<RecordDecl>,
    #[serde(default)]
    pub functions: Vec<FunctionDecl>,
    pub expr: ExprRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    pub fields: Vec<Param>,
    #[serde(default)]
    pub methods: Vec<FunctionDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    pub ret: Type,
    pub body: ExprRef,
}

impl FunctionDecl {
    fn symbol(&self) -> FunctionSymbol {
        FunctionSymbol {
            name: self.name.clone(),
            params: self.params.clone(),
            ret: self.ret.clone(),
            body: FunctionBody::Syntax(self.body.clone()),
        }
    }
}

impl Program {
    pub fn environment(&self) -> Environment {
        let mut env = Environment::new();
        for record in &self.records {
            env.define_record(RecordSymbol {
                name: record.name.clone(),
                fields: record.fields.clone(),
                methods: record.methods.iter().map(FunctionDecl::symbol).collect(),
            });
        }
        for function in &self.functions {
            env.define_function(function.symbol());
        }
        env
    }

    /// Every body and the main expression with pipes and with-expressions
    /// lowered away.
    pub fn lowered(&self) -> Program {
        let mut ids = IdGen::new();
        let mut lower_decl = |decl: &FunctionDecl| FunctionDecl {
            body: lower(&decl.body, &mut ids),
            ..decl.clone()
        };
        let records = self
            .records
            .iter()
            .map(|record| RecordDecl {
                methods: record.methods.iter().map(&mut lower_decl).collect(),
                ..record.clone()
            })
            .collect();
        let functions = self.functions.iter().map(&mut lower_decl).collect();
        Program {
            records,
            functions,
            expr: lower(&self.expr, &mut ids),
        }
    }
}

pub fn load_program(path: &Path) -> Result<Program, PipebindError> {
    let text = fs::read_to_string(path)?;
    parse_program(&text)
}

pub fn parse_program(text: &str) -> Result<Program, PipebindError> {
    Ok(serde_json::from_str(text)?)
}

#[derive(Debug)]
pub struct BoundProgram {
    pub env: Environment,
    pub expr: BoundExpr,
    pub diagnostics: Vec<Diagnostic>,
}

impl BoundProgram {
    pub fn has_errors(&self) -> bool {
        diagnostics_have_errors(&self.diagnostics)
    }
}

/// Binds the main expression and checks every function and method body.
pub fn bind_program(program: &Program) -> BoundProgram {
    let env = program.environment();
    let mut diagnostics = Vec::new();
    for function in &program.functions {
        let (_, found) = bind_function(&env, None, &function.symbol(), &function.body);
        diagnostics.extend(found);
    }
    for record in &program.records {
        for method in &record.methods {
            let (_, found) =
                bind_function(&env, Some(&record.name), &method.symbol(), &method.body);
            diagnostics.extend(found);
        }
    }
    let (expr, found) = bind_root_with_ids(&env, &program.expr, IdGen::new());
    diagnostics.extend(found);
    debug!(
        records = program.records.len(),
        functions = program.functions.len(),
        diagnostics = diagnostics.len(),
        "bound program"
    );
    BoundProgram {
        env,
        expr,
        diagnostics,
    }
}

pub fn run_program(program: &Program) -> Result<Value, PipebindError> {
    let bound = bind_program(program);
    if bound.has_errors() {
        return Err(PipebindError::Diagnostics(bound.diagnostics));
    }
    Ok(evaluate(&bound.env, &bound.expr)?)
}
