use crate::{
    capability::{record::SerializationError, CapabilityDefinition, Host, Outcome},
    runtime::RuntimeError,
    syntax::{desugar::Desugar, parse::CapParser, parse::CompileError, tree::Expr},
};
use thiserror::Error;

extern crate pest;
#[macro_use]
extern crate pest_derive;

pub mod capability;
pub mod codegen;
pub mod ffi;
pub mod runtime;
pub mod syntax;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

pub struct Compiler;

impl Compiler {
    /// Parses a capability and rewrites it into continuation-passing form.
    pub fn compile(input: &str) -> Result<Expr, CompileError> {
        CapParser::ast(input).and_then(Desugar::run)
    }
}

/// Compiles `source` and runs it until it suspends or completes.
pub fn execute(source: &str, host: &Host) -> Result<Outcome, Error> {
    CapabilityDefinition::compile(source)?.execute(host)
}
