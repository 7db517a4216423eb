mod ast;
mod desugar;
pub mod factory;
mod lower;
mod placeholder;

pub use ast::*;
pub use desugar::{desugar_with, is_canonical_with};
pub use lower::lower;
pub use placeholder::{contains_placeholder, replace_placeholders, splice_pipe_argument, PipeTarget};

#[cfg(test)]
mod tests;
