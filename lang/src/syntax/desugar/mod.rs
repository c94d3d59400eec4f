use crate::syntax::{
    parse::CompileError,
    tree::{Expr, Program},
};

mod cps;

pub use cps::transform as cps_transform;

pub struct Desugar;

impl Desugar {
    /// Rewrites a parsed statement sequence into a single nested
    /// continuation call ending in `complete()`.
    pub fn run(input: Program) -> Result<Expr, CompileError> {
        cps_transform(input)
    }
}
