use crate::syntax::tree::{Atom, Expr, Lit, Program, ProgramItem};

pub trait CodeGenerator {
    type Output;

    fn codegen(&self, input: &Program) -> Self::Output;
}

pub trait PartialCodeGenerator {
    type Output;

    fn partial_codegen_item(&self, _: &ProgramItem) -> Self::Output;

    fn partial_codegen_expr(&self, _: &Expr) -> Self::Output;

    fn partial_codegen_atom(&self, _: &Atom) -> Self::Output;

    fn partial_codegen_lit(&self, _: &Lit) -> Self::Output;
}

impl<T> CodeGenerator for T
where
    T: PartialCodeGenerator<Output = String>,
{
    type Output = String;

    fn codegen(&self, input: &Program) -> String {
        input
            .iter()
            .map(|item| self.partial_codegen_item(item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub mod text;
