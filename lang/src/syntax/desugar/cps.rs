use tracing::debug;

use crate::{
    codegen::{text::TextCodeGenerator, PartialCodeGenerator},
    syntax::{
        parse::CompileError,
        tree::{
            Expr,
            Expr::ApplyExpr,
            Program, ProgramItem,
            ProgramItem::{AssignItem, ExprItem},
            COMPLETE, DISCARD,
        },
    },
};

/// Right-to-left reduction of a statement sequence.
///
/// The last two statements `p` and `u` are merged into `p(.., lambda x: u)`
/// where `x` is the name `p` assigns, or `_` when its result is discarded.
/// This repeats until one call remains. `p` must be a call, otherwise the
/// sequence is not a call-chain and the transform fails.
pub fn transform(mut items: Program) -> Result<Expr, CompileError> {
    let statements = items.len();
    items.push(ExprItem(Expr::apply(Expr::id(COMPLETE), vec![])));

    while items.len() > 1 {
        let ultimate = match pop(&mut items) {
            ExprItem(expr) => expr,
            AssignItem(_, _) => unreachable!("the last statement is `complete()` or a merged call"),
        };
        let penultimate = pop(&mut items);
        let merged = merge(items.len(), penultimate, ultimate)?;
        items.push(ExprItem(merged));
    }

    debug!(statements, "cps transformed statement sequence");

    match pop(&mut items) {
        ExprItem(expr) => Ok(expr),
        AssignItem(_, _) => unreachable!("the terminal statement is always a call"),
    }
}

fn pop(items: &mut Program) -> ProgramItem {
    match items.pop() {
        Some(item) => item,
        None => unreachable!("reduction keeps at least one statement"),
    }
}

fn merge(index: usize, penultimate: ProgramItem, body: Expr) -> Result<Expr, CompileError> {
    let (param, call) = match penultimate {
        ExprItem(expr) => (DISCARD.to_owned(), expr),
        AssignItem(name, expr) => (name, expr),
    };

    match call {
        ApplyExpr(f, mut args) => {
            args.push(Expr::lambda(vec![param], body));
            Ok(ApplyExpr(f, args))
        }
        other => Err(CompileError::StructuralTransform(format!(
            "statement {} is not a call: {}",
            index + 1,
            TextCodeGenerator::new().partial_codegen_expr(&other)
        ))),
    }
}
