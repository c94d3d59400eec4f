//! Stable textual notation for expression trees.
//!
//! The output is accepted by [`CapParser`](crate::syntax::parse::CapParser)
//! and printing a re-parsed tree gives back the same text. Binary expressions
//! are always parenthesized and lambdas are parenthesized wherever their body
//! would otherwise swallow the surrounding expression.

use crate::{
    codegen::PartialCodeGenerator,
    syntax::tree::{
        Atom::{self, AtomId, AtomLambda, AtomList, AtomLit},
        BinOp,
        Expr::{self, ApplyExpr, AtomExpr, BinaryExpr},
        Ident, Lit,
        Lit::{LitBool, LitFloat, LitInt, LitNone, LitString},
        ProgramItem::{self, AssignItem, ExprItem},
    },
};

pub struct TextCodeGenerator;

impl TextCodeGenerator {
    pub fn new() -> TextCodeGenerator {
        TextCodeGenerator {}
    }
}

impl Default for TextCodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialCodeGenerator for TextCodeGenerator {
    type Output = String;

    fn partial_codegen_item(&self, item: &ProgramItem) -> String {
        item.codegen_to_text()
    }

    fn partial_codegen_expr(&self, expr: &Expr) -> String {
        expr.codegen_to_text()
    }

    fn partial_codegen_atom(&self, atom: &Atom) -> String {
        atom.codegen_to_text()
    }

    fn partial_codegen_lit(&self, lit: &Lit) -> String {
        lit.codegen_to_text()
    }
}

trait TargetText {
    fn codegen_to_text(&self) -> String;
}

impl<T: TargetText> TargetText for Vec<T> {
    fn codegen_to_text(&self) -> String {
        self.iter()
            .map(|t| t.codegen_to_text())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl TargetText for ProgramItem {
    fn codegen_to_text(&self) -> String {
        match self {
            ExprItem(expr) => expr.codegen_to_text(),
            AssignItem(name, expr) => format!("{} = {}", name, expr.codegen_to_text()),
        }
    }
}

impl TargetText for Lit {
    fn codegen_to_text(&self) -> String {
        match self {
            LitNone => "None".to_owned(),
            LitBool(true) => "True".to_owned(),
            LitBool(false) => "False".to_owned(),
            LitInt(v) => v.to_string(),
            // Debug keeps a '.' or an exponent, so the text reads back as a float
            LitFloat(v) => format!("{:?}", v),
            LitString(v) => escaped(v),
        }
    }
}

impl TargetText for Atom {
    fn codegen_to_text(&self) -> String {
        match self {
            AtomLit(lit) => lit.codegen_to_text(),
            AtomId(id) => id.clone(),
            AtomList(items) => format!("[{}]", items.codegen_to_text()),
            AtomLambda(params, body) => codegen_lambda(params, body),
        }
    }
}

impl TargetText for Expr {
    fn codegen_to_text(&self) -> String {
        match self {
            AtomExpr(atom) => atom.codegen_to_text(),
            BinaryExpr(op, lhs, rhs) => {
                let mut base = codegen_operand(lhs);
                // a signed literal may not be the bare base of `**`
                if *op == BinOp::Pow && base.starts_with('-') {
                    base = format!("({})", base);
                }
                format!("({} {} {})", base, op.symbol(), codegen_operand(rhs))
            }
            ApplyExpr(f, args) => format!("{}({})", codegen_operand(f), args.codegen_to_text()),
        }
    }
}

fn codegen_operand(expr: &Expr) -> String {
    match expr {
        AtomExpr(AtomLambda(_, _)) => format!("({})", expr.codegen_to_text()),
        _ => expr.codegen_to_text(),
    }
}

fn codegen_lambda(params: &[Ident], body: &Expr) -> String {
    match params.len() {
        0 => format!("lambda: {}", body.codegen_to_text()),
        _ => format!("lambda {}: {}", params.join(", "), body.codegen_to_text()),
    }
}

fn escaped(input: &str) -> String {
    let mut str = String::with_capacity(input.len() + 2);
    str.push('"');
    for ch in input.chars() {
        match ch {
            '\t' => str.push_str("\\t"),
            '\n' => str.push_str("\\n"),
            '\r' => str.push_str("\\r"),
            '\u{07}' => str.push_str("\\a"),
            '\u{08}' => str.push_str("\\b"),
            '\u{0C}' => str.push_str("\\f"),
            '\u{0B}' => str.push_str("\\v"),
            '\0' => str.push_str("\\0"),
            '"' => str.push_str("\\\""),
            '\\' => str.push_str("\\\\"),
            _ => str.push(ch),
        }
    }
    str.push('"');
    str
}
