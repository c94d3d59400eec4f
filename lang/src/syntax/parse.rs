use std::result::Result;

use lazy_static::lazy_static;
use pest::{
    error::Error as PestError,
    iterators::{Pair, Pairs},
    pratt_parser::{Assoc, Op, PrattParser},
    Parser,
};
use thiserror::Error;

use crate::syntax::tree::{
    Atom::*,
    BinOp,
    Expr::{self, *},
    Ident,
    Lit::{self, *},
    Program,
    ProgramItem::{self, *},
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
pub struct CapParser;

pub type ParseError = PestError<Rule>;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("SyntaxError: {0}")]
    Syntax(Box<ParseError>),

    #[error("UnsupportedConstructError: {construct} is not supported (line {line}, column {col})")]
    UnsupportedConstruct {
        construct: String,
        line: usize,
        col: usize,
    },

    #[error("SyntaxError: invalid literal '{text}' (line {line}, column {col})")]
    InvalidLiteral {
        text: String,
        line: usize,
        col: usize,
    },

    #[error("SyntaxError: duplicate argument '{name}' in function definition (line {line}, column {col})")]
    DuplicateParameter {
        name: Ident,
        line: usize,
        col: usize,
    },

    #[error("StructuralTransformError: {0}")]
    StructuralTransform(String),
}

lazy_static! {
    static ref PRATT: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::bool_or, Assoc::Left))
        .op(Op::infix(Rule::bool_and, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
        .op(Op::infix(Rule::cmp_op, Assoc::Left))
        .op(Op::infix(Rule::bit_or, Assoc::Left))
        .op(Op::infix(Rule::bit_xor, Assoc::Left))
        .op(Op::infix(Rule::bit_and, Assoc::Left))
        .op(Op::infix(Rule::shl, Assoc::Left) | Op::infix(Rule::shr, Assoc::Left))
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::sub, Assoc::Left))
        .op(Op::infix(Rule::mul, Assoc::Left)
            | Op::infix(Rule::matmul, Assoc::Left)
            | Op::infix(Rule::div, Assoc::Left)
            | Op::infix(Rule::floor_div, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
        .op(Op::prefix(Rule::neg_op) | Op::prefix(Rule::pos_op) | Op::prefix(Rule::invert_op))
        .op(Op::infix(Rule::pow, Assoc::Right));
}

impl CapParser {
    /// Parses a whole capability source into its statement sequence.
    pub fn ast(input: &str) -> Result<Program, CompileError> {
        let pairs = CapParser::parse(Rule::unit, input).map_err(syntax_error)?;
        parse_unit(pairs)
    }

    /// Parses a single expression, as found in persisted continuations
    /// and resume messages.
    pub fn expr(input: &str) -> Result<Expr, CompileError> {
        let mut pairs = CapParser::parse(Rule::single_expr, input).map_err(syntax_error)?;
        let node = pairs
            .next()
            .and_then(|single| single.into_inner().find(|p| p.as_rule() == Rule::expr));
        match node {
            Some(node) => parse_expr(node),
            None => unreachable!("single_expr always contains an expr"),
        }
    }
}

fn syntax_error(e: ParseError) -> CompileError {
    CompileError::Syntax(Box::new(e))
}

fn unsupported(node: &Pair<Rule>, construct: &str) -> CompileError {
    let (line, col) = node.as_span().start_pos().line_col();
    CompileError::UnsupportedConstruct {
        construct: construct.to_owned(),
        line,
        col,
    }
}

fn parse_unit(pairs: Pairs<Rule>) -> Result<Program, CompileError> {
    pairs
        .into_iter()
        .flat_map(|unit| unit.into_inner())
        .filter(|node| node.as_rule() != Rule::EOI)
        .map(parse_stmt)
        .collect()
}

fn parse_stmt(node: Pair<Rule>) -> Result<ProgramItem, CompileError> {
    match node.as_rule() {
        Rule::expr_stmt => {
            let expr = first_child(node);
            Ok(ExprItem(parse_expr(expr)?))
        }
        Rule::assign => {
            let mut iter = node.into_inner();
            let id = next_child(&mut iter).as_str().to_owned();
            let value = parse_expr(next_child(&mut iter))?;
            Ok(AssignItem(id, value))
        }
        Rule::aug_assign => Err(unsupported(&node, "augmented assignment")),
        Rule::keyword_stmt => {
            let keyword = first_child(node.clone());
            let construct = format!("`{}` statement", keyword.as_str());
            Err(unsupported(&node, construct.as_str()))
        }
        _ => unreachable!("rule should be a statement"),
    }
}

fn parse_expr(node: Pair<Rule>) -> Result<Expr, CompileError> {
    let child = first_child(node);
    match child.as_rule() {
        Rule::lambda => parse_lambda(child),
        Rule::binary => parse_binary(child),
        _ => unreachable!("expr inner should be lambda or binary"),
    }
}

fn parse_lambda(node: Pair<Rule>) -> Result<Expr, CompileError> {
    let mut iter = node
        .into_inner()
        .filter(|p| p.as_rule() != Rule::lambda_kw);
    let mut params: Vec<Ident> = Vec::new();
    match iter.next() {
        Some(ids) => {
            for id in ids.into_inner() {
                if params.iter().any(|p| p == id.as_str()) {
                    let (line, col) = id.as_span().start_pos().line_col();
                    return Err(CompileError::DuplicateParameter {
                        name: id.as_str().to_owned(),
                        line,
                        col,
                    });
                }
                params.push(id.as_str().to_owned());
            }
        }
        None => unreachable!("lambda without params"),
    }
    let body = match iter.next() {
        Some(body) => parse_expr(body)?,
        None => unreachable!("lambda without body"),
    };
    Ok(Expr::lambda(params, body))
}

fn parse_binary(node: Pair<Rule>) -> Result<Expr, CompileError> {
    signed_pow_base(&node)?;
    PRATT
        .map_primary(parse_operand)
        .map_prefix(|op, operand| {
            let construct = match op.as_rule() {
                Rule::not_op => "`not` operator",
                Rule::neg_op => "unary `-`",
                Rule::pos_op => "unary `+`",
                Rule::invert_op => "unary `~`",
                _ => unreachable!("not a prefix operator"),
            };
            operand.and_then(|_| Err(unsupported(&op, construct)))
        })
        .map_infix(|lhs, op, rhs| {
            let op = binary_op(&op)?;
            Ok(Expr::binary(op, lhs?, rhs?))
        })
        .parse(node.into_inner())
}

// `-2 ** 2` is -(2 ** 2) in Python, which the literal `-2` cannot express
fn signed_pow_base(node: &Pair<Rule>) -> Result<(), CompileError> {
    let mut prev: Option<Pair<Rule>> = None;
    for pair in node.clone().into_inner() {
        if pair.as_rule() == Rule::pow {
            if let Some(base) = prev.filter(|p| p.as_rule() == Rule::operand && p.as_str().starts_with('-')) {
                return Err(unsupported(&base, "signed literal as the base of `**`"));
            }
        }
        prev = Some(pair);
    }
    Ok(())
}

fn binary_op(op: &Pair<Rule>) -> Result<BinOp, CompileError> {
    match op.as_rule() {
        Rule::add => Ok(BinOp::Add),
        Rule::sub => Ok(BinOp::Sub),
        Rule::mul => Ok(BinOp::Mul),
        Rule::div => Ok(BinOp::Div),
        Rule::floor_div => Ok(BinOp::FloorDiv),
        Rule::modulo => Ok(BinOp::Mod),
        Rule::pow => Ok(BinOp::Pow),
        Rule::shl => Ok(BinOp::Shl),
        Rule::shr => Ok(BinOp::Shr),
        Rule::bit_and => Ok(BinOp::BitAnd),
        Rule::bit_or => Ok(BinOp::BitOr),
        Rule::bit_xor => Ok(BinOp::BitXor),
        Rule::matmul => Err(unsupported(op, "`@` operator")),
        Rule::cmp_op => Err(unsupported(op, "comparison")),
        Rule::bool_and | Rule::bool_or => Err(unsupported(op, "boolean operator")),
        _ => unreachable!("not an infix operator"),
    }
}

fn parse_operand(node: Pair<Rule>) -> Result<Expr, CompileError> {
    let mut iter = node.into_inner();
    let primary = parse_primary(next_child(&mut iter))?;
    iter.fold(Ok(primary), |lhs, postfix| {
        let lhs = lhs?;
        match postfix.as_rule() {
            Rule::call_args => {
                let args = postfix
                    .into_inner()
                    .map(parse_arg)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ApplyExpr(Box::new(lhs), args))
            }
            Rule::attribute => Err(unsupported(&postfix, "attribute access")),
            Rule::subscript => Err(unsupported(&postfix, "subscript")),
            _ => unreachable!("not a postfix"),
        }
    })
}

fn parse_arg(node: Pair<Rule>) -> Result<Expr, CompileError> {
    match node.as_rule() {
        Rule::expr => parse_expr(node),
        Rule::keyword_arg => Err(unsupported(&node, "keyword argument")),
        Rule::starred_arg => Err(unsupported(&node, "starred argument")),
        _ => unreachable!("not an argument"),
    }
}

fn parse_primary(node: Pair<Rule>) -> Result<Expr, CompileError> {
    match node.as_rule() {
        Rule::id => Ok(AtomExpr(AtomId(node.as_str().to_owned()))),
        Rule::list => {
            let items = node
                .into_inner()
                .map(parse_expr)
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AtomExpr(AtomList(items)))
        }
        Rule::paren => parse_paren(node),
        Rule::dict => Err(unsupported(&node, "dict or set display")),
        _ => parse_lit(node).map(Expr::lit),
    }
}

fn parse_paren(node: Pair<Rule>) -> Result<Expr, CompileError> {
    let children: Vec<Pair<Rule>> = node.clone().into_inner().collect();
    match children.as_slice() {
        [single] if single.as_rule() == Rule::expr => parse_expr(single.clone()),
        _ => Err(unsupported(&node, "tuple")),
    }
}

fn parse_lit(lit: Pair<Rule>) -> Result<Lit, CompileError> {
    match lit.as_rule() {
        Rule::none_lit => Ok(LitNone),
        Rule::bool_lit => Ok(LitBool(lit.as_str() == "True")),
        Rule::int_lit => lit
            .as_str()
            .parse::<i64>()
            .map(LitInt)
            .map_err(|_| invalid_literal(&lit)),
        Rule::float_lit => lit
            .as_str()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(LitFloat)
            .ok_or_else(|| invalid_literal(&lit)),
        Rule::string_lit => {
            let inner = first_child(lit);
            Ok(LitString(unescaped(inner.as_str())))
        }
        _ => unreachable!("unsupported literal type: {:?}", lit.as_rule()),
    }
}

fn invalid_literal(lit: &Pair<Rule>) -> CompileError {
    let (line, col) = lit.as_span().start_pos().line_col();
    CompileError::InvalidLiteral {
        text: lit.as_str().to_owned(),
        line,
        col,
    }
}

fn first_child(node: Pair<Rule>) -> Pair<Rule> {
    next_child(&mut node.into_inner())
}

fn next_child<'i>(iter: &mut Pairs<'i, Rule>) -> Pair<'i, Rule> {
    match iter.next() {
        Some(child) => child,
        None => unreachable!("grammar guarantees a child node"),
    }
}

fn unescaped(input: &str) -> String {
    let mut str = String::with_capacity(input.len());
    let mut escape = false;
    for ch in input.chars() {
        if escape {
            escape = false;
            str.push(unescaped_char(ch));
        } else {
            match ch {
                '\\' => escape = true,
                _ => str.push(ch),
            }
        }
    }
    str
}

fn unescaped_char(ch: char) -> char {
    match ch {
        't' => '\t',
        'n' => '\n',
        'r' => '\r',
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'v' => '\u{0B}',
        '0' => '\0',
        '\'' => '\'',
        '\"' => '\"',
        '\\' => '\\',
        _ => ch,
    }
}
