use std::{collections::BTreeSet, rc::Rc};

pub type Ident = String;

/// Parameter name bound by a continuation whose incoming value is discarded.
pub const DISCARD: &str = "_";

/// Name of the native that terminates every transformed program.
pub const COMPLETE: &str = "complete";

#[derive(Debug, PartialEq, PartialOrd, Clone)]
pub enum Lit {
    LitNone,
    LitBool(bool),
    LitInt(i64),
    LitFloat(f64),
    LitString(String),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Atom {
    AtomLit(Lit),
    AtomId(Ident),
    AtomList(Vec<Expr>),
    // params, body
    AtomLambda(Vec<Ident>, Rc<Expr>),
}

#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    AtomExpr(Atom),
    BinaryExpr(BinOp, Box<Expr>, Box<Expr>),
    ApplyExpr(Box<Expr>, Vec<Expr>),
}

#[derive(Debug, PartialEq, Clone)]
pub enum ProgramItem {
    ExprItem(Expr),
    // name = call(...)
    AssignItem(Ident, Expr),
}

pub type Program = Vec<ProgramItem>;

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
        }
    }
}

impl Expr {
    pub fn lit(lit: Lit) -> Expr {
        Expr::AtomExpr(Atom::AtomLit(lit))
    }

    pub fn id<S: Into<Ident>>(name: S) -> Expr {
        Expr::AtomExpr(Atom::AtomId(name.into()))
    }

    pub fn lambda(params: Vec<Ident>, body: Expr) -> Expr {
        Expr::AtomExpr(Atom::AtomLambda(params, Rc::new(body)))
    }

    pub fn apply(f: Expr, args: Vec<Expr>) -> Expr {
        Expr::ApplyExpr(Box::new(f), args)
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::BinaryExpr(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn is_apply(&self) -> bool {
        matches!(self, Expr::ApplyExpr(_, _))
    }

    /// Names read by this expression that no enclosing lambda inside it binds.
    pub fn free_names(&self) -> BTreeSet<Ident> {
        let mut free = BTreeSet::new();
        self.collect_free(&mut Vec::new(), &mut free);
        free
    }

    fn collect_free<'a>(&'a self, bound: &mut Vec<&'a str>, free: &mut BTreeSet<Ident>) {
        match self {
            Expr::AtomExpr(Atom::AtomLit(_)) => (),
            Expr::AtomExpr(Atom::AtomId(name)) => {
                if !bound.contains(&name.as_str()) {
                    free.insert(name.clone());
                }
            }
            Expr::AtomExpr(Atom::AtomList(items)) => {
                items.iter().for_each(|item| item.collect_free(bound, free))
            }
            Expr::AtomExpr(Atom::AtomLambda(params, body)) => {
                let mark = bound.len();
                bound.extend(params.iter().map(String::as_str));
                body.collect_free(bound, free);
                bound.truncate(mark);
            }
            Expr::BinaryExpr(_, lhs, rhs) => {
                lhs.collect_free(bound, free);
                rhs.collect_free(bound, free);
            }
            Expr::ApplyExpr(f, args) => {
                f.collect_free(bound, free);
                args.iter().for_each(|arg| arg.collect_free(bound, free));
            }
        }
    }
}
