use lang::{
    capability::{CapabilityDefinition, CapabilityExecutionState, Host, Outcome},
    codegen::{text::TextCodeGenerator, PartialCodeGenerator},
    runtime::Value::{self, FloatValue, IntValue, ListValue, NoneValue, StringValue},
    syntax::{
        parse::CapParser,
        tree::{Atom, BinOp, Expr, Lit},
    },
};
use proptest::prelude::*;

fn message() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(NoneValue),
        any::<i64>().prop_map(IntValue),
        (-1.0e12f64..1.0e12).prop_map(FloatValue),
        ".{0,12}".prop_map(StringValue),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(ListValue)
    })
}

fn ident() -> impl Strategy<Value = String> {
    "v[a-z0-9_]{0,4}"
}

fn lit() -> impl Strategy<Value = Lit> {
    prop_oneof![
        Just(Lit::LitNone),
        any::<bool>().prop_map(Lit::LitBool),
        any::<i64>().prop_map(Lit::LitInt),
        (-1.0e20f64..1.0e20).prop_map(Lit::LitFloat),
        "[a-zA-Z0-9 '\"\\\\\n\t]{0,8}".prop_map(Lit::LitString),
    ]
}

fn bin_op() -> impl Strategy<Value = BinOp> {
    prop_oneof![
        Just(BinOp::Add),
        Just(BinOp::Sub),
        Just(BinOp::Mul),
        Just(BinOp::Div),
        Just(BinOp::FloorDiv),
        Just(BinOp::Mod),
        Just(BinOp::Pow),
        Just(BinOp::Shl),
        Just(BinOp::Shr),
        Just(BinOp::BitAnd),
        Just(BinOp::BitOr),
        Just(BinOp::BitXor),
    ]
}

fn expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![lit().prop_map(Expr::lit), ident().prop_map(Expr::id)];
    leaf.prop_recursive(4, 32, 3, |inner| {
        prop_oneof![
            (bin_op(), inner.clone(), inner.clone()).prop_map(|(op, l, r)| Expr::binary(op, l, r)),
            (inner.clone(), prop::collection::vec(inner.clone(), 0..3))
                .prop_map(|(f, args)| Expr::apply(f, args)),
            (prop::collection::btree_set(ident(), 0..3), inner.clone())
                .prop_map(|(params, body)| Expr::lambda(params.into_iter().collect(), body)),
            prop::collection::vec(inner, 0..3).prop_map(|items| Expr::AtomExpr(Atom::AtomList(items))),
        ]
    })
}

fn print(expr: &Expr) -> String {
    TextCodeGenerator::new().partial_codegen_expr(expr)
}

fn suspended(outcome: Outcome) -> CapabilityExecutionState {
    match outcome {
        Outcome::Suspended(state) => state,
        Outcome::Complete(value) => panic!("completed with {}", value),
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn prop_reprinting_is_identity(tree in expr()) {
        let text = print(&tree);
        let reparsed = CapParser::expr(text.as_str()).unwrap();
        prop_assert_eq!(print(&reparsed), text);
        prop_assert_eq!(reparsed, tree);
    }

    #[test]
    fn prop_resume_after_persistence_matches_live(first in message(), second in message()) {
        let host = Host::default();
        let definition = CapabilityDefinition::compile(
            "a = receive('any')\nb = receive('any')\ncomplete([a, b])",
        ).unwrap();

        let initial = suspended(definition.execute(&host).unwrap());
        let reloaded = CapabilityExecutionState::load(initial.persist().unwrap().as_str()).unwrap();

        let live = suspended(initial.resume(&host, first.clone()).unwrap());
        let thawed = suspended(reloaded.resume(&host, first.clone()).unwrap());
        prop_assert_eq!(live.persist().unwrap(), thawed.persist().unwrap());

        let thawed = CapabilityExecutionState::load(thawed.persist().unwrap().as_str()).unwrap();
        let expected = ListValue(vec![first, second.clone()]);
        match (live.resume(&host, second.clone()).unwrap(), thawed.resume(&host, second).unwrap()) {
            (Outcome::Complete(lhs), Outcome::Complete(rhs)) => {
                prop_assert_eq!(&lhs, &expected);
                prop_assert_eq!(&rhs, &expected);
            }
            other => panic!("expected both runs to complete, got {:?}", other),
        }
    }

    #[test]
    fn prop_cps_text_is_stable(calls in prop::collection::vec((ident(), prop::option::of(ident())), 1..6)) {
        let source = calls
            .iter()
            .map(|(callee, bound)| match bound {
                Some(name) => format!("{} = {}()", name, callee),
                None => format!("{}()", callee),
            })
            .collect::<Vec<_>>()
            .join("\n");
        let definition = CapabilityDefinition::compile(source.as_str()).unwrap();
        let text = definition.cps_text();
        let reparsed = CapParser::expr(text.as_str()).unwrap();
        prop_assert_eq!(print(&reparsed), text);
        prop_assert_eq!(&reparsed, definition.cps());
    }
}

#[test]
fn test_nested_lambda_text() {
    let tree = Expr::apply(
        Expr::lambda(vec!["x".into()], Expr::lambda(vec![], Expr::id("x"))),
        vec![Expr::lit(Lit::LitInt(-1))],
    );
    assert_eq!(print(&tree), "(lambda x: lambda: x)(-1)");
    assert_eq!(CapParser::expr(print(&tree).as_str()).unwrap(), tree);
}
