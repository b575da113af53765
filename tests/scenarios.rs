//! End-to-end checking sessions driven through the command façade.

use redukti::error::{EnvError, ReduceError, TypingError};
use redukti::{
    Arg, Command, Config, Env, Error, Output, Pattern, RTerm, Staticity, Symbol, Target, Term,
    Test, Untyped,
};
use std::rc::Rc;

fn var(n: usize) -> RTerm {
    RTerm::new(Term::BVar(n))
}

fn sym(env: &mut Env, s: &str) -> RTerm {
    RTerm::new(Term::Symb(env.symbols_mut().intern(s)))
}

fn arrow(a: RTerm, b: RTerm) -> RTerm {
    RTerm::new(Term::Prod(Arg::new("_", a), b))
}

fn lam(dom: Option<RTerm>, body: RTerm) -> RTerm {
    RTerm::new(Term::Abst(Arg::new("x", dom), body))
}

fn decl(env: &mut Env, name: &str, staticity: Staticity, ty: RTerm) {
    let name = env.symbols_mut().intern(name);
    env.handle(Command::Decl(name, staticity, ty)).unwrap();
}

fn ctx_var(name: &str, ty: RTerm) -> (Rc<str>, Option<RTerm>) {
    (Rc::from(name), Some(ty))
}

fn head(env: &mut Env, s: &str) -> Symbol {
    env.symbols_mut().intern(s)
}

fn eval(env: &mut Env, target: Target, tm: RTerm) -> RTerm {
    let cfg = Config {
        target,
        ..Config::default()
    };
    match env.handle(Command::Eval(cfg, tm)) {
        Ok(Some(Output::Evaled(tm))) => tm,
        res => panic!("expected evaluation result, got {:?}", res.map(|_| ())),
    }
}

/// id x ⟶ x fires on every argument.
#[test]
fn identity_rule() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    let a_ty = sym(&mut env, "A");
    decl(&mut env, "a", Staticity::Static, a_ty.clone());
    decl(
        &mut env,
        "id",
        Staticity::Definable,
        arrow(a_ty.clone(), a_ty.clone()),
    );

    let id = head(&mut env, "id");
    let rule = Untyped {
        ctx: vec![ctx_var("x", a_ty)],
        lhs: Pattern::Symb(id, vec![Pattern::MVar(0, vec![])]),
        rhs: var(0),
    };
    env.handle(Command::Rules(vec![rule])).unwrap();

    let a = sym(&mut env, "a");
    let t = sym(&mut env, "id").apply(vec![a.clone()]);
    assert_eq!(eval(&mut env, Target::Whnf, t), a);
}

fn church(env: &mut Env) {
    let ty = RTerm::new(Term::Type);
    decl(env, "Nat", Staticity::Static, ty);
    let nat = sym(env, "Nat");
    decl(env, "z", Staticity::Static, nat.clone());
    decl(env, "s", Staticity::Static, arrow(nat.clone(), nat.clone()));
    decl(
        env,
        "plus",
        Staticity::Definable,
        arrow(nat.clone(), arrow(nat.clone(), nat.clone())),
    );

    let plus = head(env, "plus");
    let z = head(env, "z");
    let s = head(env, "s");
    // plus z m ⟶ m
    let r1 = Untyped {
        ctx: vec![ctx_var("m", nat.clone())],
        lhs: Pattern::Symb(
            plus.clone(),
            vec![Pattern::Symb(z, vec![]), Pattern::MVar(0, vec![])],
        ),
        rhs: var(0),
    };
    // plus (s n) m ⟶ s (plus n m)
    let r2 = Untyped {
        ctx: vec![ctx_var("n", nat.clone()), ctx_var("m", nat)],
        lhs: Pattern::Symb(
            plus.clone(),
            vec![
                Pattern::Symb(s.clone(), vec![Pattern::MVar(0, vec![])]),
                Pattern::MVar(1, vec![]),
            ],
        ),
        rhs: RTerm::new(Term::Symb(s)).apply(vec![RTerm::new(Term::Symb(plus))
            .apply(vec![var(0), var(1)])]),
    };
    env.handle(Command::Rules(vec![r1, r2])).unwrap();
}

fn numeral(env: &mut Env, n: usize) -> RTerm {
    let mut t = sym(env, "z");
    for _ in 0..n {
        t = sym(env, "s").apply(vec![t]);
    }
    t
}

/// plus (s (s z)) (s z) normalises to s (s (s z)).
#[test]
fn church_numerals() {
    let mut env = Env::new();
    church(&mut env);
    let t = sym(&mut env, "plus").apply(vec![numeral(&mut env, 2), numeral(&mut env, 1)]);
    let three = numeral(&mut env, 3);
    assert_eq!(eval(&mut env, Target::Snf, t), three);
}

/// The step budget limits how far a term is normalised.
#[test]
fn bounded_reduction() {
    let mut env = Env::new();
    church(&mut env);
    let t = sym(&mut env, "plus").apply(vec![numeral(&mut env, 2), numeral(&mut env, 1)]);
    let three = numeral(&mut env, 3);

    let partial = t.clone().nsteps(env.signature(), 0).unwrap();
    assert_eq!(partial, t);
    // three gamma steps fully normalise the sum
    assert_eq!(t.nsteps(env.signature(), 3).unwrap(), three);
}

/// A nonlinear rule fires only when both occurrences agree.
#[test]
fn nonlinear_rule() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    decl(&mut env, "Bool", Staticity::Static, ty);
    let a_ty = sym(&mut env, "A");
    let bool_ty = sym(&mut env, "Bool");
    decl(&mut env, "T", Staticity::Static, bool_ty.clone());
    decl(&mut env, "a", Staticity::Static, a_ty.clone());
    decl(&mut env, "b", Staticity::Static, a_ty.clone());
    decl(
        &mut env,
        "eq",
        Staticity::Definable,
        arrow(a_ty.clone(), arrow(a_ty.clone(), bool_ty)),
    );

    let eq = head(&mut env, "eq");
    let rule = Untyped {
        ctx: vec![ctx_var("x", a_ty)],
        lhs: Pattern::Symb(eq, vec![Pattern::MVar(0, vec![]), Pattern::MVar(0, vec![])]),
        rhs: sym(&mut env, "T"),
    };
    env.handle(Command::Rules(vec![rule])).unwrap();

    let a = sym(&mut env, "a");
    let b = sym(&mut env, "b");
    let t_sym = sym(&mut env, "T");

    let same = sym(&mut env, "eq").apply(vec![a.clone(), a.clone()]);
    assert_eq!(eval(&mut env, Target::Whnf, same), t_sym);

    let diff = sym(&mut env, "eq").apply(vec![a, b]);
    assert_eq!(eval(&mut env, Target::Whnf, diff.clone()), diff);
}

/// A higher-order rule duplicates its bound argument.
#[test]
fn miller_pattern_rule() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    decl(&mut env, "B", Staticity::Static, ty);
    let a_ty = sym(&mut env, "A");
    let b_ty = sym(&mut env, "B");
    decl(
        &mut env,
        "g",
        Staticity::Static,
        arrow(a_ty.clone(), arrow(a_ty.clone(), b_ty.clone())),
    );
    decl(&mut env, "c", Staticity::Static, a_ty.clone());
    decl(
        &mut env,
        "apply",
        Staticity::Definable,
        arrow(
            arrow(a_ty.clone(), b_ty.clone()),
            arrow(a_ty.clone(), b_ty.clone()),
        ),
    );

    let apply = head(&mut env, "apply");
    // apply (λ x. F x) X ⟶ F X
    let rule = Untyped {
        ctx: vec![
            ctx_var("F", arrow(a_ty.clone(), b_ty)),
            ctx_var("X", a_ty),
        ],
        lhs: Pattern::Symb(
            apply,
            vec![
                Pattern::Abst(Box::new(Pattern::MVar(0, vec![0]))),
                Pattern::MVar(1, vec![]),
            ],
        ),
        rhs: var(0).apply(vec![var(1)]),
    };
    env.handle(Command::Rules(vec![rule])).unwrap();

    // apply (λ x. g x x) c ⟶ g c c
    let g = sym(&mut env, "g");
    let c = sym(&mut env, "c");
    let fun = lam(Some(sym(&mut env, "A")), g.clone().apply(vec![var(0), var(0)]));
    let t = sym(&mut env, "apply").apply(vec![fun, c.clone()]);
    assert_eq!(
        eval(&mut env, Target::Snf, t),
        g.apply(vec![c.clone(), c])
    );
}

/// A bracket guard aborts reduction when violated.
#[test]
fn bracket_guard() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty);
    let a_ty = sym(&mut env, "A");
    decl(&mut env, "a", Staticity::Static, a_ty.clone());
    decl(&mut env, "b", Staticity::Static, a_ty.clone());
    decl(
        &mut env,
        "f",
        Staticity::Definable,
        arrow(a_ty.clone(), arrow(a_ty.clone(), a_ty.clone())),
    );

    let f = head(&mut env, "f");
    // f x {x} ⟶ x
    let rule = Untyped {
        ctx: vec![ctx_var("x", a_ty)],
        lhs: Pattern::Symb(
            f,
            vec![Pattern::MVar(0, vec![]), Pattern::Bracket(var(0))],
        ),
        rhs: var(0),
    };
    env.handle(Command::Rules(vec![rule])).unwrap();

    let a = sym(&mut env, "a");
    let b = sym(&mut env, "b");

    let good = sym(&mut env, "f").apply(vec![a.clone(), a.clone()]);
    assert_eq!(eval(&mut env, Target::Whnf, good), a.clone());

    let bad = sym(&mut env, "f").apply(vec![a, b]);
    let cfg = Config::default();
    match env.handle(Command::Eval(cfg, bad)) {
        Err(Error::Reduce(ReduceError::GuardNotSatisfied(_))) => (),
        res => panic!("expected a guard failure, got {:?}", res.map(|_| ())),
    }
}

/// Checking λ x : A. x against B → B pinpoints the conflict.
#[test]
fn conversion_error() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    decl(&mut env, "B", Staticity::Static, ty);
    let a_ty = sym(&mut env, "A");
    let b_ty = sym(&mut env, "B");

    let id_a = lam(Some(a_ty), var(0));
    let arr_b = arrow(b_ty.clone(), b_ty);

    match env.handle(Command::Check {
        assert: false,
        neg: false,
        test: Test::HasType(id_a.clone(), arr_b.clone()),
    }) {
        Ok(Some(Output::Checked(false))) => (),
        res => panic!("expected a failed check, got {:?}", res.map(|_| ())),
    }

    // checking the judgement directly exposes the conflict
    use redukti::typing::LCtx;
    match id_a.check(env.signature(), &mut LCtx::new(), arr_b.clone()) {
        Err(Error::Typing(TypingError::Unconvertible(c))) => {
            assert_eq!(c.expected, sym(&mut env, "B"));
            assert_eq!(c.inferred, sym(&mut env, "A"));
            assert!(c.ctx.is_empty());
        }
        res => panic!("expected a conversion conflict, got {:?}", res),
    }

    // under a binder, the conflict reports the types in scope
    let a_ty = sym(&mut env, "A");
    let b_ty = sym(&mut env, "B");
    let nested = lam(Some(b_ty.clone()), lam(Some(a_ty), var(0)));
    let nested_ty = arrow(b_ty.clone(), arr_b);
    match nested.check(env.signature(), &mut LCtx::new(), nested_ty) {
        Err(Error::Typing(TypingError::Unconvertible(c))) => {
            assert_eq!(c.ctx.len(), 1);
            assert_eq!(c.ctx.get(0), Some(&b_ty));
        }
        res => panic!("expected a conversion conflict, got {:?}", res),
    }
}

/// Definitions unfold, opaque definitions do not.
#[test]
fn definitions_unfold() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    let a_ty = sym(&mut env, "A");
    decl(&mut env, "a", Staticity::Static, a_ty.clone());

    let d = env.symbols_mut().intern("d");
    let a = sym(&mut env, "a");
    env.handle(Command::Def {
        name: d,
        opaque: false,
        ty: Some(a_ty.clone()),
        tm: a.clone(),
    })
    .unwrap();

    let o = env.symbols_mut().intern("o");
    env.handle(Command::Def {
        name: o,
        opaque: true,
        ty: Some(a_ty.clone()),
        tm: a.clone(),
    })
    .unwrap();

    let d_tm = sym(&mut env, "d");
    let o_tm = sym(&mut env, "o");
    assert_eq!(eval(&mut env, Target::Whnf, d_tm), a.clone());
    assert_eq!(eval(&mut env, Target::Whnf, o_tm.clone()), o_tm.clone());

    // opaque definitions are still convertible by type, not by body
    match env.handle(Command::Check {
        assert: false,
        neg: false,
        test: Test::Convert(o_tm, a),
    }) {
        Ok(Some(Output::Checked(false))) => (),
        res => panic!("expected inconvertible, got {:?}", res.map(|_| ())),
    }

    // defining at the level of Kind is rejected
    let k = env.symbols_mut().intern("k");
    match env.handle(Command::Def {
        name: k,
        opaque: false,
        ty: None,
        tm: RTerm::new(Term::Type),
    }) {
        Err(Error::Typing(TypingError::KindLevelDefinition)) => (),
        res => panic!("expected a Kind-level rejection, got {:?}", res.map(|_| ())),
    }
}

/// Assertions fail the entry stream; plain checks only report.
#[test]
fn assertions() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    decl(&mut env, "B", Staticity::Static, ty);
    let a_ty = sym(&mut env, "A");
    let b_ty = sym(&mut env, "B");

    match env.handle(Command::Check {
        assert: true,
        neg: true,
        test: Test::Convert(a_ty.clone(), b_ty.clone()),
    }) {
        Ok(Some(Output::Checked(true))) => (),
        res => panic!("expected a negated success, got {:?}", res.map(|_| ())),
    }

    match env.handle(Command::Check {
        assert: true,
        neg: false,
        test: Test::Convert(a_ty, b_ty),
    }) {
        Err(Error::Env(EnvError::AssertionFailed)) => (),
        res => panic!("expected an assertion failure, got {:?}", res.map(|_| ())),
    }
}

/// Reduction commutes with convertibility, and judgements survive
/// signature extension.
#[test]
fn reduction_properties() {
    let mut env = Env::new();
    church(&mut env);
    let sig = env.signature().clone();

    let terms = [
        sym(&mut env, "plus").apply(vec![numeral(&mut env, 1), numeral(&mut env, 2)]),
        lam(None, var(0)).apply(vec![numeral(&mut env, 1)]),
        numeral(&mut env, 4),
    ];
    for t in &terms {
        // whnf and snf preserve convertibility
        let w = t.clone().whnf(&sig).unwrap();
        let s = t.clone().snf(&sig).unwrap();
        assert!(RTerm::convertible(t.clone(), w, &sig).unwrap());
        assert!(RTerm::convertible(t.clone(), s.clone(), &sig).unwrap());
        // snf is idempotent
        assert_eq!(s.clone().snf(&sig).unwrap(), s);
        // convertibility is reflexive
        assert!(RTerm::convertible(t.clone(), t.clone(), &sig).unwrap());
    }

    // a judgement valid now stays valid after extending the signature
    use redukti::typing::LCtx;
    let two = numeral(&mut env, 2);
    let nat = sym(&mut env, "Nat");
    two.check(&sig, &mut LCtx::new(), nat.clone()).unwrap();
    decl(&mut env, "extra", Staticity::Static, nat.clone());
    two.check(env.signature(), &mut LCtx::new(), nat).unwrap();
}

/// Every admitted rule fires on an instance of its left-hand side.
#[test]
fn tree_completeness() {
    let mut env = Env::new();
    church(&mut env);

    // instances of both plus rules
    let lhs1 = sym(&mut env, "plus").apply(vec![numeral(&mut env, 0), numeral(&mut env, 2)]);
    let lhs2 = sym(&mut env, "plus").apply(vec![numeral(&mut env, 1), numeral(&mut env, 1)]);
    let two = numeral(&mut env, 2);

    assert_eq!(eval(&mut env, Target::Snf, lhs1), two);
    assert_eq!(eval(&mut env, Target::Snf, lhs2), two);
}

/// The rule selector and the beta switch restrict reduction.
#[test]
fn selective_reduction() {
    let mut env = Env::new();
    church(&mut env);

    let t = sym(&mut env, "plus").apply(vec![numeral(&mut env, 1), numeral(&mut env, 1)]);

    // a selector that refuses every rule freezes the term
    let cfg = Config {
        select: Some(Rc::new(|_: &redukti::RuleName| false)),
        target: Target::Snf,
        ..Config::default()
    };
    match env.handle(Command::Eval(cfg, t.clone())) {
        Ok(Some(Output::Evaled(frozen))) => assert_eq!(frozen, t),
        res => panic!("expected a frozen term, got {:?}", res.map(|_| ())),
    }

    // a beta redex survives with beta disabled
    let redex = lam(None, var(0)).apply(vec![numeral(&mut env, 1)]);
    let cfg = Config {
        beta: false,
        ..Config::default()
    };
    match env.handle(Command::Eval(cfg, redex.clone())) {
        Err(_) => (), // domain-free abstractions are not typable
        res => panic!("expected a typing failure, got {:?}", res.map(|_| ())),
    }
    let frozen = redex
        .clone()
        .reduce(
            Config {
                beta: false,
                target: Target::Snf,
                ..Config::default()
            },
            env.signature(),
        )
        .unwrap();
    assert_eq!(frozen, redex);
}

/// The logger observes every gamma firing in order.
#[test]
fn logged_evaluation() {
    use std::cell::RefCell;

    let mut env = Env::new();
    church(&mut env);

    let log: Rc<RefCell<Vec<(usize, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    let cfg = Config {
        target: Target::Snf,
        logger: Some(Rc::new(move |pos, name, _tm| {
            sink.borrow_mut().push((pos, name.to_string()));
        })),
        ..Config::default()
    };

    let t = sym(&mut env, "plus").apply(vec![numeral(&mut env, 2), numeral(&mut env, 1)]);
    env.handle(Command::Eval(cfg, t)).unwrap();

    let log = log.borrow();
    // plus 2 1 fires the successor rule twice, then the zero rule
    let names: Vec<&str> = log.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(names, ["plus.1", "plus.1", "plus.0"]);
    let positions: Vec<usize> = log.iter().map(|(p, _)| *p).collect();
    assert_eq!(positions, [0, 1, 2]);
}

/// Inference runs the reducer on the reported type.
#[test]
fn infer_reduces_the_type() {
    let mut env = Env::new();
    let ty = RTerm::new(Term::Type);
    decl(&mut env, "A", Staticity::Static, ty.clone());
    let a_ty = sym(&mut env, "A");
    // d := A, then a constant of type d infers to type A under snf
    let d = env.symbols_mut().intern("d");
    env.handle(Command::Def {
        name: d,
        opaque: false,
        ty: Some(ty),
        tm: a_ty.clone(),
    })
    .unwrap();
    let d_tm = sym(&mut env, "d");
    decl(&mut env, "x", Staticity::Static, d_tm);

    let cfg = Config {
        target: Target::Snf,
        ..Config::default()
    };
    let x = sym(&mut env, "x");
    match env.handle(Command::Infer(cfg, x)) {
        Ok(Some(Output::Inferred(t))) => assert_eq!(t, a_ty),
        res => panic!("expected an inferred type, got {:?}", res.map(|_| ())),
    }
}
