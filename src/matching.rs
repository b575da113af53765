//! Solving of higher-order pattern matching problems.
//!
//! A matching problem asks for a term `u` such that `u x1 … xk` is
//! beta-equivalent to a term `t` living under `depth` abstractions,
//! where `x1 … xk` are distinct variables bound by those abstractions.
//! For such problems (Miller's pattern fragment), a most general
//! solution exists whenever `t` mentions no bound variable outside
//! `x1 … xk`; the solver finds it by pure traversal.

use crate::term::{Arg, DeBruijn, RTerm, Term};

/// Raised when a term mentions a bound variable that
/// the solution may not capture.
///
/// Callers retry after normalising the term, since reduction may
/// erase the offending occurrence; persistent failure means the
/// corresponding rewrite rule does not apply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct NotUnifiable;

/// Solve `u x1 … xk ≡ t` for `u`, where `t` lives under `depth`
/// abstractions and `args` lists the indices of `x1 … xk`.
///
/// The solution is the `k`-fold abstraction of the translated body.
pub fn solve(depth: usize, args: &[DeBruijn], t: &RTerm) -> Result<RTerm, NotUnifiable> {
    let mut u = translate(depth, args, t)?;
    for _ in 0..args.len() {
        u = RTerm::new(Term::Abst(Arg::new("x", None), u));
    }
    Ok(u)
}

/// Translate a term from under `depth` abstractions into a context of
/// `args.len()` binders: occurrences of `args[i]` become the `i`-th
/// binder, other locally bound variables fail, and free variables are
/// lowered past the abstractions.
pub fn translate(depth: usize, args: &[DeBruijn], t: &RTerm) -> Result<RTerm, NotUnifiable> {
    if depth == 0 && args.is_empty() {
        return Ok(t.clone());
    }
    go(depth, args, t, 0)
}

fn go(depth: usize, args: &[DeBruijn], t: &RTerm, k: usize) -> Result<RTerm, NotUnifiable> {
    match &**t {
        Term::BVar(n) if *n >= k => {
            let n = n - k;
            if n < depth {
                // bound by one of the crossed abstractions
                match args.iter().position(|a| *a == n) {
                    Some(i) => Ok(RTerm::new(Term::BVar(k + args.len() - 1 - i))),
                    None => Err(NotUnifiable),
                }
            } else {
                Ok(RTerm::new(Term::BVar(n - depth + args.len() + k)))
            }
        }
        Term::Appl(f, ts) => {
            let f = go(depth, args, f, k)?;
            let ts = ts.iter().map(|a| go(depth, args, a, k));
            Ok(f.apply(ts.collect::<Result<_, _>>()?))
        }
        Term::Abst(arg, tm) => {
            let ty = arg
                .ty
                .as_ref()
                .map(|ty| go(depth, args, ty, k))
                .transpose()?;
            let arg = Arg { id: arg.id.clone(), ty };
            Ok(RTerm::new(Term::Abst(arg, go(depth, args, tm, k + 1)?)))
        }
        Term::Prod(arg, tm) => {
            let ty = go(depth, args, &arg.ty, k)?;
            let arg = Arg { id: arg.id.clone(), ty };
            Ok(RTerm::new(Term::Prod(arg, go(depth, args, tm, k + 1)?)))
        }
        _ => Ok(t.clone()),
    }
}
