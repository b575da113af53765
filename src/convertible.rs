//! Convertibility checking.

use crate::error::Error;
use crate::signature::Signature;
use crate::term::{RTerm, Term};

type Constraint = (RTerm, RTerm);

/// Return true if the given two weak head normal terms are
/// potentially convertible, and if so, add the convertibility
/// constraints that remain to be fulfilled.
///
/// Abstraction domains are not compared: convertible terms keep
/// convertible bodies under any annotation.
fn step((cn1, cn2): Constraint, cns: &mut Vec<Constraint>) -> bool {
    match (&*cn1, &*cn2) {
        (Term::Kind, Term::Kind) | (Term::Type, Term::Type) => true,
        (Term::Symb(s1), Term::Symb(s2)) => s1 == s2,
        (Term::BVar(v1), Term::BVar(v2)) => v1 == v2,
        (Term::Abst(_, t1), Term::Abst(_, t2)) => {
            cns.push((t1.clone(), t2.clone()));
            true
        }
        (Term::Prod(arg1, tm1), Term::Prod(arg2, tm2)) => {
            cns.push((arg1.ty.clone(), arg2.ty.clone()));
            cns.push((tm1.clone(), tm2.clone()));
            true
        }
        (Term::Appl(f1, args1), Term::Appl(f2, args2)) => {
            if args1.len() == args2.len() {
                cns.push((f1.clone(), f2.clone()));
                cns.extend(args1.clone().into_iter().zip(args2.clone()));
                true
            } else {
                false
            }
        }
        _ => false,
    }
}

impl RTerm {
    /// Return true if the given terms have a common reduct.
    pub fn convertible(tm1: Self, tm2: Self, sig: &Signature) -> Result<bool, Error> {
        let mut cns = Vec::from([(tm1, tm2)]);
        loop {
            match cns.pop() {
                Some((cn1, cn2)) => {
                    trace!("convertible: {} ~? {}", cn1, cn2);
                    if cn1 != cn2 && !step((cn1.whnf(sig)?, cn2.whnf(sig)?), &mut cns) {
                        break Ok(false);
                    }
                }
                None => break Ok(true),
            }
        }
    }
}
