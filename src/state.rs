//! Machine states for the lazy evaluation of terms.
//!
//! A [`Machine`] pairs a term with an environment binding its outer
//! de Bruijn indices to lazily evaluated terms, plus a stack of
//! pending arguments, themselves suspended machines. Reading a
//! machine back into the term it stands for ([`Machine::readback`])
//! substitutes the environment and reapplies the stack; it contracts
//! no redex, so forcing an environment cell never draws from the
//! step budget of the enclosing query, and forcing is safe to
//! re-enter from guard evaluation under a config overlay.
//!
//! Sharing is what keeps call-by-need rewriting from exploding:
//! environment cells ([`LazyTerm`]) memoise their read-back, and
//! shared machines ([`MachineRef`]) memoise their head
//! normalisation, so work done while matching one rule against an
//! argument is reused when the next rule inspects the same argument.

use crate::error::Error;
use crate::signature::Signature;
use crate::stack;
use crate::term::{RTerm, Term};
use lazy_st::Thunk;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

/// A term under evaluation: `term` with `env` substituted,
/// applied to the elements of `stack`.
#[derive(Clone)]
pub struct Machine {
    pub env: Bindings,
    pub term: RTerm,
    pub stack: Stack,
}

/// Values bound to the outer de Bruijn indices of a machine's term.
pub type Bindings = stack::Stack<LazyTerm>;

/// Pending arguments of a machine, first argument on top.
pub type Stack = stack::Stack<MachineRef>;

impl Machine {
    /// Start evaluating a term, with nothing bound and nothing applied.
    pub fn new(term: RTerm) -> Self {
        Self {
            env: Bindings::new(),
            term,
            stack: Stack::new(),
        }
    }

    /// Read the machine back into the term it stands for.
    ///
    /// The environment is substituted into the term and the stack
    /// elements are reapplied as arguments; no reduction happens.
    pub fn readback(self) -> RTerm {
        let args = self.stack.into_iter().map(|arg| arg.read_back());
        self.term.psubst(&self.env).apply(args.collect())
    }
}

/// A memoising cell for the value of one bound variable.
///
/// The first force reads the suspended machine back;
/// every later force returns the cached term.
#[derive(Clone)]
pub struct LazyTerm(Rc<Thunk<MachineRef, RTerm>>);

impl LazyTerm {
    pub fn new(m: MachineRef) -> Self {
        Self(Rc::new(Thunk::new(m)))
    }

    /// Wrap a term that needs no evaluation to be read back.
    pub fn from_term(tm: RTerm) -> Self {
        Self::new(MachineRef::new(Machine::new(tm)))
    }

    /// Force the cell.
    pub fn force(&self) -> &RTerm {
        &**self.0
    }
}

impl lazy_st::Evaluate<RTerm> for MachineRef {
    fn evaluate(self) -> RTerm {
        self.read_back()
    }
}

/// A machine shared between an argument stack and the matcher,
/// carrying a memoised head normalisation.
#[derive(Clone)]
pub struct MachineRef(Rc<RefCell<Memo>>);

struct Memo {
    machine: Machine,
    /// set once the machine has reached weak head normal form
    head_normal: bool,
}

impl MachineRef {
    pub fn new(machine: Machine) -> Self {
        let head_normal = false;
        Self(Rc::new(RefCell::new(Memo {
            machine,
            head_normal,
        })))
    }

    /// Head-normalise the shared machine in place, at most once.
    ///
    /// The signature carries the active reduction config, so the
    /// memoised form always stems from the config and step budget of
    /// the query that created the machine; machines are created per
    /// query and never outlive it.
    pub fn whnf(&self, sig: &Signature) -> Result<(), Error> {
        let mut memo = self.0.borrow_mut();
        if !memo.head_normal {
            memo.machine.whnf(sig)?;
            memo.head_normal = true;
        }
        Ok(())
    }

    /// Borrow the underlying machine.
    pub fn machine(&self) -> Ref<Machine> {
        Ref::map(self.0.borrow(), |memo| &memo.machine)
    }

    /// Read the machine back into a term without reducing it.
    pub fn read_back(&self) -> RTerm {
        self.machine().clone().readback()
    }
}

impl RTerm {
    /// Substitute the environment entries simultaneously at the
    /// outermost binders of the term, forcing every entry that is
    /// used; unbound indices are lowered past the environment.
    pub fn psubst(self, env: &Bindings) -> Self {
        if env.is_empty() {
            return self;
        }
        self.apply_subst(
            &|n, k| {
                debug_assert!(n >= k);
                match env.get(n - k) {
                    Some(value) => value.force().clone().shift(k),
                    None => RTerm::new(Term::BVar(n - env.len())),
                }
            },
            0,
        )
    }
}
