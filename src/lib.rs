//! Type checking for the lambda-Pi calculus modulo rewriting.
//!
//! This library implements the core of a proof checker for a
//! dependently-typed lambda-calculus extended with user-declared
//! rewrite rules. A checking session processes a stream of commands;
//! a command either introduces a new symbol (by declaration or
//! definition) or adds rewrite rules, and queries can evaluate terms,
//! infer types, and test convertibility.
//!
//! The state of a session consists of a [`Symbols`] table,
//! keeping track of all previously introduced names, and
//! a [`Signature`], recording the type, staticity, and
//! compiled rewrite trees attached to every symbol.
//!
//! How is a command processed?
//! The [`Env`] façade dispatches it:
//! a declaration is verified to be of a proper sort and inserted into
//! the signature; a definition additionally registers a delta rule
//! that unfolds the defined constant to its body;
//! rewrite rules are type-checked against the inferred type of their
//! left-hand side and compiled into a rewrite tree;
//! queries run the reducer and the typing judgement.
//!
//! Reduction is performed by an abstract machine ([`state::Machine`])
//! that evaluates terms lazily and consults the signature's
//! compiled trees ([`dtree::DTree`]) for rewriting.
//!
//! ~~~
//! # use redukti::{Command, Env, Error, RTerm, Staticity, Term};
//! let mut env = Env::new();
//!
//! // prop : Type
//! let prop = env.symbols_mut().intern("prop");
//! env.handle(Command::Decl(
//!     prop.clone(),
//!     Staticity::Static,
//!     RTerm::new(Term::Type),
//! ))?;
//! # Ok::<_, Error>(())
//! ~~~

#[macro_use]
extern crate log;

pub mod command;
pub mod convertible;
pub mod dtree;
pub mod env;
pub mod error;
mod fmt;
pub mod matching;
pub mod pattern;
pub mod reduce;
pub mod rule;
pub mod signature;
pub mod stack;
pub mod state;
pub mod subst;
pub mod symbol;
pub mod symbols;
pub mod term;
pub mod typing;

pub use command::{Command, Output, Test};
pub use env::Env;
pub use error::Error;
pub use pattern::{Pattern, TopPattern};
pub use reduce::{Config, Strategy, Target};
pub use rule::{Rule, RuleName, Untyped};
pub use signature::{Signature, Staticity};
pub use symbol::Symbol;
pub use symbols::Symbols;
pub use term::{Arg, DeBruijn, RTerm, Term};
