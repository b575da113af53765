//! Serialised processing of the command stream.

use crate::command::{Command, Output, Test};
use crate::error::{EnvError, Error};
use crate::rule::{Rule, RuleName, Untyped};
use crate::signature::{Signature, Staticity};
use crate::symbol::Symbol;
use crate::symbols::Symbols;
use crate::term::RTerm;
use crate::typing::{self, LCtx, Typing};

/// State of a checking session: the symbol table, the signature,
/// and the module bookkeeping.
///
/// Commands are handled strictly in order; each one either extends
/// the signature or runs a query against it.
#[derive(Default)]
pub struct Env {
    syms: Symbols,
    sig: Signature,
    name: Option<String>,
    deps: Vec<String>,
}

impl Env {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn symbols(&self) -> &Symbols {
        &self.syms
    }

    pub fn symbols_mut(&mut self) -> &mut Symbols {
        &mut self.syms
    }

    pub fn signature(&self) -> &Signature {
        &self.sig
    }

    pub fn signature_mut(&mut self) -> &mut Signature {
        &mut self.sig
    }

    /// Name of the current module, set by [`Command::Name`].
    pub fn module(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Modules recorded by [`Command::Require`];
    /// loading them is the business of the surrounding tooling.
    pub fn dependencies(&self) -> &[String] {
        &self.deps
    }

    /// Process a single command.
    pub fn handle(&mut self, cmd: Command) -> Result<Option<Output>, Error> {
        match cmd {
            Command::Decl(name, staticity, ty) => {
                info!("declare {}", name);
                let typing = Typing::declare(ty, &self.sig)?;
                self.sig.add_declaration(name, staticity, typing.typ)?;
                Ok(None)
            }
            Command::Def {
                name,
                opaque,
                ty,
                tm,
            } => {
                info!("define {}", name);
                let typing = Typing::define(ty, tm, &self.sig)?;
                let staticity = if opaque {
                    Staticity::Static
                } else {
                    Staticity::Definable
                };
                self.sig.add_declaration(name.clone(), staticity, typing.typ)?;
                if let (false, Some(tm)) = (opaque, typing.term) {
                    let rule = Rule {
                        name: RuleName::Delta(name.clone()),
                        ctx: Vec::new(),
                        lhs: name.into(),
                        rhs: tm,
                        arities: Vec::new(),
                    };
                    self.sig.add_rules(vec![rule])?;
                }
                Ok(None)
            }
            Command::Rules(rules) => {
                self.add_rules(rules)?;
                Ok(None)
            }
            Command::Eval(cfg, tm) => {
                let _ = tm.infer(&self.sig, &mut LCtx::new())?;
                Ok(Some(Output::Evaled(tm.reduce(cfg, &self.sig)?)))
            }
            Command::Infer(cfg, tm) => {
                let ty = tm.infer(&self.sig, &mut LCtx::new())?;
                Ok(Some(Output::Inferred(ty.reduce(cfg, &self.sig)?)))
            }
            Command::Check { assert, neg, test } => {
                let ok = self.test(test)? != neg;
                if assert && !ok {
                    return Err(EnvError::AssertionFailed.into());
                }
                Ok(Some(Output::Checked(ok)))
            }
            Command::DTree(sym) => {
                let tree = self.sig.get_tree(&sym);
                let out = match tree {
                    None => format!("no rewrite tree for {}", sym),
                    Some((pivot, tree)) => {
                        format!("tree for {} at arity {}:\n{}", sym, pivot, tree)
                    }
                };
                Ok(Some(Output::Tree(out)))
            }
            Command::Print(msg) => Ok(Some(Output::Printed(msg))),
            Command::Name(name) => {
                self.name = Some(name);
                Ok(None)
            }
            Command::Require(name) => {
                info!("module {} is required, but loading is external", name);
                self.deps.push(name);
                Ok(None)
            }
        }
    }

    /// Type-check a batch of rules, then attach them to their head
    /// symbols, grouped so that each symbol's tree is rebuilt once.
    fn add_rules(&mut self, rules: Vec<Untyped>) -> Result<(), Error> {
        let mut groups: Vec<(Symbol, Vec<Rule>)> = Vec::new();
        for rule in rules {
            let checked = self.check_rule(rule, &groups)?;
            let head = checked.lhs.symbol.clone();
            match groups.iter_mut().find(|(sym, _)| *sym == head) {
                Some((_, group)) => group.push(checked),
                None => groups.push((head, vec![checked])),
            }
        }
        for (_, group) in groups {
            self.sig.add_rules(group)?;
        }
        Ok(())
    }

    fn check_rule(&self, rule: Untyped, pending: &[(Symbol, Vec<Rule>)]) -> Result<Rule, Error> {
        let head = match &rule.lhs {
            crate::pattern::Pattern::Symb(s, _) => s.clone(),
            _ => {
                return Err(crate::error::PatternError::AVariableIsNotAPattern.into());
            }
        };
        let admitted = self.sig.get_rules(&head).len();
        let queued = pending
            .iter()
            .find(|(sym, _)| *sym == head)
            .map_or(0, |(_, group)| group.len());
        let name = RuleName::Gamma(head, admitted + queued);
        typing::check_rule(&self.sig, name, rule)
    }

    /// Evaluate a judgement query.
    fn test(&self, test: Test) -> Result<bool, Error> {
        match test {
            Test::Convert(t1, t2) => {
                let _ = t1.infer(&self.sig, &mut LCtx::new())?;
                let _ = t2.infer(&self.sig, &mut LCtx::new())?;
                RTerm::convertible(t1, t2, &self.sig)
            }
            Test::HasType(tm, ty) => {
                let _ = ty.infer(&self.sig, &mut LCtx::new())?;
                match tm.check(&self.sig, &mut LCtx::new(), ty) {
                    Ok(()) => Ok(true),
                    Err(Error::Typing(_)) => Ok(false),
                    Err(err) => Err(err),
                }
            }
        }
    }
}
