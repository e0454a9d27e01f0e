//! MaxSMT backend abstraction and the built-in exact-rational solver.

pub mod builtin;
pub mod expr;
pub mod solver;

pub use builtin::BuiltinMaxSmt;
pub use expr::{Assertion, BoolVar, Cmp, LinExpr, LinearAssertion, RealVar};
pub use solver::{MaxSmtBackend, OptOutcome, SmtModel, SmtOutcome};
