//! # Quince
//! Quince is a satisfiability-modulo-theories solver kernel built around the
//! lazy DPLL(T) architecture: a conflict-driven clause-learning (CDCL)
//! propositional engine abstracts theory atoms into Boolean variables and
//! consults pluggable theory decision procedures ("backends") whenever the
//! set of entailed atoms changes.
//!
//! The crate provides the search core and the backend protocol; concrete
//! theory solvers, parsers and strategy construction front-ends live outside
//! and talk to the kernel through [`theory::TheoryBackend`].
//!
//! # Using Quince
//! A small propositional instance is solved as follows:
//! ```rust
//! use quince_solver::engine::SmtSolver;
//! use quince_solver::basic_types::SmtExecutionFlag;
//! use quince_solver::termination::Indefinite;
//!
//! let mut solver = SmtSolver::default();
//! let x = solver.new_literal();
//! let y = solver.new_literal();
//!
//! let _ = solver.add_permanent_clause(vec![x, y]);
//! let _ = solver.add_permanent_clause(vec![!x, y]);
//!
//! let flag = solver.solve(&mut Indefinite);
//! assert_eq!(flag, SmtExecutionFlag::Satisfiable);
//! ```
//!
//! Theory reasoning is added by interning atoms in the solver's
//! [`theory::AtomPool`], binding them to literals through the Boolean
//! abstraction, and registering backends gated by a [`theory::Strategy`].

pub mod basic_types;
pub mod containers;
pub mod engine;
pub mod quince_asserts;
pub mod termination;
pub mod theory;
