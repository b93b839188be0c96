//! The theory side of the solver: hash-consed atoms, the Boolean
//! abstraction, the backend protocol and the dispatcher which mediates
//! between the CDCL engine and the configured decision procedures.

mod abstraction;
mod atom;
mod backend;
mod dispatcher;
mod strategy;

pub use abstraction::BooleanAbstraction;
pub use atom::Atom;
pub use atom::AtomData;
pub use atom::AtomPool;
pub use atom::FormulaProperty;
pub use atom::Origin;
pub use backend::AtomLiteral;
pub use backend::InfeasibleSubset;
pub use backend::ModelValue;
pub use backend::TheoryBackend;
pub use backend::TheoryLemma;
pub use backend::TheoryModel;
pub use backend::TheoryVerdict;
pub use dispatcher::TheoryDispatcher;
pub use strategy::BackendId;
pub use strategy::GatingCondition;
pub use strategy::Strategy;
pub use strategy::StrategyNodeId;
