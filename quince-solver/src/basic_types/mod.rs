//! Basic building blocks shared by the engine and the theory layer.

mod clause_reference;
mod constraint_operation_error;
mod literal;
pub mod moving_averages;
mod propositional_variable;
pub mod sequence_generators;
mod smt_execution_flag;
mod solution;
mod trail;

pub use clause_reference::ClauseReference;
pub use constraint_operation_error::ConstraintOperationError;
pub use literal::Literal;
pub use propositional_variable::PropositionalVariable;
pub use propositional_variable::PropositionalVariableGeneratorIterator;
pub use smt_execution_flag::SmtExecutionFlag;
pub use solution::Solution;
pub use trail::Trail;
