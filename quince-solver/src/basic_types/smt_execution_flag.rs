/// The outcome of a call to [`SmtSolver::solve`](crate::engine::SmtSolver::solve).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtExecutionFlag {
    /// The Boolean assignment is complete and the theory accepted it.
    Satisfiable,
    /// Unsatisfiability was proven at the root level.
    Unsatisfiable,
    /// Some branch was abandoned with an inconclusive theory verdict, so
    /// neither satisfiability nor unsatisfiability can be claimed.
    Unknown,
    /// The termination condition triggered before a verdict was reached.
    Timeout,
}
