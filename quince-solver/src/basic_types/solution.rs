use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::containers::KeyedVec;
use crate::engine::sat::AssignmentsPropositional;
use crate::quince_assert_simple;
use crate::theory::TheoryModel;

/// A satisfying assignment: the truth value of every propositional variable
/// plus the theory-variable model collected from the backends. The solution
/// is copied out of the solver state, so it stays valid when the solver
/// moves on.
#[derive(Debug, Clone)]
pub struct Solution {
    truth_values: KeyedVec<PropositionalVariable, bool>,
    theory_model: TheoryModel,
}

impl Solution {
    pub(crate) fn new(
        assignments: &AssignmentsPropositional,
        theory_model: TheoryModel,
    ) -> Solution {
        let mut truth_values = KeyedVec::default();
        truth_values.resize(assignments.num_propositional_variables() as usize, true);

        for variable in assignments.get_propositional_variables() {
            quince_assert_simple!(
                assignments.is_variable_assigned(variable),
                "A solution requires a complete assignment."
            );
            truth_values[variable] = assignments.is_variable_assigned_true(variable);
        }

        Solution {
            truth_values,
            theory_model,
        }
    }

    pub fn num_propositional_variables(&self) -> usize {
        self.truth_values.len()
    }

    pub fn get_variable_value(&self, variable: PropositionalVariable) -> bool {
        self.truth_values[variable]
    }

    pub fn get_literal_value(&self, literal: Literal) -> bool {
        self.truth_values[literal.get_propositional_variable()] == literal.is_positive()
    }

    /// The literals representing the solution; every variable occurs exactly
    /// once in the returned iterator.
    pub fn get_propositional_solution(&self) -> impl Iterator<Item = Literal> + '_ {
        self.truth_values.keys().map(|variable| {
            let truth_value = self.truth_values[&variable];
            Literal::new(variable, truth_value)
        })
    }

    pub fn theory_model(&self) -> &TheoryModel {
        &self.theory_model
    }
}
