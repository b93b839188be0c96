use super::AssignmentsPropositional;
use crate::basic_types::PropositionalVariable;
use crate::containers::KeyValueHeap;

/// VSIDS-style variable order: unassigned decision variables ranked by a
/// decaying activity score. The heap is lazy; assigned variables are only
/// removed when they surface as the maximum.
#[derive(Debug)]
pub struct PropositionalVariableSelector {
    heap: KeyValueHeap<PropositionalVariable>,
    increment: f64,
    max_threshold: f64,
    decay_factor: f64,
}

impl PropositionalVariableSelector {
    pub fn new() -> PropositionalVariableSelector {
        PropositionalVariableSelector {
            heap: KeyValueHeap::default(),
            increment: 1.0,
            max_threshold: 1e100,
            decay_factor: 0.95,
        }
    }

    pub fn bump_activity(&mut self, variable: PropositionalVariable) {
        // Rescale all activities if the values grow too large.
        let activity = self.heap.get_value(variable);
        if activity + self.increment >= self.max_threshold {
            self.heap.divide_values(self.max_threshold);
            self.increment /= self.max_threshold;
        }
        self.heap.increment(variable, self.increment);
    }

    /// Makes an unassigned variable eligible for selection again.
    pub fn restore(&mut self, variable: PropositionalVariable) {
        self.heap.restore_key(variable);
    }

    pub fn decay_activities(&mut self) {
        // Decaying is implemented by growing the increment instead of
        // dividing each activity, which is cheaper.
        self.increment *= 1.0 / self.decay_factor;
    }

    pub fn grow(&mut self) {
        self.heap.grow(0.0);
    }

    /// The unassigned variable with the highest activity, or `None` when
    /// every decision variable is assigned.
    pub fn peek_next_variable(
        &mut self,
        assignments: &AssignmentsPropositional,
    ) -> Option<PropositionalVariable> {
        loop {
            if let Some(candidate_variable) = self.heap.peek_max() {
                // Assigned variables surface lazily and are dropped here;
                // backtracking restores them.
                if assignments.is_variable_assigned(candidate_variable) {
                    self.heap.delete_key(candidate_variable);
                } else {
                    return Some(candidate_variable);
                }
            } else {
                return None;
            }
        }
    }
}

impl Default for PropositionalVariableSelector {
    fn default() -> Self {
        PropositionalVariableSelector::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_most_active_unassigned_variable_is_selected() {
        let mut selector = PropositionalVariableSelector::new();
        let mut assignments = AssignmentsPropositional::default();

        for _ in 0..3 {
            selector.grow();
            assignments.grow();
        }

        let favourite = PropositionalVariable::new(2);
        selector.bump_activity(favourite);
        selector.bump_activity(favourite);
        selector.bump_activity(PropositionalVariable::new(1));

        assert_eq!(selector.peek_next_variable(&assignments), Some(favourite));
    }

    #[test]
    fn assigned_variables_are_skipped_and_restored() {
        let mut selector = PropositionalVariableSelector::new();
        let mut assignments = AssignmentsPropositional::default();

        for _ in 0..2 {
            selector.grow();
            assignments.grow();
        }

        let variable = PropositionalVariable::new(1);
        selector.bump_activity(variable);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(crate::basic_types::Literal::new(variable, true));
        assert_ne!(selector.peek_next_variable(&assignments), Some(variable));

        assignments.synchronise(0).for_each(|literal| {
            selector.restore(literal.get_propositional_variable());
        });
        assert_eq!(selector.peek_next_variable(&assignments), Some(variable));
    }
}
