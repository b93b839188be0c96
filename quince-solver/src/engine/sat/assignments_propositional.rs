use crate::basic_types::ClauseReference;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::basic_types::PropositionalVariableGeneratorIterator;
use crate::basic_types::Trail;
use crate::containers::KeyedVec;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;

/// The propositional assignment: the trail of assigned literals partitioned
/// into decision levels, plus per-variable assignment information (truth
/// value, decision level and reason clause).
#[derive(Clone, Debug)]
pub struct AssignmentsPropositional {
    assignment_info: KeyedVec<PropositionalVariable, PropositionalAssignmentInfo>,
    trail: Trail<Literal>,
    pub true_literal: Literal,
    pub false_literal: Literal,
}

impl Default for AssignmentsPropositional {
    fn default() -> Self {
        let dummy_literal = Literal::new(PropositionalVariable::new(0), true);
        AssignmentsPropositional {
            assignment_info: Default::default(),
            trail: Default::default(),
            true_literal: dummy_literal,
            false_literal: !dummy_literal,
        }
    }
}

impl AssignmentsPropositional {
    pub fn increase_decision_level(&mut self) {
        self.trail.increase_decision_level()
    }

    pub fn get_decision_level(&self) -> usize {
        self.trail.get_decision_level()
    }

    pub fn num_trail_entries(&self) -> usize {
        self.trail.len()
    }

    pub fn get_trail_entry(&self, index: usize) -> Literal {
        self.trail[index]
    }

    /// The literals assigned since the theory side last synchronised with
    /// the trail; see [`AssignmentsPropositional::mark_trail_synchronised`].
    pub fn unsynchronised_literals(&self) -> &[Literal] {
        self.trail.unsynchronised()
    }

    /// Declares every current trail entry as seen by the theory side. The
    /// watermark is clamped automatically when backtracking truncates the
    /// trail.
    pub fn mark_trail_synchronised(&mut self) {
        self.trail.mark_synchronised()
    }

    pub fn grow(&mut self) {
        let _ = self
            .assignment_info
            .push(PropositionalAssignmentInfo::Unassigned);
    }

    pub fn num_propositional_variables(&self) -> u32 {
        self.assignment_info.len() as u32
    }

    pub fn get_propositional_variables(&self) -> PropositionalVariableGeneratorIterator {
        // We start from 1 to ignore the special variable with index zero,
        // which is always assigned to true at the root.
        PropositionalVariableGeneratorIterator::new(1, self.num_propositional_variables())
    }

    pub fn is_variable_assigned_true(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Assigned { truth_value, .. } => truth_value,
            PropositionalAssignmentInfo::Unassigned => false,
        }
    }

    pub fn is_variable_assigned_false(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Assigned { truth_value, .. } => !truth_value,
            PropositionalAssignmentInfo::Unassigned => false,
        }
    }

    pub fn is_literal_assigned_true(&self, literal: Literal) -> bool {
        if literal.is_positive() {
            self.is_variable_assigned_true(literal.get_propositional_variable())
        } else {
            self.is_variable_assigned_false(literal.get_propositional_variable())
        }
    }

    pub fn is_literal_assigned_false(&self, literal: Literal) -> bool {
        self.is_literal_assigned(literal) && !self.is_literal_assigned_true(literal)
    }

    pub fn is_literal_assigned(&self, literal: Literal) -> bool {
        self.is_variable_assigned(literal.get_propositional_variable())
    }

    pub fn is_literal_unassigned(&self, literal: Literal) -> bool {
        self.is_variable_unassigned(literal.get_propositional_variable())
    }

    pub fn is_variable_unassigned(&self, variable: PropositionalVariable) -> bool {
        self.assignment_info[variable] == PropositionalAssignmentInfo::Unassigned
    }

    pub fn is_variable_assigned(&self, variable: PropositionalVariable) -> bool {
        self.assignment_info[variable] != PropositionalAssignmentInfo::Unassigned
    }

    pub fn is_literal_root_assignment(&self, literal: Literal) -> bool {
        if self.is_literal_unassigned(literal) {
            false
        } else {
            self.get_variable_assignment_level(literal.get_propositional_variable()) == 0
        }
    }

    pub fn is_variable_decision(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Unassigned => false,
            PropositionalAssignmentInfo::Assigned { reason, .. } => reason.is_none(),
        }
    }

    pub fn is_literal_decision(&self, literal: Literal) -> bool {
        self.is_variable_decision(literal.get_propositional_variable())
    }

    pub fn is_variable_propagated(&self, variable: PropositionalVariable) -> bool {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Unassigned => false,
            PropositionalAssignmentInfo::Assigned { reason, .. } => reason.is_some(),
        }
    }

    pub fn is_literal_propagated(&self, literal: Literal) -> bool {
        self.is_variable_propagated(literal.get_propositional_variable())
    }

    pub fn get_variable_assignment_level(&self, variable: PropositionalVariable) -> usize {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Unassigned => {
                panic!("Unassigned variables do not have assignment levels");
            }
            PropositionalAssignmentInfo::Assigned { decision_level, .. } => decision_level,
        }
    }

    pub fn get_literal_assignment_level(&self, literal: Literal) -> usize {
        self.get_variable_assignment_level(literal.get_propositional_variable())
    }

    /// The reason clause of an assigned variable; `None` for decisions and
    /// root assignments.
    pub fn get_variable_reason(&self, variable: PropositionalVariable) -> Option<ClauseReference> {
        match self.assignment_info[variable] {
            PropositionalAssignmentInfo::Unassigned => {
                panic!("Unassigned variables do not have reasons");
            }
            PropositionalAssignmentInfo::Assigned { reason, .. } => reason,
        }
    }

    pub fn get_literal_reason(&self, literal: Literal) -> Option<ClauseReference> {
        self.get_variable_reason(literal.get_propositional_variable())
    }

    fn make_assignment(
        &mut self,
        true_literal: Literal,
        reason: Option<ClauseReference>,
    ) -> Option<ClauseReference> {
        if self.is_literal_assigned_false(true_literal) {
            return reason;
        } else if self.is_literal_assigned_true(true_literal) {
            // Already assigned, e.g. because a lemma implied a literal that
            // propagation had produced as well; the original information is
            // kept.
            return None;
        }

        self.assignment_info[true_literal.get_propositional_variable()] =
            PropositionalAssignmentInfo::Assigned {
                truth_value: true_literal.is_positive(),
                decision_level: self.get_decision_level(),
                reason,
            };

        self.trail.push(true_literal);

        None
    }

    pub fn enqueue_decision_literal(&mut self, decision_literal: Literal) {
        quince_assert_simple!(!self.is_literal_assigned(decision_literal));

        let _ = self.make_assignment(decision_literal, None);
    }

    /// Enqueues a literal implied by the given clause. Returns the clause if
    /// the literal is already false, i.e. the clause is conflicting.
    pub fn enqueue_propagated_literal(
        &mut self,
        propagated_literal: Literal,
        reason: ClauseReference,
    ) -> Option<ClauseReference> {
        self.make_assignment(propagated_literal, Some(reason))
    }

    /// This iterator returns the literals on the trail in _reverse_ order
    /// (LIFO) while undoing their assignments.
    pub fn synchronise(&mut self, new_decision_level: usize) -> impl Iterator<Item = Literal> + '_ {
        quince_assert_simple!(new_decision_level < self.get_decision_level());
        self.trail.synchronise(new_decision_level).inspect(|entry| {
            let variable = entry.get_propositional_variable();

            self.assignment_info[variable] = PropositionalAssignmentInfo::Unassigned;
        })
    }

    pub fn is_at_the_root_level(&self) -> bool {
        self.get_decision_level() == 0
    }

    /// Rewrites the reason references of all assigned variables after the
    /// clause storage was relocated.
    pub(crate) fn remap_clause_references(
        &mut self,
        map: &super::clause_allocator::ClauseRelocationMap,
    ) {
        for info in self.assignment_info.iter_mut() {
            if let PropositionalAssignmentInfo::Assigned {
                reason: Some(reason),
                ..
            } = info
            {
                *reason = map.get(*reason);
            }
        }
    }
}

#[derive(PartialEq, Clone, Copy, Default, Debug)]
enum PropositionalAssignmentInfo {
    Assigned {
        truth_value: bool,
        decision_level: usize,
        reason: Option<ClauseReference>,
    },
    #[default]
    Unassigned,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_literal(assignments: &mut AssignmentsPropositional) -> Literal {
        let literal = Literal::new(
            PropositionalVariable::new(assignments.num_propositional_variables()),
            true,
        );
        assignments.grow();
        literal
    }

    #[test]
    fn an_already_true_literal_does_not_override_assignment_info() {
        let mut assignments = AssignmentsPropositional::default();
        let literal = fresh_literal(&mut assignments);
        let reason = ClauseReference::create_allocated_clause_reference(1);
        let other_reason = ClauseReference::create_allocated_clause_reference(2);

        let result = assignments.enqueue_propagated_literal(literal, reason);
        assert!(result.is_none());
        assert_eq!(assignments.num_trail_entries(), 1);

        let result_reassignment = assignments.enqueue_propagated_literal(literal, other_reason);
        assert!(result_reassignment.is_none());
        assert_eq!(assignments.num_trail_entries(), 1);
        assert_eq!(assignments.get_literal_reason(literal), Some(reason));
    }

    #[test]
    fn enqueueing_a_false_literal_reports_the_conflicting_clause() {
        let mut assignments = AssignmentsPropositional::default();
        let literal = fresh_literal(&mut assignments);
        let reason = ClauseReference::create_allocated_clause_reference(1);

        assignments.enqueue_decision_literal(!literal);
        assert_eq!(
            assignments.enqueue_propagated_literal(literal, reason),
            Some(reason)
        );
    }

    #[test]
    fn synchronise_undoes_assignments_in_reverse_order() {
        let mut assignments = AssignmentsPropositional::default();
        let first = fresh_literal(&mut assignments);
        let second = fresh_literal(&mut assignments);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(first);
        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!second);

        let undone: Vec<_> = assignments.synchronise(0).collect();
        assert_eq!(undone, vec![!second, first]);
        assert!(assignments.is_literal_unassigned(first));
        assert!(assignments.is_literal_unassigned(second));
    }

    #[test]
    fn the_trail_watermark_follows_assignments_and_backtracking() {
        let mut assignments = AssignmentsPropositional::default();
        let first = fresh_literal(&mut assignments);
        let second = fresh_literal(&mut assignments);

        assignments.enqueue_decision_literal(first);
        assignments.mark_trail_synchronised();

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(second);
        assert_eq!(assignments.unsynchronised_literals(), &[second]);

        let _ = assignments.synchronise(0).count();
        assert!(assignments.unsynchronised_literals().is_empty());

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(!second);
        assert_eq!(assignments.unsynchronised_literals(), &[!second]);
    }

    #[test]
    fn decisions_and_propagations_are_distinguished_by_their_reason() {
        let mut assignments = AssignmentsPropositional::default();
        let decision = fresh_literal(&mut assignments);
        let propagated = fresh_literal(&mut assignments);
        let reason = ClauseReference::create_allocated_clause_reference(1);

        assignments.increase_decision_level();
        assignments.enqueue_decision_literal(decision);
        let _ = assignments.enqueue_propagated_literal(propagated, reason);

        assert!(assignments.is_literal_decision(decision));
        assert!(!assignments.is_literal_propagated(decision));
        assert!(assignments.is_literal_propagated(propagated));
        assert_eq!(assignments.get_literal_reason(propagated), Some(reason));
    }
}
