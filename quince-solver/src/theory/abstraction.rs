use fnv::FnvHashMap;

use super::Atom;
use super::Origin;
use super::TheoryDispatcher;
use crate::basic_types::Literal;
use crate::basic_types::PropositionalVariable;
use crate::containers::KeyedVec;
use crate::engine::AssignmentsPropositional;
use crate::quince_assert_moderate;
use crate::quince_assert_simple;

/// The association of a propositional variable with the theory atom it
/// abstracts. The atom is entailed exactly when the variable takes the
/// recorded polarity, so an atom bound at negative polarity is passed to the
/// theory when its variable is assigned false.
#[derive(Debug, Clone, Copy)]
struct AtomBinding {
    atom: Atom,
    /// The user-level formula the atom stems from; atoms introduced by
    /// theory lemmas have no origin.
    origin: Option<Origin>,
    polarity: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingUpdate {
    None,
    Insert,
    Remove,
}

#[derive(Debug, Clone)]
struct AbstractionEntry {
    binding: Option<AtomBinding>,
    /// Direction in which the entailed-atom set changed since the last
    /// synchronisation with the theory side.
    pending: PendingUpdate,
    /// Whether the atom is currently part of the passed formula.
    is_passed: bool,
}

impl Default for AbstractionEntry {
    fn default() -> Self {
        AbstractionEntry {
            binding: None,
            pending: PendingUpdate::None,
            is_passed: false,
        }
    }
}

/// The lazy Boolean abstraction: a bijection (up to polarity) between theory
/// atoms and propositional variables, together with the bookkeeping that
/// tells the dispatcher which atoms entered or left the entailed-true set
/// since the previous theory check.
///
/// The abstraction learns about new assignments through the trail's
/// synchronisation watermark rather than by hooking every enqueue site;
/// backtracking reports the undone literals explicitly, and the watermark
/// clamps itself when the trail is truncated.
#[derive(Debug, Default)]
pub struct BooleanAbstraction {
    entries: KeyedVec<PropositionalVariable, AbstractionEntry>,
    atom_literals: FnvHashMap<Atom, Literal>,
    /// Atoms bound since the backends were last informed.
    atoms_to_inform: Vec<Atom>,
    /// Variables whose pending direction may be set; may contain entries
    /// whose update has been cancelled in the meantime.
    updated_variables: Vec<PropositionalVariable>,
}

impl BooleanAbstraction {
    /// Registers a fresh propositional variable without a theory binding.
    pub(crate) fn grow(&mut self) {
        let _ = self.entries.push(AbstractionEntry::default());
    }

    /// Binds `atom` to the variable of `literal`; the polarity of `literal`
    /// becomes the owning polarity of the atom.
    pub(crate) fn bind_atom(&mut self, literal: Literal, atom: Atom, origin: Option<Origin>) {
        let variable = literal.get_propositional_variable();
        quince_assert_simple!(
            self.entries[variable].binding.is_none(),
            "A variable abstracts at most one atom."
        );
        quince_assert_simple!(
            !self.atom_literals.contains_key(&atom),
            "An atom is abstracted by at most one literal."
        );

        self.entries[variable].binding = Some(AtomBinding {
            atom,
            origin,
            polarity: literal.is_positive(),
        });
        let _ = self.atom_literals.insert(atom, literal);
        self.atoms_to_inform.push(atom);
    }

    pub fn literal_of_atom(&self, atom: Atom) -> Option<Literal> {
        self.atom_literals.get(&atom).copied()
    }

    pub fn is_abstracted(&self, atom: Atom) -> bool {
        self.atom_literals.contains_key(&atom)
    }

    pub(crate) fn drain_atoms_to_inform(&mut self) -> Vec<Atom> {
        std::mem::take(&mut self.atoms_to_inform)
    }

    /// Processes the trail entries behind the synchronisation watermark and
    /// records the pending updates they imply for the passed formula.
    pub(crate) fn synchronise_with_trail(&mut self, assignments: &mut AssignmentsPropositional) {
        for &literal in assignments.unsynchronised_literals() {
            self.notify_assigned(literal);
        }
        assignments.mark_trail_synchronised();
    }

    fn notify_assigned(&mut self, literal: Literal) {
        let variable = literal.get_propositional_variable();
        let entry = &mut self.entries[variable];
        let Some(binding) = entry.binding else {
            return;
        };

        // Only the owning polarity entails the atom; the opposite assignment
        // leaves the passed formula untouched.
        if literal.is_positive() != binding.polarity {
            return;
        }

        if entry.is_passed {
            // The atom was scheduled for removal but its literal holds again
            // before the theory was consulted; the two updates cancel out.
            quince_assert_moderate!(entry.pending == PendingUpdate::Remove);
            entry.pending = PendingUpdate::None;
        } else {
            if entry.pending == PendingUpdate::None {
                self.updated_variables.push(variable);
            }
            entry.pending = PendingUpdate::Insert;
        }
    }

    /// Records that `literal` was undone by backtracking.
    pub(crate) fn notify_unassigned(&mut self, literal: Literal) {
        let variable = literal.get_propositional_variable();
        let entry = &mut self.entries[variable];
        let Some(binding) = entry.binding else {
            return;
        };

        if literal.is_positive() != binding.polarity {
            return;
        }

        if entry.is_passed {
            if entry.pending == PendingUpdate::None {
                self.updated_variables.push(variable);
            }
            entry.pending = PendingUpdate::Remove;
        } else {
            // The insert was never synchronised, so nothing reaches the
            // theory side.
            entry.pending = PendingUpdate::None;
        }
    }

    /// Applies the recorded pending updates to the dispatcher. Returns true
    /// if the passed formula changed, which is the signal that a new theory
    /// check is required.
    pub(crate) fn apply_pending_updates(&mut self, dispatcher: &mut TheoryDispatcher) -> bool {
        let mut changed = false;

        for variable in self.updated_variables.drain(..) {
            let entry = &mut self.entries[variable];
            let Some(binding) = entry.binding else {
                continue;
            };

            match entry.pending {
                PendingUpdate::None => {
                    // The update was cancelled before synchronisation.
                }
                PendingUpdate::Insert => {
                    // The advisory result of the assert is ignored; the next
                    // check is authoritative.
                    let _ = dispatcher.assert_atom(binding.atom, binding.origin);
                    entry.is_passed = true;
                    entry.pending = PendingUpdate::None;
                    changed = true;
                }
                PendingUpdate::Remove => {
                    dispatcher.retract_atom(binding.atom);
                    entry.is_passed = false;
                    entry.pending = PendingUpdate::None;
                    changed = true;
                }
            }
        }

        changed
    }

    /// The literals whose truth entails the currently passed atoms.
    pub(crate) fn passed_literals(&self) -> Vec<Literal> {
        self.entries
            .keys()
            .filter(|&variable| self.entries[variable].is_passed)
            .map(|variable| {
                let binding = self.entries[variable]
                    .binding
                    .expect("A passed entry has a binding.");
                Literal::new(variable, binding.polarity)
            })
            .collect()
    }

    /// The number of atoms currently entailed by the Boolean assignment.
    pub fn num_passed_atoms(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_passed).count()
    }
}
