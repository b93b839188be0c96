use std::fmt::Debug;
use std::fmt::Formatter;

use enumset::EnumSet;
use log::debug;

use super::Atom;
use super::AtomData;
use super::BackendId;
use super::FormulaProperty;
use super::InfeasibleSubset;
use super::Origin;
use super::Strategy;
use super::TheoryBackend;
use super::TheoryLemma;
use super::TheoryModel;
use super::TheoryVerdict;
use crate::containers::KeyedVec;

/// Mediates between the search core and the configured theory backends.
///
/// The dispatcher owns the backends, activates the subset selected by the
/// strategy for the current formula, and forwards the incremental
/// assert/retract traffic. Verdicts are combined pessimistically: any
/// backend answering inconsistent decides the check, otherwise any unknown
/// answer degrades the combined verdict to unknown.
pub struct TheoryDispatcher {
    backends: KeyedVec<BackendId, Box<dyn TheoryBackend>>,
    last_verdicts: KeyedVec<BackendId, TheoryVerdict>,
    strategy: Strategy,
    active_backends: Vec<BackendId>,
}

impl Debug for TheoryDispatcher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let backend_names: Vec<_> = self
            .backends
            .iter()
            .map(|backend| backend.name().to_owned())
            .collect();
        f.debug_struct("TheoryDispatcher")
            .field("backends", &backend_names)
            .field("strategy", &self.strategy)
            .field("active_backends", &self.active_backends)
            .finish()
    }
}

impl Default for TheoryDispatcher {
    fn default() -> Self {
        TheoryDispatcher::new(Strategy::new())
    }
}

impl TheoryDispatcher {
    pub fn new(strategy: Strategy) -> TheoryDispatcher {
        TheoryDispatcher {
            backends: KeyedVec::default(),
            last_verdicts: KeyedVec::default(),
            strategy,
            active_backends: vec![],
        }
    }

    /// Registers a backend; ids are handed out in registration order and are
    /// the ids the strategy tree refers to.
    pub fn register_backend(&mut self, backend: Box<dyn TheoryBackend>) -> BackendId {
        let _ = self.last_verdicts.push(TheoryVerdict::Unknown);
        self.backends.push(backend)
    }

    pub fn has_backends(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn backend(&self, backend_id: BackendId) -> &dyn TheoryBackend {
        self.backends[backend_id].as_ref()
    }

    pub fn backend_mut(&mut self, backend_id: BackendId) -> &mut dyn TheoryBackend {
        self.backends[backend_id].as_mut()
    }

    /// Computes the active backend set for the given formula properties. An
    /// empty strategy activates every registered backend.
    pub(crate) fn initialise(&mut self, properties: EnumSet<FormulaProperty>) {
        self.active_backends = if self.strategy.is_empty() {
            self.backends.keys().collect()
        } else {
            self.strategy.active_backends(properties)
        };

        debug!(
            "Theory dispatcher activated {} of {} backends.",
            self.active_backends.len(),
            self.backends.len()
        );
    }

    /// Pre-registers an atom with every active backend. Returns false if any
    /// backend reports the atom as trivially inconsistent.
    pub(crate) fn inform(&mut self, atom: Atom, data: &AtomData) -> bool {
        let mut consistent = true;
        for &backend_id in &self.active_backends {
            consistent &= self.backends[backend_id].inform(atom, data);
        }
        consistent
    }

    pub(crate) fn assert_atom(&mut self, atom: Atom, origin: Option<Origin>) -> bool {
        let mut accepted = true;
        for &backend_id in &self.active_backends {
            accepted &= self.backends[backend_id].assert_atom(atom, origin);
        }
        accepted
    }

    pub(crate) fn retract_atom(&mut self, atom: Atom) {
        for &backend_id in &self.active_backends {
            self.backends[backend_id].retract_atom(atom);
        }
    }

    /// Runs the consistency check on every active backend and combines the
    /// verdicts pessimistically. Every active backend is queried even after
    /// an inconsistency has surfaced: the recorded verdicts must all stem
    /// from this round, because the infeasible subsets are read off exactly
    /// the backends that answered inconsistent. A verdict left over from an
    /// earlier round would resurrect subsets that were computed against an
    /// atom set which no longer exists.
    pub(crate) fn check(&mut self, full: bool) -> TheoryVerdict {
        let mut combined = TheoryVerdict::Consistent;

        for &backend_id in &self.active_backends {
            let verdict = self.backends[backend_id].check(full);
            self.last_verdicts[backend_id] = verdict;

            debug!(
                "Backend '{}' answered {} (full = {full}).",
                self.backends[backend_id].name(),
                verdict
            );

            match verdict {
                TheoryVerdict::Inconsistent => combined = TheoryVerdict::Inconsistent,
                TheoryVerdict::Unknown => {
                    if combined != TheoryVerdict::Inconsistent {
                        combined = TheoryVerdict::Unknown;
                    }
                }
                TheoryVerdict::Consistent => {}
            }
        }

        combined
    }

    /// The infeasible subsets of the backends that answered inconsistent in
    /// the preceding [`TheoryDispatcher::check`] round; [`TheoryDispatcher::check`]
    /// refreshes the verdict of every active backend, so no stale subset can
    /// slip in here. The subsets are copied out of the backends; answer
    /// objects never cross the module boundary by reference.
    pub(crate) fn collect_infeasible_subsets(&self) -> Vec<InfeasibleSubset> {
        let mut subsets = Vec::new();
        for &backend_id in &self.active_backends {
            if self.last_verdicts[backend_id] == TheoryVerdict::Inconsistent {
                subsets.extend_from_slice(self.backends[backend_id].infeasible_subsets());
            }
        }
        subsets
    }

    /// Drains the lemmas of every active backend.
    pub(crate) fn take_lemmas(&mut self) -> Vec<TheoryLemma> {
        let mut lemmas = Vec::new();
        for &backend_id in &self.active_backends {
            lemmas.append(&mut self.backends[backend_id].take_lemmas());
        }
        lemmas
    }

    /// Populates the model from the backends whose last answer was
    /// consistent.
    pub(crate) fn update_model(&mut self, model: &mut TheoryModel) {
        for &backend_id in &self.active_backends {
            if self.last_verdicts[backend_id] == TheoryVerdict::Consistent {
                self.backends[backend_id].update_model(model);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use enumset::EnumSet;

    use super::*;
    use crate::theory::AtomPool;

    /// Answers the scripted verdicts in order (consistent once the script is
    /// exhausted) while exposing a fixed subset collection, so the tests can
    /// observe which subsets the dispatcher actually picks up.
    #[derive(Debug)]
    struct QueueBackend {
        verdicts: VecDeque<TheoryVerdict>,
        subsets: Vec<InfeasibleSubset>,
        num_checks: usize,
    }

    impl QueueBackend {
        fn new(verdicts: &[TheoryVerdict], subsets: Vec<InfeasibleSubset>) -> QueueBackend {
            QueueBackend {
                verdicts: verdicts.iter().copied().collect(),
                subsets,
                num_checks: 0,
            }
        }
    }

    impl TheoryBackend for QueueBackend {
        fn name(&self) -> &str {
            "queue"
        }

        fn assert_atom(&mut self, _atom: Atom, _origin: Option<Origin>) -> bool {
            true
        }

        fn retract_atom(&mut self, _atom: Atom) {}

        fn check(&mut self, _full: bool) -> TheoryVerdict {
            self.num_checks += 1;
            self.verdicts
                .pop_front()
                .unwrap_or(TheoryVerdict::Consistent)
        }

        fn infeasible_subsets(&self) -> &[InfeasibleSubset] {
            &self.subsets
        }
    }

    #[test]
    fn every_active_backend_is_checked_each_round() {
        let mut dispatcher = TheoryDispatcher::new(Strategy::new());
        let first = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Inconsistent],
            vec![],
        )));
        let second = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Consistent],
            vec![],
        )));
        dispatcher.initialise(EnumSet::empty());

        assert_eq!(dispatcher.check(false), TheoryVerdict::Inconsistent);

        for backend_id in [first, second] {
            let backend = dispatcher
                .backend(backend_id)
                .downcast_ref::<QueueBackend>()
                .unwrap();
            assert_eq!(backend.num_checks, 1);
        }
    }

    #[test]
    fn an_inconsistency_dominates_an_unknown_answer() {
        let mut dispatcher = TheoryDispatcher::new(Strategy::new());
        let _ = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Unknown],
            vec![],
        )));
        let _ = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Inconsistent],
            vec![],
        )));
        dispatcher.initialise(EnumSet::empty());

        assert_eq!(dispatcher.check(false), TheoryVerdict::Inconsistent);
    }

    #[test]
    fn only_subsets_from_the_current_round_are_collected() {
        let mut pool = AtomPool::default();
        let stale_atom = pool.intern_atom("x <= 0", EnumSet::empty());
        let fresh_atom = pool.intern_atom("x >= 9", EnumSet::empty());

        let mut dispatcher = TheoryDispatcher::new(Strategy::new());
        // Inconsistent in the first round only.
        let _ = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Inconsistent, TheoryVerdict::Consistent],
            vec![vec![stale_atom]],
        )));
        // Inconsistent in the second round only.
        let _ = dispatcher.register_backend(Box::new(QueueBackend::new(
            &[TheoryVerdict::Consistent, TheoryVerdict::Inconsistent],
            vec![vec![fresh_atom]],
        )));
        dispatcher.initialise(EnumSet::empty());

        assert_eq!(dispatcher.check(false), TheoryVerdict::Inconsistent);
        assert_eq!(
            dispatcher.collect_infeasible_subsets(),
            vec![vec![stale_atom]]
        );

        // The first backend no longer objects; its earlier subset must not
        // resurface alongside the fresh one.
        assert_eq!(dispatcher.check(false), TheoryVerdict::Inconsistent);
        assert_eq!(
            dispatcher.collect_infeasible_subsets(),
            vec![vec![fresh_atom]]
        );
    }
}
