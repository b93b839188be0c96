use rand::rngs::SmallRng;
use rand::Rng;
use rand::SeedableRng;

use crate::basic_types::PropositionalVariable;

/// Phase saving: each variable remembers the truth value it last held, and
/// decisions reuse that value. A configurable fraction of decisions instead
/// picks a uniformly random polarity, which helps escaping regions the saved
/// phases keep steering back into. The generator is seeded explicitly so
/// runs stay reproducible.
#[derive(Debug)]
pub struct PropositionalValueSelector {
    truth_values: Vec<bool>,
    random_polarity_probability: f64,
    random_generator: SmallRng,
}

impl PropositionalValueSelector {
    pub fn new(random_seed: u64, random_polarity_probability: f64) -> PropositionalValueSelector {
        PropositionalValueSelector {
            truth_values: vec![],
            random_polarity_probability,
            random_generator: SmallRng::seed_from_u64(random_seed),
        }
    }

    pub fn grow(&mut self) {
        self.truth_values.push(false);
    }

    /// The polarity to assign to the variable when it is decided next.
    pub fn select_value(&mut self, variable: PropositionalVariable) -> bool {
        if self.random_polarity_probability > 0.0
            && self
                .random_generator
                .gen_bool(self.random_polarity_probability)
        {
            self.random_generator.gen_bool(0.5)
        } else {
            self.truth_values[variable]
        }
    }

    /// Records the truth value the variable held, called when backtracking
    /// undoes its assignment.
    pub fn update(&mut self, variable: PropositionalVariable, truth_value: bool) {
        self.truth_values[variable] = truth_value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_saved_phase_is_selected_again() {
        let mut selector = PropositionalValueSelector::new(42, 0.0);
        selector.grow();
        selector.grow();

        let variable = PropositionalVariable::new(1);
        assert!(!selector.select_value(variable));

        selector.update(variable, true);
        assert!(selector.select_value(variable));
    }

    #[test]
    fn random_polarities_are_reproducible_for_a_seed() {
        let mut first = PropositionalValueSelector::new(7, 1.0);
        let mut second = PropositionalValueSelector::new(7, 1.0);
        first.grow();
        second.grow();

        let variable = PropositionalVariable::new(0);
        for _ in 0..64 {
            assert_eq!(first.select_value(variable), second.select_value(variable));
        }
    }
}
