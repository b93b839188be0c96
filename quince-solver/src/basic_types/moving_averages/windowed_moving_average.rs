use std::collections::VecDeque;

use super::MovingAverage;
use crate::quince_assert_simple;

#[derive(Debug, Clone)]
pub struct WindowedMovingAverage {
    window_size: u64,
    windowed_sum: u64,
    values_in_window: VecDeque<u64>,
}

impl WindowedMovingAverage {
    pub fn new(window_size: u64) -> WindowedMovingAverage {
        quince_assert_simple!(window_size > 0);
        WindowedMovingAverage {
            window_size,
            windowed_sum: 0,
            values_in_window: VecDeque::with_capacity(window_size as usize),
        }
    }
}

impl MovingAverage for WindowedMovingAverage {
    fn add_term(&mut self, new_term: u64) {
        quince_assert_simple!(self.values_in_window.len() <= self.window_size as usize);

        // If the window is full, remove an element to make room for the new
        // term.
        if self.values_in_window.len() == self.window_size as usize {
            self.windowed_sum -= self.values_in_window.pop_front().unwrap();
        }

        self.windowed_sum += new_term;
        self.values_in_window.push_back(new_term);
    }

    fn value(&self) -> f64 {
        if !self.values_in_window.is_empty() {
            (self.windowed_sum as f64) / (self.values_in_window.len() as f64)
        } else {
            0.0
        }
    }

    fn adapt(&mut self, interval_length: u64) {
        quince_assert_simple!(interval_length > 0);

        match interval_length.cmp(&self.window_size) {
            std::cmp::Ordering::Less => {
                // remove excess values
                let num_removals = self.window_size - interval_length;
                for _i in 0..num_removals {
                    if let Some(removed) = self.values_in_window.pop_front() {
                        self.windowed_sum -= removed;
                    }
                }
                self.window_size = interval_length;
            }
            std::cmp::Ordering::Greater => {
                // allow for more values by increasing the window size
                self.window_size = interval_length
            }
            std::cmp::Ordering::Equal => { /* do nothing */ }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_terms_average_to_the_constant() {
        let constant_value = 100;
        let mut constant_average = WindowedMovingAverage::new(5);
        for _i in 0..1000 {
            constant_average.add_term(constant_value);
            assert!(constant_average.value() == constant_value as f64);
        }
    }

    #[test]
    fn empty_average_is_zero() {
        let empty_sum = WindowedMovingAverage::new(10);
        assert!(empty_sum.value() == 0.0);
    }

    #[test]
    fn only_terms_within_the_window_count() {
        let mut average = WindowedMovingAverage::new(2);
        average.add_term(10);
        assert!(average.value() == 10.0);
        average.add_term(30);
        assert!(average.value() == 20.0);
        average.add_term(30);
        assert!(average.value() == 30.0);
        average.add_term(10);
        assert!(average.value() == 20.0);
        average.add_term(90);
        assert!(average.value() == 50.0);
    }
}
