use std::fmt::Debug;

pub trait MovingAverage: Debug {
    fn add_term(&mut self, new_term: u64);

    /// Returns the moving average value; the convention is to return 0 when
    /// no terms have been added.
    fn value(&self) -> f64;

    /// Adapts the internal data structures to the given interval length.
    /// This makes sense for moving averages that consider the k previous
    /// terms, e.g., the windowed moving average.
    fn adapt(&mut self, interval_length: u64);
}
