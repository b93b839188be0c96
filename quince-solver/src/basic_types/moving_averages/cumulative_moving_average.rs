use super::MovingAverage;

#[derive(Default, Debug, Copy, Clone)]
pub struct CumulativeMovingAverage {
    sum: u64,
    num_terms: u64,
}

impl MovingAverage for CumulativeMovingAverage {
    fn add_term(&mut self, new_term: u64) {
        self.sum += new_term;
        self.num_terms += 1;
    }

    fn value(&self) -> f64 {
        if self.num_terms > 0 {
            (self.sum as f64) / (self.num_terms as f64)
        } else {
            0.0
        }
    }

    fn adapt(&mut self, _interval_length: u64) {}
}
