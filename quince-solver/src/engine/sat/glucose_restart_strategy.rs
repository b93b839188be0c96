use crate::basic_types::moving_averages::CumulativeMovingAverage;
use crate::basic_types::moving_averages::MovingAverage;
use crate::basic_types::moving_averages::WindowedMovingAverage;
use crate::basic_types::sequence_generators::ConstantSequence;
use crate::basic_types::sequence_generators::GeometricSequence;
use crate::basic_types::sequence_generators::LubySequence;
use crate::basic_types::sequence_generators::SequenceGenerator;
use crate::basic_types::sequence_generators::SequenceGeneratorType;

/// Parameters of the restart policy; the defaults follow the Glucose
/// solver.
#[derive(Debug, Clone, Copy)]
pub struct RestartOptions {
    pub sequence_generator_type: SequenceGeneratorType,
    pub base_interval: u64,
    pub min_num_conflicts_before_first_restart: u64,
    pub lbd_coef: f64,
    pub num_assigned_coef: f64,
    pub num_assigned_window: u64,
    pub geometric_coef: Option<f64>,
}

impl Default for RestartOptions {
    fn default() -> Self {
        RestartOptions {
            sequence_generator_type: SequenceGeneratorType::Constant,
            base_interval: 50,
            min_num_conflicts_before_first_restart: 10000,
            lbd_coef: 1.25,
            num_assigned_coef: 1.4,
            num_assigned_window: 5000,
            geometric_coef: None,
        }
    }
}

/// Glucose-style restarts: restart when the recently learned clauses are
/// noticeably worse (higher LBD) than the long-term average, but block the
/// restart when the trail is longer than usual since the solver then appears
/// to be closing in on a solution.
#[derive(Debug)]
pub struct GlucoseRestartStrategy {
    restart_sequence_generator: Box<dyn SequenceGenerator>,
    num_conflicts_until_restart: i64,
    num_conflicts_encountered: i64,
    min_num_conflicts_before_first_restart: i64,
    lbd_short_term_moving_average: WindowedMovingAverage,
    lbd_coef: f64,
    lbd_long_term_moving_average: CumulativeMovingAverage,
    num_variables_coef: f64,
    num_assigned_variables_moving_average: WindowedMovingAverage,
    num_restarts: i64,
    num_blocked_restarts: i64,
}

impl GlucoseRestartStrategy {
    pub fn new(options: &RestartOptions) -> Self {
        let mut restart_sequence_generator: Box<dyn SequenceGenerator> =
            match options.sequence_generator_type {
                SequenceGeneratorType::Constant => {
                    Box::new(ConstantSequence::new(options.base_interval as i64))
                }
                SequenceGeneratorType::Geometric => Box::new(GeometricSequence::new(
                    options.base_interval as i64,
                    options.geometric_coef.expect(
                        "Using the geometric sequence for restarts requires the geometric coefficient.",
                    ),
                )),
                SequenceGeneratorType::Luby => {
                    Box::new(LubySequence::new(options.base_interval as i64))
                }
            };

        let num_conflicts_until_restart = restart_sequence_generator.next();

        GlucoseRestartStrategy {
            restart_sequence_generator,
            num_conflicts_until_restart,
            num_conflicts_encountered: 0,
            min_num_conflicts_before_first_restart: options.min_num_conflicts_before_first_restart
                as i64,
            lbd_short_term_moving_average: WindowedMovingAverage::new(options.base_interval),
            lbd_coef: options.lbd_coef,
            lbd_long_term_moving_average: CumulativeMovingAverage::default(),
            num_variables_coef: options.num_assigned_coef,
            num_assigned_variables_moving_average: WindowedMovingAverage::new(
                options.num_assigned_window,
            ),
            num_restarts: 0,
            num_blocked_restarts: 0,
        }
    }

    pub fn should_restart(&self) -> bool {
        // Early runtime statistics are too noisy to restart on.
        if self.num_conflicts_encountered < self.min_num_conflicts_before_first_restart {
            return false;
        }
        // A minimum number of conflicts has to take place after each
        // restart.
        if self.num_conflicts_until_restart > 0 {
            return false;
        }
        // Only restart if the solver is learning comparatively bad clauses.
        self.lbd_short_term_moving_average.value()
            > self.lbd_long_term_moving_average.value() * self.lbd_coef
    }

    pub fn notify_conflict(&mut self, lbd: u32, num_literals_on_trail: usize) {
        self.num_conflicts_encountered += 1;
        self.num_conflicts_until_restart -= 1;

        self.num_assigned_variables_moving_average
            .add_term(num_literals_on_trail as u64);
        self.lbd_short_term_moving_average.add_term(lbd as u64);
        self.lbd_long_term_moving_average.add_term(lbd as u64);

        // If more variables are assigned now than in the recent past the
        // restart is blocked: the solver seems 'closer' to a solution.
        if self.num_conflicts_encountered >= self.min_num_conflicts_before_first_restart
            && self.num_conflicts_until_restart <= 0
            && num_literals_on_trail as f64
                > self.num_assigned_variables_moving_average.value() * self.num_variables_coef
        {
            self.num_blocked_restarts += 1;
            self.num_conflicts_until_restart = self.restart_sequence_generator.next();
        }
    }

    pub fn notify_restart(&mut self) {
        self.num_restarts += 1;
        self.num_conflicts_until_restart = self.restart_sequence_generator.next();
        self.lbd_short_term_moving_average
            .adapt(self.num_conflicts_until_restart as u64);
    }

    pub fn num_restarts(&self) -> i64 {
        self.num_restarts
    }

    pub fn num_blocked_restarts(&self) -> i64 {
        self.num_blocked_restarts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_restart_before_the_first_conflict_threshold() {
        let options = RestartOptions {
            min_num_conflicts_before_first_restart: 100,
            ..RestartOptions::default()
        };
        let strategy = GlucoseRestartStrategy::new(&options);
        assert!(!strategy.should_restart());
    }

    #[test]
    fn bad_recent_lbd_triggers_a_restart() {
        let options = RestartOptions {
            base_interval: 2,
            min_num_conflicts_before_first_restart: 0,
            num_assigned_window: 100,
            ..RestartOptions::default()
        };
        let mut strategy = GlucoseRestartStrategy::new(&options);

        // Good clauses first, then markedly worse ones.
        for _ in 0..10 {
            strategy.notify_conflict(2, 50);
        }
        for _ in 0..10 {
            strategy.notify_conflict(20, 50);
        }

        assert!(strategy.should_restart());

        strategy.notify_restart();
        assert_eq!(strategy.num_restarts(), 1);
        assert!(!strategy.should_restart());
    }
}
