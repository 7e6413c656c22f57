/// Exponential smoother for the primary target range.
///
/// Initializes on the first non-zero observation; zero observations (no
/// primary target that frame) leave the state untouched.
#[derive(Debug, Clone)]
pub struct DepthSmoother {
    alpha: f64,
    value: Option<f64>,
}

impl DepthSmoother {
    pub fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    pub fn update(&mut self, observation_cm: f64) -> Option<f64> {
        if observation_cm > 0.0 {
            let next = match self.value {
                None => observation_cm,
                Some(previous) => self.alpha * observation_cm + (1.0 - self.alpha) * previous,
            };
            self.value = Some(next);
        }
        self.value
    }

    pub fn current_cm(&self) -> Option<f64> {
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initializes_on_first_non_zero_observation() {
        let mut smoother = DepthSmoother::new(0.1);
        assert_eq!(smoother.update(0.0), None);
        assert_eq!(smoother.update(120.0), Some(120.0));
    }

    #[test]
    fn zero_observations_leave_state_unchanged() {
        let mut smoother = DepthSmoother::new(0.1);
        smoother.update(100.0);
        assert_eq!(smoother.update(0.0), Some(100.0));
        assert_eq!(smoother.current_cm(), Some(100.0));
    }

    #[test]
    fn converges_towards_a_step_change() {
        let mut smoother = DepthSmoother::new(0.1);
        smoother.update(100.0);
        let next = smoother.update(200.0).unwrap();
        assert!((next - 110.0).abs() < 1e-9);
    }

    #[test]
    fn unit_alpha_is_identity() {
        let mut smoother = DepthSmoother::new(1.0);
        smoother.update(100.0);
        assert_eq!(smoother.update(250.0), Some(250.0));
        assert_eq!(smoother.update(90.0), Some(90.0));
    }
}
