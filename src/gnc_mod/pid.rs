use crate::error::{AutopilotError, Result};

// ---------------------------------------------------------------------------
// PID Controller (single axis) with squared-error and squared-derivative terms
// ---------------------------------------------------------------------------

/// Scalar controller. For more dimensions, combine several of these.
///
/// Besides the classic terms it carries `kp2` (error·|error|) and
/// `kd2` (derivative·|derivative|), which limit overshoot on actuators
/// with slow spin-up. The integral leaks away at `integral_leak` per second.
#[derive(Debug, Clone)]
pub struct Pid {
    pub kp: f64,
    pub kp2: f64,
    pub ki: f64,
    pub kd: f64,
    pub kd2: f64,
    pub integral_leak: f64,
    integral: f64,
    prev_error: f64,
    target: f64,
}

impl Pid {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self {
            kp,
            kp2: 0.0,
            ki,
            kd,
            kd2: 0.0,
            integral_leak: 0.001,
            integral: 0.0,
            prev_error: 0.0,
            target: 0.0,
        }
    }

    pub fn with_squared(mut self, kp2: f64, kd2: f64) -> Self {
        self.kp2 = kp2;
        self.kd2 = kd2;
        self
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn error(&self) -> f64 {
        self.prev_error
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn set_integral(&mut self, integral: f64) {
        self.integral = integral;
    }

    /// Moves the setpoint. The previous error shifts by the same amount so the
    /// next derivative sees no step.
    pub fn set_target(&mut self, target: f64) {
        self.prev_error += target - self.target;
        self.target = target;
    }

    /// Advances by `dt` seconds given the current measurement; returns the control output.
    pub fn advance(&mut self, dt: f64, measurement: f64) -> Result<f64> {
        if !(dt > 0.0) {
            return Err(AutopilotError::InvalidArgument { name: "dt", value: dt });
        }
        let error = self.target - measurement;
        self.integral *= (-self.integral_leak * dt).exp();
        self.integral += error * dt;
        let derivative = (error - self.prev_error) / dt;
        self.prev_error = error;
        Ok(self.kp2 * error * error.abs()
            + self.kp * error
            + self.ki * self.integral
            + self.kd * derivative
            + self.kd2 * derivative * derivative.abs())
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
    }
}

/// Largest approach speed that still allows stopping within `distance` at
/// constant deceleration `decel_rate` (braking distance, v = sqrt(2·r·d)).
pub fn max_velocity_for_distance_stoprate(distance: f64, decel_rate: f64) -> Result<f64> {
    if distance < 0.0 {
        return Err(AutopilotError::InvalidArgument { name: "distance", value: distance });
    }
    if decel_rate <= 0.0 {
        return Ok(0.0);
    }
    Ok((2.0 * decel_rate * distance).sqrt())
}
