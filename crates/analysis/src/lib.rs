use model::*;
use std::time::Duration;

const GOOD_MIN: f64 = 18.0;
const GOOD_MAX: f64 = 20.0;
const OKAY_MAX: f64 = 30.0;

/// Maps a ground clearance length to a road state.
///
/// `[18, 20]` is good, `(20, 30]` okay, anything above 30 bad. Lower values,
/// negatives and NaN are reported as incorrectly entered data.
pub fn classify(length: f64) -> RoadState {
    if (GOOD_MIN..=GOOD_MAX).contains(&length) {
        RoadState::Good
    } else if length > GOOD_MAX && length <= OKAY_MAX {
        RoadState::Okay
    } else if length > OKAY_MAX {
        RoadState::Bad
    } else {
        RoadState::IncorrectlyEnteredData
    }
}

pub fn process_agent_data(input: &InputReading) -> ProcessedReading {
    ProcessedReading {
        road_state: classify(input.ground_clearance.length),
        agent_data: AgentReading {
            accelerometer: input.accelerometer,
            gps: input.gps,
            timestamp: input.timestamp,
        },
    }
}

/// Classifier with an optional artificial delay per reading, for simulating
/// a slow processing stage. Zero by default.
#[derive(Clone, Debug, Default)]
pub struct Classifier {
    pub simulated_latency: Duration,
}

impl Classifier {
    pub fn new(simulated_latency: Duration) -> Self {
        Self { simulated_latency }
    }

    pub fn process(&self, input: &InputReading) -> ProcessedReading {
        if !self.simulated_latency.is_zero() {
            std::thread::sleep(self.simulated_latency);
        }
        let out = process_agent_data(input);
        tracing::debug!(
            length = input.ground_clearance.length,
            road_state = %out.road_state,
            "classified reading"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn input(length: f64) -> InputReading {
        let gps = GpsReading { latitude: 50.45, longitude: 30.52 };
        InputReading {
            accelerometer: AccelerometerReading { x: 1.0, y: 2.0, z: 3.0 },
            gps,
            ground_clearance: GroundClearanceReading { length, gps },
            timestamp: datetime!(2024-03-01 10:00:00 UTC),
        }
    }

    #[test]
    fn test_boundaries() {
        assert_eq!(classify(18.0), RoadState::Good);
        assert_eq!(classify(20.0), RoadState::Good);
        assert_eq!(classify(20.0001), RoadState::Okay);
        assert_eq!(classify(30.0), RoadState::Okay);
        assert_eq!(classify(30.0001), RoadState::Bad);
        assert_eq!(classify(17.9), RoadState::IncorrectlyEnteredData);
        assert_eq!(classify(-5.0), RoadState::IncorrectlyEnteredData);
    }

    #[test]
    fn test_total_and_deterministic() {
        let odd = [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 0.0, -0.0, 1e300];
        for l in odd {
            let first = classify(l);
            assert!(RoadState::ALL.contains(&first));
            assert_eq!(classify(l), first);
        }
        assert_eq!(classify(f64::NAN), RoadState::IncorrectlyEnteredData);
        assert_eq!(classify(f64::INFINITY), RoadState::Bad);
    }

    #[test]
    fn test_process_keeps_agent_data() {
        let inp = input(25.0);
        let out = process_agent_data(&inp);
        assert_eq!(out.road_state, RoadState::Okay);
        assert_eq!(out.agent_data.accelerometer, inp.accelerometer);
        assert_eq!(out.agent_data.gps, inp.gps);
        assert_eq!(out.agent_data.timestamp, inp.timestamp);
    }

    #[test]
    fn test_classifier_without_latency() {
        let c = Classifier::default();
        assert_eq!(c.process(&input(45.0)).road_state, RoadState::Bad);
    }
}
