use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of the interruption countdown. "Continue" to the evaluation is
/// only enabled once the gate is `Expired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GatePhase {
    Idle,
    Counting,
    Expired,
}

/// Countdown gate between the activity and the evaluation.
///
/// A pure state machine: `start` moves idle -> counting, `tick` decrements
/// one second and expires at zero, `reset` returns to idle with the full
/// configured duration (partial progress is deliberately discarded; the
/// duration is a clinical parameter, not a security timeout).
#[derive(Debug, Clone)]
pub struct InterruptionGate {
    duration_seconds: u32,
    remaining_seconds: u32,
    phase: GatePhase,
}

impl InterruptionGate {
    pub fn new(duration_seconds: u32) -> Self {
        Self {
            duration_seconds,
            remaining_seconds: duration_seconds,
            phase: GatePhase::Idle,
        }
    }

    pub fn phase(&self) -> GatePhase {
        self.phase
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.remaining_seconds
    }

    pub fn start(&mut self) {
        if self.phase == GatePhase::Idle {
            self.phase = if self.remaining_seconds == 0 {
                GatePhase::Expired
            } else {
                GatePhase::Counting
            };
        }
    }

    /// Advance the countdown by one second.
    pub fn tick(&mut self) -> GatePhase {
        if self.phase == GatePhase::Counting {
            self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
            if self.remaining_seconds == 0 {
                self.phase = GatePhase::Expired;
            }
        }
        self.phase
    }

    /// Back to idle with the configured duration restored.
    pub fn reset(&mut self) {
        self.remaining_seconds = self.duration_seconds;
        self.phase = GatePhase::Idle;
    }

    pub fn can_continue(&self) -> bool {
        self.phase == GatePhase::Expired
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InterruptionEvent {
    InterruptionTick(InterruptionTick),
    InterruptionExpired(InterruptionExpired),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptionTick {
    pub session_id: String,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct InterruptionExpired {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub continue_enabled: bool,
}

impl InterruptionEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            InterruptionEvent::InterruptionTick(_) => "interruption-tick",
            InterruptionEvent::InterruptionExpired(_) => "interruption-expired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_counts_down_to_expired() {
        let mut gate = InterruptionGate::new(3);
        assert_eq!(gate.phase(), GatePhase::Idle);
        assert!(!gate.can_continue());

        gate.start();
        assert_eq!(gate.phase(), GatePhase::Counting);

        assert_eq!(gate.tick(), GatePhase::Counting);
        assert_eq!(gate.remaining_seconds(), 2);
        assert_eq!(gate.tick(), GatePhase::Counting);
        assert_eq!(gate.tick(), GatePhase::Expired);
        assert!(gate.can_continue());

        // Further ticks stay expired without underflow
        assert_eq!(gate.tick(), GatePhase::Expired);
        assert_eq!(gate.remaining_seconds(), 0);
    }

    #[test]
    fn reset_discards_partial_progress() {
        let mut gate = InterruptionGate::new(5);
        gate.start();
        gate.tick();
        gate.tick();
        assert_eq!(gate.remaining_seconds(), 3);

        gate.reset();
        assert_eq!(gate.phase(), GatePhase::Idle);
        assert_eq!(gate.remaining_seconds(), 5);
        assert!(!gate.can_continue());
    }

    #[test]
    fn tick_does_nothing_while_idle() {
        let mut gate = InterruptionGate::new(2);
        assert_eq!(gate.tick(), GatePhase::Idle);
        assert_eq!(gate.remaining_seconds(), 2);
    }

    #[test]
    fn one_second_gate_expires_on_first_tick() {
        let mut gate = InterruptionGate::new(1);
        gate.start();
        assert_eq!(gate.tick(), GatePhase::Expired);
        assert!(gate.can_continue());
    }
}
