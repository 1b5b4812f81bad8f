use std::time::{Duration, Instant};

/// Latency bookkeeping of one connection.
pub(crate) struct PingState {
    next_command_id: i8,
    in_flight: Option<(i8, Instant)>,
    ping: Option<Duration>,
    last_activity: Instant,
}

impl PingState {
    pub fn new(now: Instant) -> Self {
        Self {
            next_command_id: 0,
            in_flight: None,
            ping: None,
            last_activity: now,
        }
    }

    /// Records a ping being sent and returns the command id to send with it.
    /// A ping still in flight is forgotten.
    pub fn start(&mut self, now: Instant) -> i8 {
        let command_id = self.next_command_id;
        self.next_command_id = self.next_command_id.wrapping_add(1);
        self.in_flight = Some((command_id, now));
        command_id
    }

    /// Matches a pong against the ping in flight, returning the round trip.
    pub fn finish(&mut self, command_id: i8, now: Instant) -> Option<Duration> {
        match self.in_flight {
            Some((sent_id, sent_at)) if sent_id == command_id => {
                self.in_flight = None;
                let round_trip = now.saturating_duration_since(sent_at);
                self.ping = Some(round_trip);
                Some(round_trip)
            }
            _ => None,
        }
    }

    pub fn ping(&self) -> Option<Duration> {
        self.ping
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = self.last_activity.max(now);
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }
}
