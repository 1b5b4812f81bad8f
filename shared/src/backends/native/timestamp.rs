use std::time::{Duration, SystemTime};

/// Error type for timestamp operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// System time is before UNIX epoch
    SystemTimeBeforeEpoch,
}

impl std::fmt::Display for TimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeError::SystemTimeBeforeEpoch => {
                write!(f, "System time is before UNIX epoch")
            }
        }
    }
}

impl std::error::Error for TimeError {}

/// Wall-clock time as carried on the wire: milliseconds since UNIX epoch.
pub struct Timestamp;

impl Timestamp {
    /// Returns the current time in milliseconds since UNIX epoch.
    ///
    /// # Errors
    /// Returns `TimeError::SystemTimeBeforeEpoch` if system time is before UNIX epoch.
    pub fn try_now_millis() -> Result<i64, TimeError> {
        Self::millis_of(SystemTime::now())
    }

    /// Current time in milliseconds, falling back to 0 on a clock set before the epoch.
    pub fn now_millis() -> i64 {
        Self::try_now_millis().unwrap_or(0)
    }

    pub fn millis_of(time: SystemTime) -> Result<i64, TimeError> {
        time.duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
            .map_err(|_| TimeError::SystemTimeBeforeEpoch)
    }

    pub fn from_millis(millis: i64) -> SystemTime {
        let offset = Duration::from_millis(millis.unsigned_abs());
        if millis >= 0 {
            SystemTime::UNIX_EPOCH + offset
        } else {
            SystemTime::UNIX_EPOCH - offset
        }
    }
}
