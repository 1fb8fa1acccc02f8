use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::config::DigestConfig;

use super::SchedulerError;

/// When scheduled digests fire
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Seconds-first cron expression, evaluated in UTC
    Cron {
        expression: String,
        schedule: Box<cron::Schedule>,
    },
    /// Fixed delay measured from when the timer is armed
    Interval(Duration),
}

impl Cadence {
    pub fn cron(expression: &str) -> Result<Self, SchedulerError> {
        let schedule = cron::Schedule::from_str(expression)
            .map_err(|e| SchedulerError::InvalidCadence(format!("{}: {}", expression, e)))?;

        Ok(Cadence::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
        })
    }

    pub fn interval(every: Duration) -> Result<Self, SchedulerError> {
        if every.is_zero() {
            return Err(SchedulerError::InvalidCadence(
                "interval must be greater than zero".to_string(),
            ));
        }
        if chrono::Duration::from_std(every).is_err() {
            return Err(SchedulerError::InvalidCadence(format!(
                "interval of {}s is out of range",
                every.as_secs()
            )));
        }
        Ok(Cadence::Interval(every))
    }

    /// Cron expression when set, otherwise the interval.
    pub fn from_settings(settings: &DigestConfig) -> Result<Self, SchedulerError> {
        match settings.cron.as_deref().map(str::trim) {
            Some(expression) if !expression.is_empty() => Self::cron(expression),
            _ => Self::interval(Duration::from_secs(settings.interval_seconds)),
        }
    }

    /// Next fire time strictly after `after`.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Cadence::Cron { schedule, .. } => schedule.after(&after).next(),
            Cadence::Interval(every) => chrono::Duration::from_std(*every)
                .ok()
                .and_then(|step| after.checked_add_signed(step)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Cadence::Cron { expression, .. } => format!("cron({})", expression),
            Cadence::Interval(every) => format!("every {}s", every.as_secs_f64()),
        }
    }
}
