// sbdl-core/src/domain/ports/clock.rs
//
// Sources of the two non-deterministic header fields. Injected into the
// envelope builder so tests can pin them.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait EventIdSource: Send + Sync {
    fn next_id(&self) -> String;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Random UUID v4, hyphenated lowercase.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomEventIds;

impl EventIdSource for RandomEventIds {
    fn next_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
