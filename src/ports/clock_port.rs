//! Wall-clock port trait.

use chrono::NaiveDateTime;

pub trait Clock {
    /// Current local wall-clock time.
    fn now(&self) -> NaiveDateTime;
}
