//! tg-schemas
//!
//! Shared primitives for the drawdown guard and the session gate:
//! - [`Clock`]: the single source of "now" (UTC) both gates consume
//! - [`TimeOfDay`]: strict `HH:MM` wall-clock times
//! - micros helpers for monetary values
//!
//! No IO. The only side effect anywhere in here is reading the system clock
//! inside [`SystemClock`].

mod clock;
mod money;
mod time_of_day;

pub use clock::{minute_bucket, Clock, ManualClock, SharedClock, SystemClock};
pub use money::{amount_to_micros, micros_to_f64, AmountError, MICROS_SCALE};
pub use time_of_day::{TimeOfDay, TimeOfDayError};
