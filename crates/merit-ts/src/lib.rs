//! Time handling for dispatch runs: the weekly bucket calendar and the
//! minimum-downtime event detector that scans an hourly demand series.

pub mod calendar;
pub mod min_downtime;

pub use calendar::{BucketCalendar, BucketWindow};
pub use min_downtime::MinDowntimeDetector;
