//! # merit-algo: merit-order dispatch
//!
//! Builds a cost-ranked stack of generating units for each weekly bucket and
//! reads hourly cost, emissions and fuel use off it.
//!
//! - [`MeritOrderBuilder`] / [`MeritOrder`]: costing, ranking, cumulative
//!   curves and the base/marginal split with minimum output
//! - [`MeritOrderBuilder::min_downtime_override`]: coal held at minimum
//!   output below an event threshold
//! - [`SubsetCurves`]: emissions of units in selected states
//! - [`DispatchSolver`]: the hourly loop over buckets and events
//!
//! ## Example
//!
//! ```ignore
//! use merit_algo::{BuilderOptions, MeritOrderBuilder};
//! use merit_core::Quantity;
//!
//! let mut builder = MeritOrderBuilder::new(table, BuilderOptions::default())?;
//! builder.select_bucket(10)?;
//! let order = builder.build()?;
//! let cost = order.full_total_at_demand(21_000.0, Quantity::Cost)?;
//! ```

pub mod curve;
pub mod dispatch;
pub mod io;
pub mod merit_order;
pub mod min_downtime;
pub mod subset;
pub mod test_utils;

pub use curve::{DomainPolicy, PiecewiseLinear, StepLookup};
pub use dispatch::{evaluate_hour, DispatchOutput, DispatchRecord, DispatchSolver, SubsetRecord};
pub use io::{
    dispatch_frame, events_frame, merit_order_frame, persist_dataframe, staged_output_path,
    subset_frame, OutputStage,
};
pub use merit_order::{
    generation_cost, BuilderOptions, MarginalField, MeritOrder, MeritOrderBuilder, MeritRow,
    ANCHOR_BLEND, ANCHOR_FLOOR_MW, ANCHOR_SPAN_FACTOR,
};
pub use min_downtime::snap_threshold;
pub use subset::SubsetCurves;
