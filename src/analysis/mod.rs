//! Analysis modules.
//!
//! The aggregator turns records into counts; the chart module derives
//! the domains, stacks and series a renderer needs from those counts.

pub mod aggregator;
pub mod chart;

pub use aggregator::*;
pub use chart::*;
