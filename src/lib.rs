//! NPS pension projection: monthly corpus simulation, annuity split and
//! the reports built on top of it.

pub mod api;
pub mod core;
pub mod report;
