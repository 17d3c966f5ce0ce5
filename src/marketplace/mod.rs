//! Marketplace backend: wire types and the HTTP client behind the
//! [`Backend`] trait.

mod client;
mod types;

pub use client::{Backend, BackendError, HttpBackend};
pub use types::{
  Currency, DashboardData, DashboardQuery, GraphSlice, Notification, NotificationKind,
  RankedEntry, SaleGraph, Summary,
};
