//! Client-side state synchronization for the taskboard dashboards.
//!
//! Push events and poll snapshots are merged by the [`reconciler`];
//! [`projection`] derives views from its snapshots; [`notify`] turns
//! admitted changes into transient alerts. [`dashboard`] wires all of it,
//! plus the push channel and the [`poller`], into one runtime.

pub mod actions;
pub mod dashboard;
pub mod log_ring;
pub mod notify;
pub mod poller;
pub mod projection;
pub mod reconciler;

pub use dashboard::{Dashboard, DashboardHandle, DashboardState, RuntimeConfig};
pub use reconciler::{Change, Reconciler, Snapshot, Update};
