//! Shared type definitions for the Firewatch sensor hub.
//!
//! This crate is the single source of truth for the types that cross the
//! wire. The dashboard-facing ones flow to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Opaque subscriber connection identity
//! - [`reading`] -- The canonical sensor reading with open extensions
//! - [`alert`] -- Fire alert projection and outcomes
//! - [`stats`] -- Hub diagnostic counters

pub mod alert;
pub mod ids;
pub mod reading;
pub mod stats;

// Re-export all public types at crate root for convenience.
pub use alert::{AlertView, FireAlert, NO_FIRE_MESSAGE, NO_SENSOR_DATA_MESSAGE};
pub use ids::SubscriberId;
pub use reading::{CANONICAL_FIELDS, Reading};
pub use stats::HubStats;

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard types.

    #[test]
    fn export_bindings() {
        // Files are written to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::SubscriberId::export_all();
        let _ = crate::alert::AlertView::export_all();
        let _ = crate::stats::HubStats::export_all();
    }
}
