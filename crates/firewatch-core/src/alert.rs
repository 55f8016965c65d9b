//! Fire alert derivation from the latest stored reading.

use firewatch_types::{AlertView, FireAlert};

use crate::history::HistoryBuffer;

/// Derive the fire alert from the newest entry of `history`.
///
/// Only the latest reading counts: an older fire followed by a clear
/// reading yields [`FireAlert::NoFire`].
pub fn derive(history: &HistoryBuffer) -> FireAlert {
    match history.latest() {
        None => FireAlert::NoData,
        Some(latest) if !latest.fire_detected => FireAlert::NoFire,
        Some(latest) => FireAlert::Alert(AlertView::from(latest)),
    }
}
