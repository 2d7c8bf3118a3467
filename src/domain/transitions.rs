//! Transition tracking for physical units
//!
//! Compares consecutive sightings of the same persistent unit id and reports
//! configuration transitions and sequence anomalies. The status byte is
//! treated as an opaque value ordered modulo 256.

use crate::domain::models::{DeviceRecord, DeviceVariant, TransportAddress};
use serde::{Deserialize, Serialize};

/// State change or anomaly reported to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransitionEvent {
    /// Reference field flipped from all-zero to a participant address
    Configured { reference: TransportAddress },
    /// Reference field reverted to all-zero
    Reset {
        previous_reference: Option<TransportAddress>,
    },
    /// Configured unit started referencing a different participant
    ReferenceChanged {
        from: TransportAddress,
        to: TransportAddress,
    },
    SequenceAdvanced { from: u8, to: u8 },
    /// Status byte moved backwards outside of wraparound
    SequenceAnomaly { from: u8, to: u8 },
    /// Reference never confirmed by a matching virtual alias
    StuckTransition {
        reference: TransportAddress,
        since_ms: i64,
    },
}

impl TransitionEvent {
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::SequenceAnomaly { .. } | Self::StuckTransition { .. }
        )
    }
}

/// Fields of a sighting the tracker compares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    pub variant: DeviceVariant,
    pub status: u8,
    pub reference: Option<TransportAddress>,
}

impl From<&DeviceRecord> for Sighting {
    fn from(record: &DeviceRecord) -> Self {
        Self {
            variant: record.variant,
            status: record.status,
            reference: record.reference,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStep {
    Unchanged,
    Advanced,
    Regressed,
}

/// Forward distances of 1..=127 count as an advance, anything in the upper
/// half of the ring as a regression
pub fn sequence_step(from: u8, to: u8) -> SequenceStep {
    match to.wrapping_sub(from) {
        0 => SequenceStep::Unchanged,
        1..=127 => SequenceStep::Advanced,
        _ => SequenceStep::Regressed,
    }
}

#[derive(Debug, Clone)]
pub struct TransitionTracker {
    stuck_after_ms: i64,
}

impl TransitionTracker {
    pub fn new(stuck_after_ms: i64) -> Self {
        Self { stuck_after_ms }
    }

    pub fn stuck_after_ms(&self) -> i64 {
        self.stuck_after_ms
    }

    /// Events produced by moving from `previous` to `current`
    pub fn track(&self, previous: Option<&Sighting>, current: &Sighting) -> Vec<TransitionEvent> {
        let Some(previous) = previous else {
            return Vec::new();
        };

        use DeviceVariant::{ConfiguredPhysical, Unconfigured};
        let mut events = Vec::new();

        match (previous.variant, current.variant) {
            (Unconfigured, ConfiguredPhysical) => {
                if let Some(reference) = current.reference {
                    events.push(TransitionEvent::Configured { reference });
                }
            }
            (ConfiguredPhysical, Unconfigured) => {
                events.push(TransitionEvent::Reset {
                    previous_reference: previous.reference,
                });
            }
            (ConfiguredPhysical, ConfiguredPhysical) => {
                if let (Some(from), Some(to)) = (previous.reference, current.reference) {
                    if from != to {
                        events.push(TransitionEvent::ReferenceChanged { from, to });
                    }
                }
                let (from, to) = (previous.status, current.status);
                match sequence_step(from, to) {
                    SequenceStep::Unchanged => {}
                    SequenceStep::Advanced => {
                        events.push(TransitionEvent::SequenceAdvanced { from, to })
                    }
                    SequenceStep::Regressed => {
                        events.push(TransitionEvent::SequenceAnomaly { from, to })
                    }
                }
            }
            _ => {}
        }

        events
    }

    /// Stuck-transition check for a configured record whose reference has
    /// not been confirmed by an edge yet
    pub fn check_stuck(
        &self,
        record: &DeviceRecord,
        confirmed: bool,
        now_ms: i64,
    ) -> Option<TransitionEvent> {
        if confirmed || record.stale || record.variant != DeviceVariant::ConfiguredPhysical {
            return None;
        }
        let reference = record.reference?;
        let since_ms = record.reference_since_ms?;
        if now_ms.saturating_sub(since_ms) > self.stuck_after_ms {
            Some(TransitionEvent::StuckTransition {
                reference,
                since_ms,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::UnitId;

    fn addr(last: u8) -> TransportAddress {
        TransportAddress([0x36, 0xb6, 0x9d, 0xaf, 0x62, last])
    }

    fn sighting(variant: DeviceVariant, status: u8, reference: Option<TransportAddress>) -> Sighting {
        Sighting {
            variant,
            status,
            reference,
        }
    }

    #[test]
    fn test_sequence_step_wraps() {
        assert_eq!(sequence_step(10, 10), SequenceStep::Unchanged);
        assert_eq!(sequence_step(10, 11), SequenceStep::Advanced);
        assert_eq!(sequence_step(255, 0), SequenceStep::Advanced);
        assert_eq!(sequence_step(250, 3), SequenceStep::Advanced);
        assert_eq!(sequence_step(11, 10), SequenceStep::Regressed);
        assert_eq!(sequence_step(0, 255), SequenceStep::Regressed);
    }

    #[test]
    fn test_first_sighting_reports_nothing() {
        let tracker = TransitionTracker::new(1_000);
        let current = sighting(DeviceVariant::ConfiguredPhysical, 1, Some(addr(1)));
        assert!(tracker.track(None, &current).is_empty());
    }

    #[test]
    fn test_configure_and_reset() {
        let tracker = TransitionTracker::new(1_000);
        let reset = sighting(DeviceVariant::Unconfigured, 0x2c, None);
        let configured = sighting(DeviceVariant::ConfiguredPhysical, 0x2c, Some(addr(0xae)));

        assert_eq!(
            tracker.track(Some(&reset), &configured),
            vec![TransitionEvent::Configured {
                reference: addr(0xae)
            }]
        );
        assert_eq!(
            tracker.track(Some(&configured), &reset),
            vec![TransitionEvent::Reset {
                previous_reference: Some(addr(0xae))
            }]
        );
    }

    #[test]
    fn test_sequence_and_reference_changes() {
        let tracker = TransitionTracker::new(1_000);
        let before = sighting(DeviceVariant::ConfiguredPhysical, 5, Some(addr(1)));

        let advanced = sighting(DeviceVariant::ConfiguredPhysical, 6, Some(addr(1)));
        assert_eq!(
            tracker.track(Some(&before), &advanced),
            vec![TransitionEvent::SequenceAdvanced { from: 5, to: 6 }]
        );

        let regressed = sighting(DeviceVariant::ConfiguredPhysical, 3, Some(addr(2)));
        let events = tracker.track(Some(&before), &regressed);
        assert_eq!(
            events,
            vec![
                TransitionEvent::ReferenceChanged {
                    from: addr(1),
                    to: addr(2)
                },
                TransitionEvent::SequenceAnomaly { from: 5, to: 3 },
            ]
        );
        assert!(events[1].is_anomaly());
    }

    #[test]
    fn test_unconfigured_status_changes_are_ignored() {
        let tracker = TransitionTracker::new(1_000);
        let a = sighting(DeviceVariant::Unconfigured, 9, None);
        let b = sighting(DeviceVariant::Unconfigured, 2, None);
        assert!(tracker.track(Some(&a), &b).is_empty());
    }

    #[test]
    fn test_stuck_check() {
        let tracker = TransitionTracker::new(1_000);
        let record = DeviceRecord {
            unit_id: UnitId([1, 2, 3, 4, 5, 6]),
            variant: DeviceVariant::ConfiguredPhysical,
            addresses: Vec::new(),
            name: String::new(),
            first_seen_ms: 0,
            last_seen_ms: 0,
            status: 0,
            reference: Some(addr(7)),
            reference_since_ms: Some(100),
            signal_strength: 0,
            stale: false,
        };

        assert_eq!(tracker.check_stuck(&record, false, 1_100), None);
        assert_eq!(
            tracker.check_stuck(&record, false, 1_101),
            Some(TransitionEvent::StuckTransition {
                reference: addr(7),
                since_ms: 100
            })
        );
        assert_eq!(tracker.check_stuck(&record, true, 5_000), None);
    }

    #[test]
    fn test_stuck_check_at_clock_extremes() {
        let tracker = TransitionTracker::new(1_000);
        let mut record = DeviceRecord {
            unit_id: UnitId([1, 2, 3, 4, 5, 6]),
            variant: DeviceVariant::ConfiguredPhysical,
            addresses: Vec::new(),
            name: String::new(),
            first_seen_ms: i64::MIN,
            last_seen_ms: i64::MIN,
            status: 0,
            reference: Some(addr(7)),
            reference_since_ms: Some(i64::MIN),
            signal_strength: 0,
            stale: false,
        };
        assert!(tracker.check_stuck(&record, false, i64::MAX).is_some());

        record.reference_since_ms = Some(i64::MAX);
        assert_eq!(tracker.check_stuck(&record, false, i64::MIN), None);
    }
}
