//! Read-only network view handed to consumers
//!
//! A snapshot is an owned copy of the graph state at one point in time.
//! It contains stale records still inside their grace window so that
//! `get_device` keeps answering for them; list queries hide them.

use crate::domain::mesh::Diagnostics;
use crate::domain::models::{DeviceRecord, DeviceVariant, MeshEdge, TransportAddress, UnitId};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    /// Latest event or housekeeping time folded into this view
    pub taken_at_ms: i64,
    pub devices: Vec<DeviceRecord>,
    pub edges: Vec<MeshEdge>,
    /// Referenced addresses not yet confirmed by a virtual alias sighting
    pub pending_aliases: Vec<TransportAddress>,
    pub diagnostics: Diagnostics,
}

/// Per-category counts, as printed by the scan tools
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub unconfigured: usize,
    pub configured: usize,
    pub virtual_aliases: usize,
    pub unknown: usize,
    pub stale: usize,
    pub edges: usize,
    pub pending_aliases: usize,
}

/// Records that belong together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "relation", rename_all = "snake_case")]
pub enum RelatedGroup {
    /// Several logical records observed under one transport address
    SharedAddress {
        address: TransportAddress,
        units: Vec<UnitId>,
    },
    /// A physical node and the aliases it currently advertises
    MeshReference {
        physical: UnitId,
        aliases: Vec<TransportAddress>,
    },
}

impl NetworkSnapshot {
    fn active(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.devices.iter().filter(|d| !d.stale)
    }

    pub fn physical_devices(&self) -> Vec<DeviceRecord> {
        self.active()
            .filter(|d| d.variant.is_physical())
            .cloned()
            .collect()
    }

    pub fn virtual_aliases(&self) -> Vec<DeviceRecord> {
        self.active()
            .filter(|d| d.variant == DeviceVariant::VirtualAlias)
            .cloned()
            .collect()
    }

    pub fn unknown_devices(&self) -> Vec<DeviceRecord> {
        self.active()
            .filter(|d| d.variant == DeviceVariant::Unknown)
            .cloned()
            .collect()
    }

    pub fn mesh_edges(&self) -> Vec<MeshEdge> {
        self.edges.iter().filter(|e| !e.stale).cloned().collect()
    }

    /// Lookup by persistent unit id; virtual aliases answer to their address
    /// bytes. Stale records are still returned.
    pub fn get_device(&self, unit_id: &UnitId) -> Option<DeviceRecord> {
        self.devices
            .iter()
            .find(|d| d.unit_id == *unit_id && d.variant != DeviceVariant::VirtualAlias)
            .or_else(|| self.devices.iter().find(|d| d.unit_id == *unit_id))
            .cloned()
    }

    /// Virtual alias at `address`, or else the record most recently seen there
    pub fn get_device_by_address(&self, address: &TransportAddress) -> Option<DeviceRecord> {
        self.devices
            .iter()
            .find(|d| d.variant == DeviceVariant::VirtualAlias && d.unit_id.as_address() == *address)
            .or_else(|| {
                self.devices
                    .iter()
                    .filter(|d| d.addresses.contains(address))
                    .max_by_key(|d| d.last_seen_ms)
            })
            .cloned()
    }

    pub fn summary(&self) -> NetworkSummary {
        let mut summary = NetworkSummary {
            edges: self.edges.iter().filter(|e| !e.stale).count(),
            pending_aliases: self.pending_aliases.len(),
            ..Default::default()
        };
        for device in &self.devices {
            if device.stale {
                summary.stale += 1;
                continue;
            }
            match device.variant {
                DeviceVariant::Unconfigured => summary.unconfigured += 1,
                DeviceVariant::ConfiguredPhysical => summary.configured += 1,
                DeviceVariant::VirtualAlias => summary.virtual_aliases += 1,
                DeviceVariant::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    pub fn related_groups(&self) -> Vec<RelatedGroup> {
        let mut by_address: BTreeMap<TransportAddress, Vec<UnitId>> = BTreeMap::new();
        for device in &self.devices {
            for address in &device.addresses {
                let units = by_address.entry(*address).or_default();
                if !units.contains(&device.unit_id) {
                    units.push(device.unit_id);
                }
            }
        }

        let mut groups: Vec<RelatedGroup> = by_address
            .into_iter()
            .filter(|(_, units)| units.len() > 1)
            .map(|(address, units)| RelatedGroup::SharedAddress { address, units })
            .collect();

        let mut by_physical: BTreeMap<UnitId, Vec<TransportAddress>> = BTreeMap::new();
        for edge in self.edges.iter().filter(|e| !e.stale) {
            by_physical.entry(edge.physical).or_default().push(edge.alias);
        }
        groups.extend(
            by_physical
                .into_iter()
                .map(|(physical, aliases)| RelatedGroup::MeshReference { physical, aliases }),
        );
        groups
    }

    pub fn to_json_pretty(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the snapshot as a JSON document
    pub fn export(&self, path: &Path) -> anyhow::Result<()> {
        let json = self.to_json_pretty()?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write snapshot to {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(unit: u8, variant: DeviceVariant, address: u8, stale: bool) -> DeviceRecord {
        DeviceRecord {
            unit_id: UnitId([unit; 6]),
            variant,
            addresses: vec![TransportAddress([address; 6])],
            name: String::new(),
            first_seen_ms: 0,
            last_seen_ms: 0,
            status: 0,
            reference: None,
            reference_since_ms: None,
            signal_strength: -60,
            stale,
        }
    }

    fn sample() -> NetworkSnapshot {
        NetworkSnapshot {
            taken_at_ms: 10,
            devices: vec![
                record(1, DeviceVariant::Unconfigured, 0xa1, false),
                record(2, DeviceVariant::ConfiguredPhysical, 0xa1, false),
                record(3, DeviceVariant::VirtualAlias, 3, false),
                record(4, DeviceVariant::Unknown, 0xa4, false),
                record(5, DeviceVariant::ConfiguredPhysical, 0xa5, true),
            ],
            edges: vec![
                MeshEdge {
                    physical: UnitId([2; 6]),
                    alias: TransportAddress([3; 6]),
                    created_ms: 0,
                    last_confirmed_ms: 5,
                    stale: false,
                },
                MeshEdge {
                    physical: UnitId([5; 6]),
                    alias: TransportAddress([9; 6]),
                    created_ms: 0,
                    last_confirmed_ms: 0,
                    stale: true,
                },
            ],
            pending_aliases: vec![TransportAddress([7; 6])],
            diagnostics: Diagnostics::default(),
        }
    }

    #[test]
    fn test_queries_hide_stale_records() {
        let snapshot = sample();
        assert_eq!(snapshot.physical_devices().len(), 2);
        assert_eq!(snapshot.virtual_aliases().len(), 1);
        assert_eq!(snapshot.unknown_devices().len(), 1);
        assert_eq!(snapshot.mesh_edges().len(), 1);
        assert!(snapshot.get_device(&UnitId([5; 6])).unwrap().stale);
    }

    #[test]
    fn test_lookup_by_address() {
        let snapshot = sample();
        let alias = snapshot
            .get_device_by_address(&TransportAddress([3; 6]))
            .unwrap();
        assert_eq!(alias.variant, DeviceVariant::VirtualAlias);
        assert!(snapshot
            .get_device_by_address(&TransportAddress([0xa4; 6]))
            .is_some());
        assert!(snapshot
            .get_device_by_address(&TransportAddress([0xee; 6]))
            .is_none());
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(
            summary,
            NetworkSummary {
                unconfigured: 1,
                configured: 1,
                virtual_aliases: 1,
                unknown: 1,
                stale: 1,
                edges: 1,
                pending_aliases: 1,
            }
        );
    }

    #[test]
    fn test_related_groups() {
        let groups = sample().related_groups();
        assert_eq!(
            groups,
            vec![
                RelatedGroup::SharedAddress {
                    address: TransportAddress([0xa1; 6]),
                    units: vec![UnitId([1; 6]), UnitId([2; 6])],
                },
                RelatedGroup::MeshReference {
                    physical: UnitId([2; 6]),
                    aliases: vec![TransportAddress([3; 6])],
                },
            ]
        );
    }

    #[test]
    fn test_json_export_roundtrips() {
        let snapshot = sample();
        let json = snapshot.to_json_pretty().unwrap();
        let back: NetworkSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
