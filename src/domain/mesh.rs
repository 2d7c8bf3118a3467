//! Identity resolution and mesh graph
//!
//! [`MeshGraph`] is the single writer for device records and mesh edges.
//! Records live in an arena keyed by [`NodeId`]; an identity table maps
//! persistent unit ids (physical and unknown records) or transport addresses
//! (virtual aliases) onto it, and a reverse index tracks which physical nodes
//! currently reference a given address. Edges are kept in their own
//! collection keyed by node pairs, so teardown and eviction never chase
//! references stored inside records.

use crate::domain::classifier::classify_with;
use crate::domain::models::{
    AdvertisementEvent, DecodedPayload, DeviceRecord, DeviceVariant, MeshEdge, TransportAddress,
    UnitId,
};
use crate::domain::settings::{ConfigError, MeshSettings};
use crate::domain::snapshot::NetworkSnapshot;
use crate::domain::transitions::{Sighting, TransitionEvent, TransitionTracker};
use crate::infrastructure::bluetooth::protocol::{decode_payload, DecodeError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

/// Stable arena index of a device record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum IdentityKey {
    Unit(UnitId),
    Address(TransportAddress),
}

#[derive(Debug, Clone)]
struct Node {
    key: IdentityKey,
    record: DeviceRecord,
    /// An edge has been established for the current reference
    reference_confirmed: bool,
    stuck_reported: bool,
}

#[derive(Debug, Clone)]
struct Edge {
    created_ms: i64,
    last_confirmed_ms: i64,
    stale: bool,
}

/// Counters for events that never reach the graph or land in `Unknown`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub events: u64,
    pub unrecognized_vendor: u64,
    pub malformed_payloads: u64,
    pub ambiguous_classifications: u64,
    pub anomalies: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeUpdate {
    Created {
        physical: UnitId,
        alias: TransportAddress,
    },
    Refreshed {
        physical: UnitId,
        alias: TransportAddress,
    },
    Removed {
        physical: UnitId,
        alias: TransportAddress,
    },
    MarkedStale {
        physical: UnitId,
        alias: TransportAddress,
    },
}

/// Result of one `observe` call
#[derive(Debug, Clone)]
pub struct Observation {
    pub record: DeviceRecord,
    pub created: bool,
    pub transitions: Vec<TransitionEvent>,
    pub edge_updates: Vec<EdgeUpdate>,
}

#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// No payload for the recognized company id
    Ignored,
    /// Payload present but malformed; nothing was mutated
    Rejected(DecodeError),
    Observed(Observation),
}

/// Result of one housekeeping pass
#[derive(Debug, Clone, Default)]
pub struct Housekeeping {
    pub newly_stale: Vec<DeviceRecord>,
    pub purged: Vec<DeviceRecord>,
    pub edge_updates: Vec<EdgeUpdate>,
    pub transitions: Vec<(DeviceRecord, TransitionEvent)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub type Subscriber = Box<dyn FnMut(&DeviceRecord, &TransitionEvent) + Send>;

/// Decode and classify one advertisement without touching any state.
///
/// Returns `Ok(None)` when the advertisement carries no payload for the
/// configured company id.
pub fn prepare(
    event: &AdvertisementEvent,
    settings: &MeshSettings,
) -> Result<Option<(DecodedPayload, DeviceVariant)>, DecodeError> {
    let Some(bytes) = event.vendor_payloads.get(&settings.company_id) else {
        return Ok(None);
    };
    let payload = decode_payload(bytes)?;
    let variant = classify_with(
        &payload,
        &event.service_identifiers,
        event.transport_address,
        &settings.service_uuids,
    );
    Ok(Some((payload, variant)))
}

pub struct MeshGraph {
    settings: MeshSettings,
    tracker: TransitionTracker,
    next_node: u64,
    nodes: BTreeMap<NodeId, Node>,
    identities: HashMap<IdentityKey, NodeId>,
    referrers: BTreeMap<TransportAddress, BTreeSet<NodeId>>,
    edges: BTreeMap<(NodeId, NodeId), Edge>,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_subscription: u64,
    diagnostics: Diagnostics,
    clock_ms: i64,
}

impl std::fmt::Debug for MeshGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshGraph")
            .field("nodes", &self.nodes.len())
            .field("edges", &self.edges.len())
            .field("subscribers", &self.subscribers.len())
            .field("diagnostics", &self.diagnostics)
            .finish()
    }
}

impl MeshGraph {
    pub fn new(settings: MeshSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            tracker: TransitionTracker::new(settings.stuck_after_ms),
            settings,
            next_node: 0,
            nodes: BTreeMap::new(),
            identities: HashMap::new(),
            referrers: BTreeMap::new(),
            edges: BTreeMap::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            diagnostics: Diagnostics::default(),
            clock_ms: 0,
        })
    }

    pub fn settings(&self) -> &MeshSettings {
        &self.settings
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register a callback for transitions and anomalies
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: FnMut(&DeviceRecord, &TransitionEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    /// Vendor filter, decode, classify and observe one advertisement
    pub fn ingest(&mut self, event: &AdvertisementEvent) -> IngestOutcome {
        self.diagnostics.events += 1;
        match prepare(event, &self.settings) {
            Ok(Some((payload, variant))) => {
                IngestOutcome::Observed(self.observe(event, &payload, variant))
            }
            Ok(None) => {
                self.diagnostics.unrecognized_vendor += 1;
                debug!(
                    "Ignoring {}: no payload for company id {}",
                    event.transport_address, self.settings.company_id
                );
                IngestOutcome::Ignored
            }
            Err(e) => {
                self.diagnostics.malformed_payloads += 1;
                debug!("Discarding advertisement from {}: {}", event.transport_address, e);
                IngestOutcome::Rejected(e)
            }
        }
    }

    /// Fold one classified sighting into the graph
    pub fn observe(
        &mut self,
        event: &AdvertisementEvent,
        payload: &DecodedPayload,
        variant: DeviceVariant,
    ) -> Observation {
        let now = event.observed_at_ms;
        self.clock_ms = self.clock_ms.max(now);
        if variant == DeviceVariant::Unknown {
            self.diagnostics.ambiguous_classifications += 1;
        }

        // Short frames only identify the transport they were heard on
        let key = match (variant, payload) {
            (DeviceVariant::VirtualAlias, _) | (DeviceVariant::Unknown, DecodedPayload::Short(_)) => {
                IdentityKey::Address(event.transport_address)
            }
            _ => IdentityKey::Unit(payload.unit_id()),
        };
        let (id, created) = self.resolve(key, payload, variant, now);

        let current = Sighting {
            variant,
            status: payload.status(),
            reference: payload.reference(),
        };
        let previous = if created {
            None
        } else {
            self.nodes.get(&id).map(|n| Sighting::from(&n.record))
        };
        let mut transitions = match key {
            IdentityKey::Unit(_) => self.tracker.track(previous.as_ref(), &current),
            IdentityKey::Address(_) => Vec::new(),
        };

        self.update_record(id, event, &current);

        let mut edge_updates = Vec::new();
        match variant {
            DeviceVariant::Unconfigured | DeviceVariant::ConfiguredPhysical => {
                self.apply_reference(id, current.reference, now, &mut edge_updates);
                if variant == DeviceVariant::Unconfigured {
                    self.teardown_outgoing(id, &mut edge_updates);
                }
            }
            DeviceVariant::VirtualAlias => {
                self.link_referrers(id, event.transport_address, now, &mut edge_updates);
            }
            DeviceVariant::Unknown => {}
        }
        self.propagate_names_around(id);

        if let Some(stuck) = self.check_stuck(id, now) {
            transitions.push(stuck);
        }

        let record = self.nodes[&id].record.clone();

        if created {
            info!(
                "New {} record {} at {}",
                record.variant, record.unit_id, event.transport_address
            );
        }
        for transition in &transitions {
            if transition.is_anomaly() {
                self.diagnostics.anomalies += 1;
                warn!("Anomaly on {}: {:?}", record.unit_id, transition);
            } else {
                debug!("Transition on {}: {:?}", record.unit_id, transition);
            }
        }
        let notifications: Vec<_> = transitions
            .iter()
            .map(|t| (record.clone(), t.clone()))
            .collect();
        self.notify(&notifications);

        Observation {
            record,
            created,
            transitions,
            edge_updates,
        }
    }

    fn resolve(
        &mut self,
        key: IdentityKey,
        payload: &DecodedPayload,
        variant: DeviceVariant,
        now: i64,
    ) -> (NodeId, bool) {
        if let Some(id) = self.identities.get(&key) {
            return (*id, false);
        }

        let id = NodeId(self.next_node);
        self.next_node += 1;
        let unit_id = match key {
            IdentityKey::Unit(unit) => unit,
            IdentityKey::Address(address) => UnitId::from(address),
        };
        let record = DeviceRecord {
            unit_id,
            variant,
            addresses: Vec::new(),
            name: String::new(),
            first_seen_ms: now,
            last_seen_ms: now,
            status: payload.status(),
            reference: None,
            reference_since_ms: None,
            signal_strength: 0,
            stale: false,
        };
        self.nodes.insert(
            id,
            Node {
                key,
                record,
                reference_confirmed: false,
                stuck_reported: false,
            },
        );
        self.identities.insert(key, id);
        (id, true)
    }

    fn update_record(&mut self, id: NodeId, event: &AdvertisementEvent, current: &Sighting) {
        let limit = self.settings.address_history_limit;
        let Some(node) = self.nodes.get_mut(&id) else {
            return;
        };
        let record = &mut node.record;
        // An ambiguous sighting never demotes a classified record
        if current.variant != DeviceVariant::Unknown || record.variant == DeviceVariant::Unknown {
            record.variant = current.variant;
            record.status = current.status;
        }
        record.signal_strength = event.signal_strength;
        record.last_seen_ms = record.last_seen_ms.max(event.observed_at_ms);
        record.stale = false;

        record.addresses.retain(|a| *a != event.transport_address);
        record.addresses.push(event.transport_address);
        if record.addresses.len() > limit {
            let excess = record.addresses.len() - limit;
            record.addresses.drain(..excess);
        }

        if let Some(name) = event.name() {
            record.name = name.to_string();
        }
    }

    /// Move a physical node's reference, tearing down the edge of the old one
    /// and linking the new one when its alias is already known
    fn apply_reference(
        &mut self,
        id: NodeId,
        reference: Option<TransportAddress>,
        now: i64,
        updates: &mut Vec<EdgeUpdate>,
    ) {
        let old = match self.nodes.get(&id) {
            Some(node) => node.record.reference,
            None => return,
        };

        if old != reference {
            if let Some(old) = old {
                if let Some(set) = self.referrers.get_mut(&old) {
                    set.remove(&id);
                    if set.is_empty() {
                        self.referrers.remove(&old);
                    }
                }
                if let Some(alias) = self.identities.get(&IdentityKey::Address(old)).copied() {
                    self.remove_edge(id, alias, updates);
                }
            }
            if let Some(new) = reference {
                self.referrers.entry(new).or_default().insert(id);
            }
            if let Some(node) = self.nodes.get_mut(&id) {
                node.record.reference = reference;
                node.record.reference_since_ms = reference.map(|_| now);
                node.reference_confirmed = false;
                node.stuck_reported = false;
            }
        }

        if let Some(reference) = reference {
            if let Some(alias) = self.identities.get(&IdentityKey::Address(reference)).copied() {
                let alias_live = self.nodes.get(&alias).is_some_and(|n| !n.record.stale);
                if alias_live {
                    self.link(id, alias, now, updates);
                }
            }
        }
    }

    fn link_referrers(
        &mut self,
        alias: NodeId,
        address: TransportAddress,
        now: i64,
        updates: &mut Vec<EdgeUpdate>,
    ) {
        let physicals: Vec<NodeId> = self
            .referrers
            .get(&address)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        for physical in physicals {
            let live = self.nodes.get(&physical).is_some_and(|n| !n.record.stale);
            if live {
                self.link(physical, alias, now, updates);
            }
        }
    }

    fn link(&mut self, physical: NodeId, alias: NodeId, now: i64, updates: &mut Vec<EdgeUpdate>) {
        let Some((physical_id, alias_address)) = self.edge_endpoints(physical, alias) else {
            return;
        };
        match self.edges.get_mut(&(physical, alias)) {
            Some(edge) => {
                edge.last_confirmed_ms = edge.last_confirmed_ms.max(now);
                edge.stale = false;
                updates.push(EdgeUpdate::Refreshed {
                    physical: physical_id,
                    alias: alias_address,
                });
            }
            None => {
                self.edges.insert(
                    (physical, alias),
                    Edge {
                        created_ms: now,
                        last_confirmed_ms: now,
                        stale: false,
                    },
                );
                info!("Mesh edge {} -> {}", physical_id, alias_address);
                updates.push(EdgeUpdate::Created {
                    physical: physical_id,
                    alias: alias_address,
                });
            }
        }
        if let Some(node) = self.nodes.get_mut(&physical) {
            node.reference_confirmed = true;
        }
        self.propagate_names(physical, alias);
    }

    fn remove_edge(&mut self, physical: NodeId, alias: NodeId, updates: &mut Vec<EdgeUpdate>) {
        if self.edges.remove(&(physical, alias)).is_some() {
            if let Some((physical_id, alias_address)) = self.edge_endpoints(physical, alias) {
                debug!("Removed mesh edge {} -> {}", physical_id, alias_address);
                updates.push(EdgeUpdate::Removed {
                    physical: physical_id,
                    alias: alias_address,
                });
            }
        }
    }

    fn teardown_outgoing(&mut self, physical: NodeId, updates: &mut Vec<EdgeUpdate>) {
        let targets: Vec<NodeId> = self
            .edges
            .keys()
            .filter(|(from, _)| *from == physical)
            .map(|(_, to)| *to)
            .collect();
        for alias in targets {
            self.remove_edge(physical, alias, updates);
        }
    }

    fn edge_endpoints(&self, physical: NodeId, alias: NodeId) -> Option<(UnitId, TransportAddress)> {
        let physical = self.nodes.get(&physical)?;
        let alias = self.nodes.get(&alias)?;
        let address = match alias.key {
            IdentityKey::Address(address) => address,
            IdentityKey::Unit(unit) => unit.as_address(),
        };
        Some((physical.record.unit_id, address))
    }

    /// Names only flow into empty fields
    fn propagate_names(&mut self, physical: NodeId, alias: NodeId) {
        let (physical_name, alias_name) = match (self.nodes.get(&physical), self.nodes.get(&alias)) {
            (Some(p), Some(a)) => (p.record.name.clone(), a.record.name.clone()),
            _ => return,
        };
        let (target, name) = match (physical_name.is_empty(), alias_name.is_empty()) {
            (true, false) => (physical, alias_name),
            (false, true) => (alias, physical_name),
            _ => return,
        };
        if let Some(node) = self.nodes.get_mut(&target) {
            debug!("Propagating name {:?} to {}", name, node.record.unit_id);
            node.record.name = name;
        }
    }

    fn propagate_names_around(&mut self, id: NodeId) {
        let pairs: Vec<(NodeId, NodeId)> = self
            .edges
            .iter()
            .filter(|((from, to), edge)| !edge.stale && (*from == id || *to == id))
            .map(|(pair, _)| *pair)
            .collect();
        for (physical, alias) in pairs {
            self.propagate_names(physical, alias);
        }
    }

    fn check_stuck(&mut self, id: NodeId, now: i64) -> Option<TransitionEvent> {
        let node = self.nodes.get_mut(&id)?;
        if node.stuck_reported {
            return None;
        }
        let event = self
            .tracker
            .check_stuck(&node.record, node.reference_confirmed, now)?;
        node.stuck_reported = true;
        Some(event)
    }

    fn notify(&mut self, notifications: &[(DeviceRecord, TransitionEvent)]) {
        for (record, event) in notifications {
            for (_, subscriber) in self.subscribers.iter_mut() {
                subscriber(record, event);
            }
        }
    }

    /// Periodic housekeeping: mark silent records and edges stale, purge
    /// those past the grace window and report stuck transitions
    pub fn evict(&mut self, now_ms: i64) -> Housekeeping {
        self.clock_ms = self.clock_ms.max(now_ms);
        let stale_after = self.settings.stale_after_ms;
        let purge_after = self.settings.purge_after_ms;
        let mut report = Housekeeping::default();

        let mut to_purge = Vec::new();
        let mut to_stale = Vec::new();
        for (id, node) in &self.nodes {
            let silence = now_ms.saturating_sub(node.record.last_seen_ms);
            if silence > purge_after {
                to_purge.push(*id);
            } else if silence > stale_after && !node.record.stale {
                to_stale.push(*id);
            }
        }

        for id in to_stale {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.record.stale = true;
                debug!("Record {} is stale", node.record.unit_id);
                report.newly_stale.push(node.record.clone());
            }
            self.teardown_outgoing(id, &mut report.edge_updates);
            let incoming: Vec<(NodeId, NodeId)> = self
                .edges
                .keys()
                .filter(|(_, to)| *to == id)
                .copied()
                .collect();
            for (physical, alias) in incoming {
                self.mark_edge_stale(physical, alias, &mut report.edge_updates);
            }
        }

        for id in to_purge {
            if let Some(record) = self.purge(id, &mut report.edge_updates) {
                info!("Purged record {}", record.unit_id);
                report.purged.push(record);
            }
        }

        let mut expired = Vec::new();
        let mut aged = Vec::new();
        for (pair, edge) in &self.edges {
            let silence = now_ms.saturating_sub(edge.last_confirmed_ms);
            if silence > purge_after {
                expired.push(*pair);
            } else if silence > stale_after && !edge.stale {
                aged.push(*pair);
            }
        }
        for (physical, alias) in aged {
            self.mark_edge_stale(physical, alias, &mut report.edge_updates);
        }
        for (physical, alias) in expired {
            self.remove_edge(physical, alias, &mut report.edge_updates);
        }

        let ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        for id in ids {
            if let Some(event) = self.check_stuck(id, now_ms) {
                self.diagnostics.anomalies += 1;
                if let Some(node) = self.nodes.get(&id) {
                    warn!("Anomaly on {}: {:?}", node.record.unit_id, event);
                    report.transitions.push((node.record.clone(), event));
                }
            }
        }
        let notifications = report.transitions.clone();
        self.notify(&notifications);

        report
    }

    /// Hide an edge from active queries until it is confirmed again
    fn mark_edge_stale(&mut self, physical: NodeId, alias: NodeId, updates: &mut Vec<EdgeUpdate>) {
        match self.edges.get_mut(&(physical, alias)) {
            Some(edge) if !edge.stale => edge.stale = true,
            _ => return,
        }
        if let Some((physical_id, alias_address)) = self.edge_endpoints(physical, alias) {
            updates.push(EdgeUpdate::MarkedStale {
                physical: physical_id,
                alias: alias_address,
            });
        }
    }

    fn purge(&mut self, id: NodeId, updates: &mut Vec<EdgeUpdate>) -> Option<DeviceRecord> {
        let pairs: Vec<(NodeId, NodeId)> = self
            .edges
            .keys()
            .filter(|(from, to)| *from == id || *to == id)
            .copied()
            .collect();
        for (physical, alias) in pairs {
            self.remove_edge(physical, alias, updates);
        }

        let node = self.nodes.remove(&id)?;
        self.identities.remove(&node.key);
        if let Some(reference) = node.record.reference {
            if let Some(set) = self.referrers.get_mut(&reference) {
                set.remove(&id);
                if set.is_empty() {
                    self.referrers.remove(&reference);
                }
            }
        }
        Some(node.record)
    }

    fn live_records(&self, keep: impl Fn(DeviceVariant) -> bool) -> Vec<DeviceRecord> {
        self.nodes
            .values()
            .filter(|n| !n.record.stale && keep(n.record.variant))
            .map(|n| n.record.clone())
            .collect()
    }

    pub fn list_physical_devices(&self) -> Vec<DeviceRecord> {
        self.live_records(|v| v.is_physical())
    }

    pub fn list_virtual_aliases(&self) -> Vec<DeviceRecord> {
        self.live_records(|v| v == DeviceVariant::VirtualAlias)
    }

    pub fn list_unknown_devices(&self) -> Vec<DeviceRecord> {
        self.live_records(|v| v == DeviceVariant::Unknown)
    }

    fn edge_view(&self, pair: &(NodeId, NodeId), edge: &Edge) -> Option<MeshEdge> {
        let (physical, alias) = self.edge_endpoints(pair.0, pair.1)?;
        Some(MeshEdge {
            physical,
            alias,
            created_ms: edge.created_ms,
            last_confirmed_ms: edge.last_confirmed_ms,
            stale: edge.stale,
        })
    }

    pub fn list_mesh_edges(&self) -> Vec<MeshEdge> {
        self.edges
            .iter()
            .filter(|(_, edge)| !edge.stale)
            .filter_map(|(pair, edge)| self.edge_view(pair, edge))
            .collect()
    }

    /// Addresses referenced by a live physical node but not yet confirmed by
    /// a live virtual alias
    pub fn list_pending_aliases(&self) -> Vec<TransportAddress> {
        self.referrers
            .iter()
            .filter(|(_, ids)| {
                ids.iter()
                    .any(|id| self.nodes.get(id).is_some_and(|n| !n.record.stale))
            })
            .filter(|(address, _)| {
                !self
                    .identities
                    .get(&IdentityKey::Address(**address))
                    .and_then(|id| self.nodes.get(id))
                    .is_some_and(|n| !n.record.stale)
            })
            .map(|(address, _)| *address)
            .collect()
    }

    /// Lookup by persistent unit id, including stale records in their grace
    /// window. Virtual aliases answer to their address bytes.
    pub fn get_device(&self, unit_id: &UnitId) -> Option<DeviceRecord> {
        self.identities
            .get(&IdentityKey::Unit(*unit_id))
            .or_else(|| {
                self.identities
                    .get(&IdentityKey::Address(unit_id.as_address()))
            })
            .and_then(|id| self.nodes.get(id))
            .map(|n| n.record.clone())
    }

    /// Virtual alias at `address`, or else the record most recently seen there
    pub fn get_device_by_address(&self, address: &TransportAddress) -> Option<DeviceRecord> {
        if let Some(node) = self
            .identities
            .get(&IdentityKey::Address(*address))
            .and_then(|id| self.nodes.get(id))
        {
            return Some(node.record.clone());
        }
        self.nodes
            .values()
            .filter(|n| n.record.addresses.contains(address))
            .max_by_key(|n| n.record.last_seen_ms)
            .map(|n| n.record.clone())
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            taken_at_ms: self.clock_ms,
            devices: self.nodes.values().map(|n| n.record.clone()).collect(),
            edges: self
                .edges
                .iter()
                .filter_map(|(pair, edge)| self.edge_view(pair, edge))
                .collect(),
            pending_aliases: self.list_pending_aliases(),
            diagnostics: self.diagnostics,
        }
    }
}
