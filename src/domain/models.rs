//! Core data types shared by the decoder, classifier and mesh graph.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when an address or identifier string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid 6-byte identifier: {0:?}")]
pub struct IdentifierParseError(pub String);

fn parse_six_bytes(s: &str) -> Result<[u8; 6], IdentifierParseError> {
    let compact: String = s
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();
    let bytes = data_encoding::HEXLOWER_PERMISSIVE
        .decode(compact.as_bytes())
        .map_err(|_| IdentifierParseError(s.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| IdentifierParseError(s.to_string()))
}

/// Radio-layer address an advertisement was observed under.
///
/// Displayed as `aa:bb:cc:dd:ee:ff`, in payload byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TransportAddress(pub [u8; 6]);

impl TransportAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 6]
    }
}

impl fmt::Display for TransportAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl FromStr for TransportAddress {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_six_bytes(s).map(Self)
    }
}

impl Serialize for TransportAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransportAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Persistent unit identifier embedded in the vendor payload.
///
/// Stable across resets and reconfiguration. Displayed as 12 lowercase hex
/// digits (`184b109da305`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub [u8; 6]);

impl UnitId {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// The same six bytes read as a transport address
    pub fn as_address(&self) -> TransportAddress {
        TransportAddress(self.0)
    }
}

impl From<TransportAddress> for UnitId {
    fn from(address: TransportAddress) -> Self {
        Self(address.0)
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&data_encoding::HEXLOWER.encode(&self.0))
    }
}

impl FromStr for UnitId {
    type Err = IdentifierParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_six_bytes(s).map(Self)
    }
}

impl Serialize for UnitId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for UnitId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One observed advertisement, as delivered by a scanning session.
///
/// Vendor payloads are serialized as lowercase hex strings so captures stay
/// readable as JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisementEvent {
    pub transport_address: TransportAddress,
    #[serde(default)]
    pub signal_strength: i16,
    #[serde(default)]
    pub service_identifiers: BTreeSet<Uuid>,
    #[serde(default, with = "hex_payloads")]
    pub vendor_payloads: BTreeMap<u16, Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Unix milliseconds
    pub observed_at_ms: i64,
}

impl AdvertisementEvent {
    pub fn new(transport_address: TransportAddress, observed_at_ms: i64) -> Self {
        Self {
            transport_address,
            signal_strength: 0,
            service_identifiers: BTreeSet::new(),
            vendor_payloads: BTreeMap::new(),
            display_name: None,
            observed_at_ms,
        }
    }

    pub fn with_payload(mut self, company_id: u16, payload: impl Into<Vec<u8>>) -> Self {
        self.vendor_payloads.insert(company_id, payload.into());
        self
    }

    pub fn with_service(mut self, service: Uuid) -> Self {
        self.service_identifiers.insert(service);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_signal_strength(mut self, rssi: i16) -> Self {
        self.signal_strength = rssi;
        self
    }

    /// Display name, with empty strings treated as absent
    pub fn name(&self) -> Option<&str> {
        self.display_name.as_deref().filter(|n| !n.is_empty())
    }
}

mod hex_payloads {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(map: &BTreeMap<u16, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (company_id, bytes) in map {
            out.serialize_entry(company_id, &data_encoding::HEXLOWER.encode(bytes))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u16, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<u16, String> = BTreeMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(company_id, hex)| {
                data_encoding::HEXLOWER_PERMISSIVE
                    .decode(hex.as_bytes())
                    .map(|bytes| (company_id, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

/// Which of the two observed payload shapes a frame uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameForm {
    /// Physical node frame carrying a unit id and a reference field
    Long,
    /// Virtual alias frame: own address followed by a status byte
    Short,
}

/// Long-form vendor frame emitted by physical nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LongFrame {
    pub unit_id: UnitId,
    pub flags: [u8; 3],
    pub status: u8,
    pub reference_header: [u8; 2],
    pub reference: [u8; 6],
    pub trailer: Vec<u8>,
}

/// Short-form vendor frame emitted on behalf of virtual aliases
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortFrame {
    pub unit_id: UnitId,
    pub status: u8,
    pub trailer: Vec<u8>,
}

/// Structured view of a Casambi vendor payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedPayload {
    Long(LongFrame),
    Short(ShortFrame),
}

impl DecodedPayload {
    pub fn unit_id(&self) -> UnitId {
        match self {
            Self::Long(frame) => frame.unit_id,
            Self::Short(frame) => frame.unit_id,
        }
    }

    pub fn status(&self) -> u8 {
        match self {
            Self::Long(frame) => frame.status,
            Self::Short(frame) => frame.status,
        }
    }

    pub fn form(&self) -> FrameForm {
        match self {
            Self::Long(_) => FrameForm::Long,
            Self::Short(_) => FrameForm::Short,
        }
    }

    /// Referenced mesh participant, `None` for the all-zero field and for
    /// short frames
    pub fn reference(&self) -> Option<TransportAddress> {
        match self {
            Self::Long(frame) if frame.reference != [0u8; 6] => {
                Some(TransportAddress(frame.reference))
            }
            _ => None,
        }
    }
}

/// Classified device state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceVariant {
    /// Reset node, long frame with an all-zero reference
    Unconfigured,
    /// Networked node, long frame referencing another participant
    ConfiguredPhysical,
    /// Short frame advertised on behalf of another participant
    VirtualAlias,
    /// Shape matches none of the above; kept for diagnostics
    Unknown,
}

impl DeviceVariant {
    pub fn is_physical(&self) -> bool {
        matches!(self, Self::Unconfigured | Self::ConfiguredPhysical)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::ConfiguredPhysical => "configured",
            Self::VirtualAlias => "virtual",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logical device as tracked by the mesh graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub unit_id: UnitId,
    pub variant: DeviceVariant,
    /// Transport addresses seen for this record, most recent last
    pub addresses: Vec<TransportAddress>,
    #[serde(default)]
    pub name: String,
    pub first_seen_ms: i64,
    pub last_seen_ms: i64,
    pub status: u8,
    pub reference: Option<TransportAddress>,
    /// When the current reference was first observed
    pub reference_since_ms: Option<i64>,
    pub signal_strength: i16,
    pub stale: bool,
}

impl DeviceRecord {
    pub fn last_address(&self) -> Option<TransportAddress> {
        self.addresses.last().copied()
    }

    pub fn has_name(&self) -> bool {
        !self.name.is_empty()
    }
}

/// Directed relation from a physical node to a virtual alias it advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshEdge {
    pub physical: UnitId,
    pub alias: TransportAddress,
    pub created_ms: i64,
    pub last_confirmed_ms: i64,
    pub stale: bool,
}
