//! Casambi mesh discovery
//!
//! Decodes Casambi BLE advertisements, classifies each sighting and keeps a
//! graph of physical nodes and the virtual aliases they advertise, keyed by
//! the persistent unit id instead of the rotating transport address.

pub mod domain;
pub mod infrastructure;

pub use domain::classifier::{classify, classify_with};
pub use domain::mesh::{Diagnostics, IngestOutcome, MeshGraph};
pub use domain::models::{
    AdvertisementEvent, DecodedPayload, DeviceRecord, DeviceVariant, MeshEdge, TransportAddress,
    UnitId,
};
pub use domain::settings::{ConfigError, MeshSettings, Settings, SettingsService};
pub use domain::snapshot::NetworkSnapshot;
pub use domain::transitions::TransitionEvent;
pub use infrastructure::bluetooth::protocol::{decode_payload, encode_payload, DecodeError};
pub use infrastructure::bluetooth::{MeshEvent, MeshHandle, MeshService};
