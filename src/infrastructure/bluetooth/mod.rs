//! Bluetooth Module
//!
//! Turns Casambi BLE advertisements into mesh state.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  AdvertisementEvent  ┌──────────────────────────────┐
//! │  Scanner  │ ───────────────────▶ │         MeshService          │
//! │ (btleplug)│                      │  (single task owning graph)  │
//! └───────────┘                      └──────┬──────────────┬────────┘
//!                                           │              │
//!                                   watch snapshots   MeshEvent stream
//!                                           ▼              ▼
//!                                      MeshHandle      subscribers
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - Company id, service UUIDs and vendor frame decoding
//! - [`service`] - Graph task, snapshot publication and subscriptions
//! - `scanner` - Live BLE capture (`scanner` feature)

pub mod protocol;
#[cfg(feature = "scanner")]
pub mod scanner;
pub mod service;

pub use service::{MeshEvent, MeshHandle, MeshService};
