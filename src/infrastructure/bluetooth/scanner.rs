//! BLE Scanner Module
//!
//! Passive advertisement capture through btleplug. Every discovery or
//! advertisement update is turned into an [`AdvertisementEvent`] and pushed
//! into the mesh service; the scanner itself keeps no state about devices.

use crate::domain::models::{AdvertisementEvent, TransportAddress};
use crate::domain::settings::ScannerSettings;
use crate::infrastructure::bluetooth::service::{now_ms, MeshHandle};
use anyhow::{Context, Result};
use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// BLE scanner feeding advertisements into a running mesh service
pub struct BleScanner {
    adapter: Adapter,
    mesh: MeshHandle,
    settings: ScannerSettings,
}

impl BleScanner {
    /// Open the configured adapter
    pub async fn new(mesh: MeshHandle, settings: ScannerSettings) -> Result<Self> {
        let manager = Manager::new()
            .await
            .context("Failed to open Bluetooth manager")?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .nth(settings.adapter_index)
            .ok_or_else(|| {
                anyhow::anyhow!("No Bluetooth adapter at index {}", settings.adapter_index)
            })?;
        info!(
            "Using Bluetooth adapter: {}",
            adapter.adapter_info().await.unwrap_or_default()
        );

        Ok(Self {
            adapter,
            mesh,
            settings,
        })
    }

    /// Scan for the configured duration, forwarding every advertisement
    pub async fn run(&self) -> Result<usize> {
        let mut events = self.adapter.events().await?;
        self.adapter.start_scan(ScanFilter::default()).await?;

        let duration = Duration::from_secs(self.settings.scan_duration_secs);
        info!("Scanning for Casambi advertisements ({:?})...", duration);

        let deadline = tokio::time::Instant::now() + duration;
        let mut forwarded = 0usize;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            let id = match tokio::time::timeout(remaining, events.next()).await {
                Ok(Some(CentralEvent::DeviceDiscovered(id)))
                | Ok(Some(CentralEvent::DeviceUpdated(id)))
                | Ok(Some(CentralEvent::ManufacturerDataAdvertisement { id, .. }))
                | Ok(Some(CentralEvent::ServicesAdvertisement { id, .. })) => id,
                Ok(Some(_)) => continue,
                Ok(None) | Err(_) => break,
            };

            match self.read_advertisement(&id).await {
                Ok(Some(event)) => {
                    self.mesh.ingest(event).await?;
                    forwarded += 1;
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping peripheral {:?}: {}", id, e),
            }
        }

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Failed to stop scan: {}", e);
        }
        info!("Scan finished, {} advertisements forwarded", forwarded);
        Ok(forwarded)
    }

    async fn read_advertisement(&self, id: &PeripheralId) -> Result<Option<AdvertisementEvent>> {
        let peripheral = self.adapter.peripheral(id).await?;
        let Some(props) = peripheral.properties().await? else {
            return Ok(None);
        };

        let mut event = AdvertisementEvent::new(
            TransportAddress::new(props.address.into_inner()),
            now_ms(),
        )
        .with_signal_strength(props.rssi.unwrap_or_default());
        for (company_id, payload) in props.manufacturer_data {
            event = event.with_payload(company_id, payload);
        }
        for service in props.services {
            event = event.with_service(service);
        }
        if let Some(name) = props.local_name {
            event = event.with_name(name);
        }
        Ok(Some(event))
    }
}
