use anyhow::{Context, Result};
use casambi_mesh::domain::mesh::{prepare, MeshGraph};
use casambi_mesh::domain::models::{AdvertisementEvent, DecodedPayload, TransportAddress};
use casambi_mesh::domain::settings::{MeshSettings, SettingsService};
use casambi_mesh::domain::snapshot::{NetworkSnapshot, RelatedGroup};
use casambi_mesh::infrastructure::bluetooth::protocol::parse_hex;
use casambi_mesh::infrastructure::logging::init_logger;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "casambi-mesh", version, about = "Casambi BLE mesh discovery")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode and classify a single vendor payload given as hex
    Decode {
        payload: String,
        /// Transport address the payload was seen from
        #[arg(long, default_value = "00:00:00:00:00:00")]
        address: TransportAddress,
        /// Advertised service UUIDs
        #[arg(long = "service")]
        services: Vec<Uuid>,
    },
    /// Feed a JSON-lines capture of advertisements through the mesh graph
    Replay {
        capture: PathBuf,
        /// Write the resulting snapshot as JSON
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Scan live advertisements and print the resulting network
    #[cfg(feature = "scanner")]
    Scan {
        /// Scan duration in seconds (overrides the settings file)
        #[arg(long)]
        duration: Option<u64>,
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_service = match &cli.config {
        Some(path) => SettingsService::from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => SettingsService::new()?,
    };
    let settings = settings_service.get().clone();
    let _log_guard = init_logger(&settings.log_settings, cli.log_level.as_deref())?;
    settings
        .mesh
        .validate()
        .context("Invalid mesh settings")?;

    match cli.command {
        Command::Decode {
            payload,
            address,
            services,
        } => decode(&payload, address, services, &settings.mesh),
        Command::Replay { capture, export } => {
            let snapshot = replay(&capture, settings.mesh)?;
            report(&snapshot, export)
        }
        #[cfg(feature = "scanner")]
        Command::Scan { duration, export } => {
            let mut scanner_settings = settings.scanner.clone();
            if let Some(duration) = duration {
                scanner_settings.scan_duration_secs = duration;
            }
            let runtime = tokio::runtime::Runtime::new()?;
            let snapshot = runtime.block_on(scan(settings.mesh, scanner_settings))?;
            report(&snapshot, export)
        }
    }
}

fn decode(
    payload: &str,
    address: TransportAddress,
    services: Vec<Uuid>,
    mesh: &MeshSettings,
) -> Result<()> {
    let bytes = parse_hex(payload).context("Payload is not valid hex")?;
    let mut event = AdvertisementEvent::new(address, 0).with_payload(mesh.company_id, bytes);
    for service in services {
        event = event.with_service(service);
    }

    let (decoded, variant) =
        prepare(&event, mesh)?.context("No payload for the configured company id")?;
    println!("unit id   : {}", decoded.unit_id());
    println!("form      : {:?}", decoded.form());
    println!("status    : 0x{:02x}", decoded.status());
    if let DecodedPayload::Long(frame) = &decoded {
        println!("flags     : {}", data_encoding::HEXLOWER.encode(&frame.flags));
        println!(
            "reference : {}",
            decoded
                .reference()
                .map(|r| r.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        if !frame.trailer.is_empty() {
            println!("trailer   : {}", data_encoding::HEXLOWER.encode(&frame.trailer));
        }
    }
    println!("variant   : {}", variant);
    Ok(())
}

/// Replay a capture, running housekeeping on event time
fn replay(capture: &Path, mesh: MeshSettings) -> Result<NetworkSnapshot> {
    let file = std::fs::File::open(capture)
        .with_context(|| format!("Failed to open capture {}", capture.display()))?;
    let interval = mesh.housekeeping_interval_ms;
    let mut graph = MeshGraph::new(mesh)?;
    graph.subscribe(|record, event| {
        info!("{} {}: {:?}", record.variant, record.unit_id, event);
    });

    let mut next_housekeeping: Option<i64> = None;
    let mut last_time = 0;
    for (number, line) in std::io::BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let event: AdvertisementEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!("Skipping line {}: {}", number + 1, e);
                continue;
            }
        };

        let due =
            *next_housekeeping.get_or_insert(event.observed_at_ms.saturating_add(interval));
        if event.observed_at_ms >= due {
            graph.evict(event.observed_at_ms);
            next_housekeeping = Some(event.observed_at_ms.saturating_add(interval));
        }
        last_time = last_time.max(event.observed_at_ms);
        graph.ingest(&event);
    }
    graph.evict(last_time);

    let diagnostics = graph.diagnostics();
    info!(
        "Replayed {} events ({} foreign, {} malformed)",
        diagnostics.events, diagnostics.unrecognized_vendor, diagnostics.malformed_payloads
    );
    Ok(graph.snapshot())
}

#[cfg(feature = "scanner")]
async fn scan(
    mesh: MeshSettings,
    scanner_settings: casambi_mesh::domain::settings::ScannerSettings,
) -> Result<NetworkSnapshot> {
    use casambi_mesh::infrastructure::bluetooth::scanner::BleScanner;
    use casambi_mesh::infrastructure::bluetooth::{MeshEvent, MeshService};

    let service = MeshService::start(mesh)?;
    let handle = service.handle();
    let mut events = handle.subscribe().await?;
    let printer = tokio::spawn(async move {
        while let Some(MeshEvent::StateChanged(record, event)) = events.recv().await {
            info!("{} {}: {:?}", record.variant, record.unit_id, event);
        }
    });

    let scanner = BleScanner::new(handle, scanner_settings).await?;
    scanner.run().await?;

    let snapshot = service.shutdown().await?;
    let _ = printer.await;
    Ok(snapshot)
}

fn report(snapshot: &NetworkSnapshot, export: Option<PathBuf>) -> Result<()> {
    let summary = snapshot.summary();
    println!("Unconfigured units : {}", summary.unconfigured);
    println!("Configured units   : {}", summary.configured);
    println!("Virtual aliases    : {}", summary.virtual_aliases);
    println!("Unknown            : {}", summary.unknown);
    println!("Stale              : {}", summary.stale);
    println!("Mesh edges         : {}", summary.edges);
    println!("Pending aliases    : {}", summary.pending_aliases);

    for device in snapshot.devices.iter().filter(|d| !d.stale) {
        let name = if device.has_name() { device.name.as_str() } else { "-" };
        println!(
            "  {:<20} {} {:>4} dBm  {}",
            device.variant.label(),
            device.unit_id,
            device.signal_strength,
            name
        );
    }

    for group in snapshot.related_groups() {
        match group {
            RelatedGroup::SharedAddress { address, units } => {
                let units: Vec<String> = units.iter().map(|u| u.to_string()).collect();
                println!("  shared address {}: {}", address, units.join(", "));
            }
            RelatedGroup::MeshReference { physical, aliases } => {
                let aliases: Vec<String> = aliases.iter().map(|a| a.to_string()).collect();
                println!("  {} -> {}", physical, aliases.join(", "));
            }
        }
    }

    if let Some(path) = export {
        snapshot.export(&path)?;
        info!("Snapshot written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use casambi_mesh::infrastructure::bluetooth::protocol::{
        CASAMBI_COMPANY_ID, CONFIGURED_SERVICE_UUID,
    };

    #[test]
    fn test_cli_parses_decode() {
        let cli = Cli::try_parse_from([
            "casambi-mesh",
            "decode",
            "36b69daf62ae0b",
            "--address",
            "36:b6:9d:af:62:ae",
            "--service",
            "0000fe4d-0000-1000-8000-00805f9b34fb",
        ])
        .unwrap();
        match cli.command {
            Command::Decode {
                address, services, ..
            } => {
                assert_eq!(address.to_string(), "36:b6:9d:af:62:ae");
                assert_eq!(services, vec![CONFIGURED_SERVICE_UUID]);
            }
            _ => panic!("expected decode"),
        }
    }

    #[test]
    fn test_replay_capture() {
        let lines = [
            AdvertisementEvent::new("c4:aa:10:00:00:01".parse().unwrap(), 0).with_payload(
                CASAMBI_COMPANY_ID,
                parse_hex("184b109da3052328f22c280036b69daf62ae094b0000f0").unwrap(),
            ),
            AdvertisementEvent::new("36:b6:9d:af:62:ae".parse().unwrap(), 100)
                .with_payload(CASAMBI_COMPANY_ID, parse_hex("36b69daf62ae0b").unwrap())
                .with_service(CONFIGURED_SERVICE_UUID)
                .with_name("Desk"),
        ];
        let mut capture = String::new();
        for event in &lines {
            capture.push_str(&serde_json::to_string(event).unwrap());
            capture.push('\n');
        }
        capture.push_str("not json\n");

        let path = std::env::temp_dir().join(format!("casambi_replay_{}.jsonl", std::process::id()));
        std::fs::write(&path, capture).unwrap();
        let snapshot = replay(&path, MeshSettings::default()).unwrap();
        let _ = std::fs::remove_file(&path);

        let summary = snapshot.summary();
        assert_eq!(summary.configured, 1);
        assert_eq!(summary.virtual_aliases, 1);
        assert_eq!(summary.edges, 1);
        assert!(snapshot.physical_devices()[0].has_name());
    }

    #[test]
    fn test_replay_survives_extreme_timestamps() {
        let payload =
            parse_hex("184b109da3052328f22c280036b69daf62ae094b0000f0").unwrap();
        let mut capture = String::new();
        for at in [i64::MIN, i64::MAX] {
            let event = AdvertisementEvent::new("c4:aa:10:00:00:01".parse().unwrap(), at)
                .with_payload(CASAMBI_COMPANY_ID, payload.clone());
            capture.push_str(&serde_json::to_string(&event).unwrap());
            capture.push('\n');
        }

        let path = std::env::temp_dir().join(format!(
            "casambi_replay_extremes_{}.jsonl",
            std::process::id()
        ));
        std::fs::write(&path, capture).unwrap();
        let snapshot = replay(&path, MeshSettings::default()).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(snapshot.summary().configured, 1);
        assert_eq!(snapshot.devices[0].last_seen_ms, i64::MAX);
    }
}
