//! Device state classification
//!
//! Pure mapping from a decoded vendor payload and the advertised service
//! identifiers to a [`DeviceVariant`]. The order of the checks matters:
//! service presence first, then frame form, then the reference field.

use crate::domain::models::{DecodedPayload, DeviceVariant, TransportAddress};
use crate::infrastructure::bluetooth::protocol::{CONFIGURED_SERVICE_UUID, LIBRARY_SERVICE_UUID};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Service identifiers recognized out of the box
pub const DEFAULT_SERVICES: [Uuid; 2] = [CONFIGURED_SERVICE_UUID, LIBRARY_SERVICE_UUID];

/// Classify against the default Casambi service identifiers
pub fn classify(
    payload: &DecodedPayload,
    services: &BTreeSet<Uuid>,
    own_address: TransportAddress,
) -> DeviceVariant {
    classify_with(payload, services, own_address, &DEFAULT_SERVICES)
}

/// Classify against an explicit set of recognized service identifiers
pub fn classify_with(
    payload: &DecodedPayload,
    services: &BTreeSet<Uuid>,
    own_address: TransportAddress,
    recognized: &[Uuid],
) -> DeviceVariant {
    let has_service = recognized.iter().any(|uuid| services.contains(uuid));

    match (has_service, payload) {
        (true, DecodedPayload::Short(frame)) if frame.unit_id.as_address() == own_address => {
            DeviceVariant::VirtualAlias
        }
        (true, _) => DeviceVariant::Unknown,
        (false, DecodedPayload::Long(_)) => match payload.reference() {
            None => DeviceVariant::Unconfigured,
            Some(_) => DeviceVariant::ConfiguredPhysical,
        },
        (false, DecodedPayload::Short(_)) => DeviceVariant::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::protocol::{decode_payload, parse_hex};

    fn decode(hex: &str) -> DecodedPayload {
        decode_payload(&parse_hex(hex).unwrap()).unwrap()
    }

    fn addr(s: &str) -> TransportAddress {
        s.parse().unwrap()
    }

    fn services(list: &[Uuid]) -> BTreeSet<Uuid> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_unconfigured_vector() {
        let payload = decode("184b109da3052328f22c2800000000000000004b0000f0");
        let variant = classify(&payload, &BTreeSet::new(), addr("aa:aa:aa:aa:aa:aa"));
        assert_eq!(variant, DeviceVariant::Unconfigured);
        assert_eq!(payload.unit_id().to_string(), "184b109da305");
    }

    #[test]
    fn test_configured_vector() {
        let payload = decode("184b109da3052328f22c280036b69daf62ae094b0000f0");
        let variant = classify(&payload, &BTreeSet::new(), addr("aa:aa:aa:aa:aa:aa"));
        assert_eq!(variant, DeviceVariant::ConfiguredPhysical);
        assert_eq!(payload.reference(), Some(addr("36:b6:9d:af:62:ae")));
    }

    #[test]
    fn test_virtual_alias_vector() {
        let payload = decode("36b69daf62ae0b");
        let variant = classify(
            &payload,
            &services(&[CONFIGURED_SERVICE_UUID]),
            addr("36:b6:9d:af:62:ae"),
        );
        assert_eq!(variant, DeviceVariant::VirtualAlias);
    }

    #[test]
    fn test_library_uuid_also_marks_alias() {
        let payload = decode("36b69daf62ae0b");
        let variant = classify(
            &payload,
            &services(&[LIBRARY_SERVICE_UUID]),
            addr("36:b6:9d:af:62:ae"),
        );
        assert_eq!(variant, DeviceVariant::VirtualAlias);
    }

    #[test]
    fn test_short_frame_from_foreign_address_is_unknown() {
        let payload = decode("36b69daf62ae0b");
        let variant = classify(
            &payload,
            &services(&[CONFIGURED_SERVICE_UUID]),
            addr("11:22:33:44:55:66"),
        );
        assert_eq!(variant, DeviceVariant::Unknown);
    }

    #[test]
    fn test_service_with_long_frame_is_unknown() {
        let payload = decode("184b109da3052328f22c280036b69daf62ae094b0000f0");
        let variant = classify(
            &payload,
            &services(&[CONFIGURED_SERVICE_UUID]),
            addr("18:4b:10:9d:a3:05"),
        );
        assert_eq!(variant, DeviceVariant::Unknown);
    }

    #[test]
    fn test_short_frame_without_service_is_unknown() {
        let payload = decode("36b69daf62ae0b");
        let variant = classify(&payload, &BTreeSet::new(), addr("36:b6:9d:af:62:ae"));
        assert_eq!(variant, DeviceVariant::Unknown);
    }

    #[test]
    fn test_unrelated_services_are_ignored() {
        let payload = decode("184b109da3052328f22c2800000000000000004b0000f0");
        let other = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
        let variant = classify(&payload, &services(&[other]), addr("aa:aa:aa:aa:aa:aa"));
        assert_eq!(variant, DeviceVariant::Unconfigured);
    }

    #[test]
    fn test_custom_recognized_set() {
        let payload = decode("36b69daf62ae0b");
        let custom = Uuid::from_u128(0x1234);
        let variant = classify_with(
            &payload,
            &services(&[custom]),
            addr("36:b6:9d:af:62:ae"),
            &[custom],
        );
        assert_eq!(variant, DeviceVariant::VirtualAlias);
    }
}
