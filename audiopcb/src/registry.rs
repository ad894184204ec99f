//! Footprint registry: single source of truth mapping component kinds (plus
//! optional package hints) to KiCad library ids, pin-name tables, reference
//! prefixes, and physical courtyards.
//!
//! Purely declarative lookup; no geometry is performed here. The registry is
//! immutable once the pipeline starts and may be shared freely.

use crate::error::RegistryError;
use crate::kinds::{CapDielectric, ComponentKind, JackSize, OpAmpSlots, TransistorKind};
use std::collections::BTreeMap;

/// Resolution result: everything downstream stages need to know about how a
/// component lands on the board.
#[derive(Debug, Clone)]
pub struct FootprintRecord {
    /// KiCad-style library id, e.g. `Package_DIP:DIP-8_W7.62mm`.
    pub footprint_id: String,
    /// Pin number → pin name.
    pub pin_map: BTreeMap<u8, String>,
    /// Reference designator prefix.
    pub prefix: &'static str,
    /// Preferred starting rotation in degrees.
    pub default_rotation: u16,
    /// Courtyard (body + lead) size, mm, at rotation 0.
    pub courtyard: (f64, f64),
}

/// Footprint registry with audio-centric through-hole overrides.
#[derive(Debug, Clone)]
pub struct Registry {
    /// Consult the through-hole override table first. Default for audio work.
    pub prefer_through_hole: bool,
    /// Runtime overrides, keyed by kind string; highest priority.
    custom: BTreeMap<String, String>,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            prefer_through_hole: true,
            custom: BTreeMap::new(),
        }
    }
}

impl Registry {
    pub fn new(prefer_through_hole: bool) -> Self {
        Self {
            prefer_through_hole,
            ..Self::default()
        }
    }

    /// Register or override a mapping before the pipeline starts.
    pub fn register(&mut self, kind_str: &str, footprint_id: &str) {
        self.custom
            .insert(kind_str.to_string(), footprint_id.to_string());
    }

    /// Bulk-load overrides from a JSON object mapping kind string → lib id.
    pub fn load_overrides(&mut self, json: &str) -> Result<(), serde_json::Error> {
        let map: BTreeMap<String, String> = serde_json::from_str(json)?;
        for (k, v) in map {
            self.custom.insert(k, v);
        }
        Ok(())
    }

    /// Resolve a kind (and optional package hint) to a footprint record.
    pub fn resolve(
        &self,
        kind: ComponentKind,
        package: Option<&str>,
    ) -> Result<FootprintRecord, RegistryError> {
        let footprint_id = if let Some(id) = self.custom.get(kind.kind_str()) {
            id.clone()
        } else if let Some(pkg) = package {
            package_footprint(kind, pkg).ok_or_else(|| RegistryError::UnknownPackage {
                kind: kind.kind_str().to_string(),
                package: pkg.to_string(),
            })?
        } else if self.prefer_through_hole {
            match self.audio_override(kind) {
                Some(record) => return Ok(record),
                None => base_footprint(kind).to_string(),
            }
        } else {
            base_footprint(kind).to_string()
        };

        Ok(FootprintRecord {
            footprint_id,
            pin_map: pin_map_of(kind, None),
            prefix: kind.reference_prefix(),
            default_rotation: 0,
            courtyard: courtyard(kind),
        })
    }

    /// Through-hole variant preferred for audio builds (lower noise, hand
    /// assembly), when one exists for the kind.
    pub fn audio_override(&self, kind: ComponentKind) -> Option<FootprintRecord> {
        through_hole_footprint(kind).map(|id| FootprintRecord {
            footprint_id: id.to_string(),
            pin_map: pin_map_of(kind, None),
            prefix: kind.reference_prefix(),
            default_rotation: 0,
            courtyard: courtyard(kind),
        })
    }
}

/// Base (surface-mount default) footprint per kind.
fn base_footprint(kind: ComponentKind) -> &'static str {
    use ComponentKind::*;
    match kind {
        Resistor => "Device:R_0603",
        Capacitor(CapDielectric::Electrolytic) => "Device:CP_Radial_D16.0mm_P7.50mm",
        Capacitor(CapDielectric::Tantalum) => "Device:C_1206_3216Metric",
        Capacitor(_) => "Device:C_0603",
        Inductor => "Device:L_0603",
        Diode => "Device:D_SOD-123",
        Led => "LED:LED_0603_1608Metric",
        Transistor(TransistorKind::Mosfet) => "Package_TO_SOT_THT:TO-220-3_Vertical",
        Transistor(_) => "Package_TO_SOT_THT:TO-92_Inline",
        OpAmp(OpAmpSlots::Quad) => "Package_SO:SOIC-14_3.9x8.7mm_P1.27mm",
        OpAmp(_) => "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm",
        IcGeneric | Logic => "Package_SO:SOIC-14_3.9x8.7mm_P1.27mm",
        Potentiometer => "Potentiometer_THT:Potentiometer_Alps_RK09K_Single_Horizontal",
        Switch => "Button_Switch_THT:SW_SPST_SKQG_WithThreadedTerminal",
        Jack(JackSize::Mm35) => "Connector_Audio:Jack_3.5mm_Stereo",
        Jack(JackSize::Mm635) => "Connector_Audio:Jack_6.35mm_Jack",
        Jack(JackSize::Xlr) => "Connector_Audio:XLR-3_Male",
        Speaker => "Audio:Speaker_Pioneer_G-25MC",
        FerriteBead => "Inductor_SMD:L_0603_1608Metric",
        Crystal | Oscillator => "Crystal:Crystal_SMD_3225-4Pin_3.2x2.5mm",
        Relay => "Relay_THT:Relay_SPDT_Schrack-RT1-FormA_RM5mm",
        Transformer => "Transformer_THT:Transformer_EI30-15_Vertical",
        Tube => "Package_THT:Socket_9-Pin_Octal",
        Regulator => "Package_TO_SOT_THT:TO-220-3_Vertical",
        Dac | Adc | Vca | Timer => "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm",
        Vco | Vcf => "Package_SO:SOIC-16_3.9x9.9mm_P1.27mm",
        MountingHole => "MountingHole:MountingHole_3.2mm_M3",
    }
}

/// Through-hole / audio-centric override table. Kinds already through-hole in
/// the base table have no entry.
fn through_hole_footprint(kind: ComponentKind) -> Option<&'static str> {
    use ComponentKind::*;
    let id = match kind {
        Resistor => "Device:R_Axial_L9.0mm_D3.0mm_P10.16mm_Horizontal",
        Capacitor(CapDielectric::Electrolytic) => "Device:CP_Radial_D16.0mm_P7.50mm",
        Capacitor(_) => "Device:C_Rect_L7.0mm_W2.5mm_P5.00mm",
        Inductor => "Device:L_Radial_D10.0mm_P5.00mm",
        Diode => "Device:D_THT_D5.0mm_W2.5mm_P2.54mm",
        Led => "LED:LED_D5.0mm",
        FerriteBead => "Inductor_THT:L_Axial_L12.0mm_D5.0mm_P15.00mm_Horizontal",
        Crystal | Oscillator => "Crystal:Crystal_HC49-U_Vertical",
        OpAmp(OpAmpSlots::Quad) => "Package_DIP:DIP-14_W7.62mm",
        OpAmp(_) => "Package_DIP:DIP-8_W7.62mm",
        IcGeneric | Logic => "Package_DIP:DIP-14_W7.62mm",
        Timer | Dac | Adc | Vca => "Package_DIP:DIP-8_W7.62mm",
        Vco | Vcf => "Package_DIP:DIP-16_W7.62mm",
        _ => return None,
    };
    Some(id)
}

/// Package map keyed by (kind, package hint string).
fn package_footprint(kind: ComponentKind, package: &str) -> Option<String> {
    use ComponentKind::*;
    let id = match (kind, package) {
        (OpAmp(_), "8") | (OpAmp(_), "dip8") => "Package_DIP:DIP-8_W7.62mm",
        (OpAmp(_), "14") | (OpAmp(_), "dip14") => "Package_DIP:DIP-14_W7.62mm",
        (OpAmp(_), "soic8") => "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm",
        (OpAmp(_), "soic14") => "Package_SO:SOIC-14_3.9x8.7mm_P1.27mm",
        (Transistor(_), "to92") => "Package_TO_SOT_THT:TO-92_Inline",
        (Transistor(_), "to220") => "Package_TO_SOT_THT:TO-220-3_Vertical",
        (Transistor(_), "sot23") => "Package_TO_SOT_SMD:SOT-23",
        (Potentiometer, "9mm") => {
            "Potentiometer_THT:Potentiometer_Alps_RK09K_Single_Horizontal"
        }
        (Potentiometer, "16mm") => {
            "Potentiometer_THT:Potentiometer_Alps_RK16K_Single_Horizontal"
        }
        (Potentiometer, "24mm") => {
            "Potentiometer_THT:Potentiometer_Alps_RK24K_Single_Horizontal"
        }
        (Jack(_), "3.5mm") => "Connector_Audio:Jack_3.5mm_Stereo",
        (Jack(_), "6.35mm") => "Connector_Audio:Jack_6.35mm_Jack",
        (Jack(_), "xlr") => "Connector_Audio:XLR-3_Male",
        (Resistor, "axial") => "Device:R_Axial_L9.0mm_D3.0mm_P10.16mm_Horizontal",
        (Resistor, "0805") => "Device:R_0805_2012Metric",
        (Resistor, "1206") => "Device:R_1206_3216Metric",
        _ => return None,
    };
    Some(id.to_string())
}

/// Deterministic pin number → pin name table.
///
/// Op-amps are keyed by pin count (8-pin single/dual, 14-pin quad);
/// transistors by technology; audio connectors by size.
pub fn pin_map_of(kind: ComponentKind, pin_count: Option<usize>) -> BTreeMap<u8, String> {
    use ComponentKind::*;
    let named: &[&str] = match kind {
        Transistor(TransistorKind::Bjt) => &["E", "B", "C"],
        Transistor(_) => &["S", "G", "D"],
        OpAmp(_) => {
            let pins = pin_count.unwrap_or(kind.pin_count());
            return opamp_pin_map(pins);
        }
        Jack(JackSize::Xlr) => &["GND", "HOT", "COLD"],
        Jack(_) => &["TIP", "RING", "SLEEVE"],
        Diode | Led => &["A", "K"],
        Potentiometer => &["1", "W", "3"],
        Relay => &["COIL+", "COIL-", "COM", "NO", "NC"],
        Transformer => &["PRI1", "PRI2", "SEC1", "SEC2"],
        Speaker => &["+", "-"],
        Regulator => &["IN", "GND", "OUT"],
        _ => {
            let pins = pin_count.unwrap_or(kind.pin_count());
            return (1..=pins as u8).map(|n| (n, n.to_string())).collect();
        }
    };
    named
        .iter()
        .enumerate()
        .map(|(i, name)| (i as u8 + 1, name.to_string()))
        .collect()
}

fn opamp_pin_map(pins: usize) -> BTreeMap<u8, String> {
    let names: &[&str] = match pins {
        8 => &["OUT", "IN-", "IN+", "V-", "NC", "NC", "NC", "V+"],
        14 => &[
            "OUT1", "IN1-", "IN1+", "V-", "IN2+", "IN2-", "OUT2", "OUT3", "IN3-", "IN3+", "V+",
            "IN4+", "IN4-", "OUT4",
        ],
        _ => {
            return (1..=pins as u8).map(|n| (n, n.to_string())).collect();
        }
    };
    names
        .iter()
        .enumerate()
        .map(|(i, name)| (i as u8 + 1, name.to_string()))
        .collect()
}

/// Courtyard (occupied body) size per kind at rotation 0, mm. Through-hole
/// variants, matching the audio override table.
fn courtyard(kind: ComponentKind) -> (f64, f64) {
    use ComponentKind::*;
    match kind {
        Resistor | FerriteBead => (12.0, 3.0),
        Capacitor(CapDielectric::Electrolytic) => (8.0, 8.0),
        Capacitor(_) => (7.5, 2.5),
        Inductor => (10.0, 10.0),
        Diode | Led => (6.0, 3.0),
        Transistor(TransistorKind::Mosfet) | Regulator => (10.5, 9.0),
        Transistor(_) => (5.0, 5.0),
        OpAmp(OpAmpSlots::Quad) | IcGeneric | Logic => (19.5, 7.5),
        OpAmp(_) | Timer | Dac | Adc | Vca => (10.5, 7.5),
        Vco | Vcf => (20.5, 7.5),
        Potentiometer => (10.0, 11.0),
        Switch => (7.0, 7.0),
        Jack(JackSize::Mm35) => (9.0, 10.5),
        Jack(JackSize::Mm635) => (16.0, 20.0),
        Jack(JackSize::Xlr) => (26.0, 31.0),
        Speaker => (25.0, 25.0),
        Crystal | Oscillator => (11.0, 5.0),
        Relay => (19.0, 15.5),
        Transformer => (30.0, 25.0),
        Tube => (22.0, 22.0),
        MountingHole => (6.5, 6.5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every kind in the closed set resolves with a non-empty pin map.
    #[test]
    fn registry_totality() {
        let registry = Registry::default();
        let kinds = [
            ComponentKind::Resistor,
            ComponentKind::Capacitor(CapDielectric::Electrolytic),
            ComponentKind::Capacitor(CapDielectric::Film),
            ComponentKind::Capacitor(CapDielectric::Ceramic),
            ComponentKind::Capacitor(CapDielectric::Tantalum),
            ComponentKind::Inductor,
            ComponentKind::Diode,
            ComponentKind::Led,
            ComponentKind::Transistor(TransistorKind::Bjt),
            ComponentKind::Transistor(TransistorKind::Jfet),
            ComponentKind::Transistor(TransistorKind::Mosfet),
            ComponentKind::OpAmp(OpAmpSlots::Single),
            ComponentKind::OpAmp(OpAmpSlots::Dual),
            ComponentKind::OpAmp(OpAmpSlots::Quad),
            ComponentKind::IcGeneric,
            ComponentKind::Potentiometer,
            ComponentKind::Switch,
            ComponentKind::Jack(JackSize::Mm35),
            ComponentKind::Jack(JackSize::Mm635),
            ComponentKind::Jack(JackSize::Xlr),
            ComponentKind::Speaker,
            ComponentKind::FerriteBead,
            ComponentKind::Crystal,
            ComponentKind::Oscillator,
            ComponentKind::Relay,
            ComponentKind::Transformer,
            ComponentKind::Tube,
            ComponentKind::Regulator,
            ComponentKind::Dac,
            ComponentKind::Adc,
            ComponentKind::Vco,
            ComponentKind::Vcf,
            ComponentKind::Vca,
            ComponentKind::Logic,
            ComponentKind::Timer,
            ComponentKind::MountingHole,
        ];
        for kind in kinds {
            let record = registry.resolve(kind, None).expect("kind must resolve");
            assert!(!record.footprint_id.is_empty(), "{kind:?}");
            assert!(!record.pin_map.is_empty(), "{kind:?}");
            assert!(record.courtyard.0 > 0.0 && record.courtyard.1 > 0.0);
        }
    }

    #[test]
    fn audio_override_prefers_through_hole() {
        let registry = Registry::default();
        let record = registry
            .resolve(ComponentKind::OpAmp(OpAmpSlots::Dual), None)
            .unwrap();
        assert_eq!(record.footprint_id, "Package_DIP:DIP-8_W7.62mm");

        let smd = Registry::new(false);
        let record = smd
            .resolve(ComponentKind::OpAmp(OpAmpSlots::Dual), None)
            .unwrap();
        assert!(record.footprint_id.starts_with("Package_SO:SOIC-8"));
    }

    #[test]
    fn opamp_pin_maps_keyed_by_count() {
        let eight = pin_map_of(ComponentKind::OpAmp(OpAmpSlots::Dual), Some(8));
        assert_eq!(eight[&1], "OUT");
        assert_eq!(eight[&4], "V-");
        assert_eq!(eight[&8], "V+");

        let fourteen = pin_map_of(ComponentKind::OpAmp(OpAmpSlots::Quad), Some(14));
        assert_eq!(fourteen[&11], "V+");
        assert_eq!(fourteen[&14], "OUT4");
    }

    #[test]
    fn transistor_pin_maps_by_technology() {
        let bjt = pin_map_of(ComponentKind::Transistor(TransistorKind::Bjt), None);
        assert_eq!(bjt[&1], "E");
        assert_eq!(bjt[&2], "B");
        assert_eq!(bjt[&3], "C");
        let jfet = pin_map_of(ComponentKind::Transistor(TransistorKind::Jfet), None);
        assert_eq!(jfet[&2], "G");
    }

    #[test]
    fn connector_pin_names() {
        let jack = pin_map_of(ComponentKind::Jack(JackSize::Mm35), None);
        assert_eq!(jack[&1], "TIP");
        assert_eq!(jack[&3], "SLEEVE");
        let xlr = pin_map_of(ComponentKind::Jack(JackSize::Xlr), None);
        assert_eq!(xlr[&2], "HOT");
    }

    #[test]
    fn unknown_package_is_rejected() {
        let registry = Registry::default();
        let err = registry
            .resolve(ComponentKind::Resistor, Some("bga"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownPackage { .. }));
    }

    #[test]
    fn custom_override_wins() {
        let mut registry = Registry::default();
        registry.register("resistor", "MyLib:R_Custom");
        let record = registry.resolve(ComponentKind::Resistor, None).unwrap();
        assert_eq!(record.footprint_id, "MyLib:R_Custom");
    }
}
