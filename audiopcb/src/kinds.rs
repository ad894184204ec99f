//! The closed set of component kinds the pipeline understands.
//!
//! Kinds are tagged variants: sub-families (capacitor dielectric, transistor
//! technology, op-amp slot count, jack size) ride in the variant payload so
//! that unknown kinds are rejected at netlist ingestion rather than deep in
//! the placement or routing engines.

use serde::{Deserialize, Serialize};

/// Capacitor dielectric / construction variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapDielectric {
    Electrolytic,
    Film,
    Ceramic,
    Tantalum,
}

/// Transistor technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransistorKind {
    Bjt,
    Jfet,
    Mosfet,
}

/// Number of amplifier slots in an op-amp package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpAmpSlots {
    Single,
    Dual,
    Quad,
}

/// Audio connector size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JackSize {
    #[serde(rename = "3.5mm")]
    Mm35,
    #[serde(rename = "6.35mm")]
    Mm635,
    #[serde(rename = "xlr")]
    Xlr,
}

/// Closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    Resistor,
    Capacitor(CapDielectric),
    Inductor,
    Diode,
    Led,
    Transistor(TransistorKind),
    OpAmp(OpAmpSlots),
    IcGeneric,
    Potentiometer,
    Switch,
    Jack(JackSize),
    Speaker,
    FerriteBead,
    Crystal,
    Oscillator,
    Relay,
    Transformer,
    Tube,
    Regulator,
    Dac,
    Adc,
    Vco,
    Vcf,
    Vca,
    Logic,
    Timer,
    MountingHole,
}

impl ComponentKind {
    /// Reference designator prefix for auto-numbering (R1, C3, U2, ...).
    pub fn reference_prefix(&self) -> &'static str {
        use ComponentKind::*;
        match self {
            Resistor => "R",
            Capacitor(_) => "C",
            Inductor => "L",
            Diode => "D",
            Led => "LED",
            Transistor(_) => "Q",
            OpAmp(_) | IcGeneric | Dac | Adc | Vco | Vcf | Vca | Logic | Timer => "U",
            Potentiometer => "RV",
            Switch => "SW",
            Jack(JackSize::Xlr) => "XLR",
            Jack(_) => "J",
            Speaker => "SPK",
            FerriteBead => "FB",
            Crystal => "XTAL",
            Oscillator => "OSC",
            Relay => "RLY",
            Transformer => "T",
            Tube => "V",
            Regulator => "REG",
            MountingHole => "MH",
        }
    }

    /// Number of electrical pins on the default package for this kind.
    pub fn pin_count(&self) -> usize {
        use ComponentKind::*;
        match self {
            Resistor | Inductor | Diode | Led | FerriteBead | Crystal | Speaker => 2,
            Capacitor(_) => 2,
            Transistor(_) | Potentiometer | Switch | Jack(_) | Regulator => 3,
            OpAmp(OpAmpSlots::Quad) => 14,
            OpAmp(_) => 8,
            Oscillator | Transformer => 4,
            Relay => 5,
            Tube => 9,
            IcGeneric | Logic => 14,
            Timer | Dac | Adc | Vca => 8,
            Vco | Vcf => 16,
            MountingHole => 1,
        }
    }

    /// True for kinds that actively dissipate or amplify (used by thermal and
    /// decoupling rules).
    pub fn is_active(&self) -> bool {
        use ComponentKind::*;
        matches!(
            self,
            Transistor(_)
                | OpAmp(_)
                | IcGeneric
                | Tube
                | Regulator
                | Dac
                | Adc
                | Vco
                | Vcf
                | Vca
                | Logic
                | Timer
        )
    }

    /// Kinds mounted through the front panel on eurorack / pedal presets.
    pub fn is_panel_mount(&self) -> bool {
        use ComponentKind::*;
        matches!(self, Jack(_) | Potentiometer | Switch | Led)
    }

    /// Canonical string used in serialized netlists and reports.
    pub fn kind_str(&self) -> &'static str {
        use ComponentKind::*;
        match self {
            Resistor => "resistor",
            Capacitor(CapDielectric::Electrolytic) => "capacitor-electrolytic",
            Capacitor(CapDielectric::Film) => "capacitor-film",
            Capacitor(CapDielectric::Ceramic) => "capacitor-ceramic",
            Capacitor(CapDielectric::Tantalum) => "capacitor-tantalum",
            Inductor => "inductor",
            Diode => "diode",
            Led => "led",
            Transistor(TransistorKind::Bjt) => "transistor-bjt",
            Transistor(TransistorKind::Jfet) => "transistor-jfet",
            Transistor(TransistorKind::Mosfet) => "transistor-mosfet",
            OpAmp(OpAmpSlots::Single) => "opamp-single",
            OpAmp(OpAmpSlots::Dual) => "opamp-dual",
            OpAmp(OpAmpSlots::Quad) => "opamp-quad",
            IcGeneric => "ic-generic",
            Potentiometer => "potentiometer",
            Switch => "switch",
            Jack(JackSize::Mm35) => "jack-3.5mm",
            Jack(JackSize::Mm635) => "jack-6.35mm",
            Jack(JackSize::Xlr) => "jack-xlr",
            Speaker => "speaker",
            FerriteBead => "ferrite-bead",
            Crystal => "crystal",
            Oscillator => "oscillator",
            Relay => "relay",
            Transformer => "transformer",
            Tube => "tube",
            Regulator => "regulator",
            Dac => "dac",
            Adc => "adc",
            Vco => "vco",
            Vcf => "vcf",
            Vca => "vca",
            Logic => "logic",
            Timer => "timer",
            MountingHole => "mounting-hole",
        }
    }

    /// Parse a kind name as it appears in netlist sources. Sub-family hints
    /// (transistor type, jack size, capacitor dielectric, op-amp slots) come
    /// from the source's `properties` and are passed separately.
    pub fn parse(name: &str, hint: Option<&str>) -> Option<ComponentKind> {
        use ComponentKind::*;
        let kind = match name {
            "resistor" => Resistor,
            "capacitor" => Capacitor(match hint {
                Some("electrolytic") => CapDielectric::Electrolytic,
                Some("ceramic") => CapDielectric::Ceramic,
                Some("tantalum") => CapDielectric::Tantalum,
                _ => CapDielectric::Film,
            }),
            "inductor" => Inductor,
            "diode" => Diode,
            "led" => Led,
            "transistor" | "bjt" | "jfet" | "mosfet" => {
                let tech = match (name, hint) {
                    ("jfet", _) | (_, Some("jfet")) => TransistorKind::Jfet,
                    ("mosfet", _) | (_, Some("mosfet")) => TransistorKind::Mosfet,
                    _ => TransistorKind::Bjt,
                };
                Transistor(tech)
            }
            "opamp" => OpAmp(match hint {
                Some("single") | Some("1") => OpAmpSlots::Single,
                Some("quad") | Some("4") | Some("14") => OpAmpSlots::Quad,
                _ => OpAmpSlots::Dual,
            }),
            "ic" | "ic-generic" => IcGeneric,
            "potentiometer" | "pot" => Potentiometer,
            "switch" => Switch,
            "jack" | "audio_jack" => Jack(match hint {
                Some("6.35mm") => JackSize::Mm635,
                Some("xlr") => JackSize::Xlr,
                _ => JackSize::Mm35,
            }),
            "xlr" => Jack(JackSize::Xlr),
            "speaker" => Speaker,
            "ferrite_bead" | "ferrite-bead" => FerriteBead,
            "crystal" => Crystal,
            "oscillator" => Oscillator,
            "relay" => Relay,
            "transformer" => Transformer,
            "tube" | "triode" | "pentode" => Tube,
            "regulator" => Regulator,
            "dac" => Dac,
            "adc" => Adc,
            "vco" => Vco,
            "vcf" => Vcf,
            "vca" => Vca,
            "logic" => Logic,
            "timer" => Timer,
            "mounting_hole" | "mounting-hole" => MountingHole,
            _ => return None,
        };
        Some(kind)
    }
}
