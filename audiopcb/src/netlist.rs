//! Normalized netlist intermediate representation.
//!
//! Components and nets live in flat arenas; cross-references are indices,
//! never owning pointers, so graph traversals operate on ids. Integrity is
//! strict: endpoints are validated against the registry pin map at
//! `connect` time and unknown kinds never get past ingestion.

use crate::error::NetlistError;
use crate::geom::{Point, Rect};
use crate::kinds::ComponentKind;
use crate::registry::Registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetId(pub usize);

/// Which copper side a component is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Top,
    Bottom,
}

/// Role-based net category governing routing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalClass {
    Power,
    Ground,
    Audio,
    HighSpeed,
    Digital,
    Control,
}

impl SignalClass {
    /// Routing priority: lower routes first (power nets give later nets a
    /// stable reference; control mops up last).
    pub fn priority(&self) -> u8 {
        match self {
            SignalClass::Power => 0,
            SignalClass::Ground => 1,
            SignalClass::Audio => 2,
            SignalClass::HighSpeed => 3,
            SignalClass::Digital => 4,
            SignalClass::Control => 5,
        }
    }

    /// Default target impedance, ohms.
    pub fn target_impedance(&self) -> Option<f64> {
        match self {
            SignalClass::Audio => Some(600.0),
            SignalClass::HighSpeed => Some(50.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignalClass::Audio => "audio",
            SignalClass::Power => "power",
            SignalClass::Ground => "ground",
            SignalClass::Control => "control",
            SignalClass::Digital => "digital",
            SignalClass::HighSpeed => "high-speed",
        }
    }
}

/// Classify a net by name. Nets that later pick up an audio-connector
/// endpoint are upgraded to `Audio` by [`Netlist::connect`].
pub fn classify(name: &str) -> SignalClass {
    let upper = name.to_ascii_uppercase();
    const POWER: &[&str] = &[
        "VCC", "VDD", "VSS", "V+", "V-", "+12V", "-12V", "+5V", "+15V", "-15V", "VEE",
    ];
    const GROUND: &[&str] = &["GND", "AGND", "DGND"];
    const HIGH_SPEED: &[&str] = &["CLK", "DDR", "USB", "HDMI"];
    if POWER.iter().any(|p| upper.starts_with(p)) {
        SignalClass::Power
    } else if GROUND.iter().any(|p| upper.starts_with(p)) {
        SignalClass::Ground
    } else if HIGH_SPEED.iter().any(|p| upper.starts_with(p)) {
        SignalClass::HighSpeed
    } else {
        SignalClass::Control
    }
}

/// One component instance. Position, rotation, and side are assigned by the
/// placement engine and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub kind: ComponentKind,
    pub value: String,
    pub package: Option<String>,
    pub reference: String,
    pub footprint_id: String,
    /// Pin number → pin name (from the registry).
    pub pin_map: BTreeMap<u8, String>,
    /// Courtyard (w, h) mm at rotation 0.
    pub courtyard: (f64, f64),
    pub position: Option<Point>,
    /// Rotation in degrees; the placement engine prefers {0, 90, 180, 270}.
    pub rotation: u16,
    pub side: Side,
}

impl Component {
    /// Courtyard bounding box at the placed position, rotation-aware.
    pub fn bounding_box(&self) -> Option<Rect> {
        let at = self.position?;
        let (w, h) = self.courtyard;
        let (w, h) = if self.rotation % 180 == 90 { (h, w) } else { (w, h) };
        Some(Rect::centered(at, w, h))
    }

    /// Resolve a pin name or pin number string to its pin number.
    pub fn pin_number(&self, pin: &str) -> Option<u8> {
        if let Some((num, _)) = self.pin_map.iter().find(|(_, name)| name.as_str() == pin) {
            return Some(*num);
        }
        pin.parse::<u8>().ok().filter(|n| self.pin_map.contains_key(n))
    }

    /// Physical landing position of a pin, mm. Pins are distributed along
    /// the long courtyard axis: dual-row for DIP-sized parts, single file
    /// otherwise. Deterministic; rotation-aware.
    pub fn pin_position(&self, pin: u8) -> Option<Point> {
        let at = self.position?;
        let total = self.pin_map.len() as i32;
        let idx = (pin as i32 - 1).clamp(0, total - 1);
        let (w, h) = self.courtyard;

        let (dx, dy) = if total >= 6 {
            // Dual-row package: pins 1..n/2 down the left edge, the rest back
            // up the right edge (DIP ordering).
            let per_side = total / 2;
            let (row, slot) = if idx < per_side {
                (0, idx)
            } else {
                (1, total - 1 - idx)
            };
            let pitch = h / (per_side as f64 + 1.0);
            let x = if row == 0 { -w / 2.0 } else { w / 2.0 };
            (x, -h / 2.0 + pitch * (slot as f64 + 1.0))
        } else if total == 1 {
            (0.0, 0.0)
        } else {
            // Single file spanning 80% of the long axis, leads near the
            // body ends.
            let span = 0.8 * w;
            let pitch = span / (total as f64 - 1.0);
            (-span / 2.0 + pitch * idx as f64, 0.0)
        };

        let (dx, dy) = match self.rotation % 360 {
            90 => (-dy, dx),
            180 => (-dx, -dy),
            270 => (dy, -dx),
            _ => (dx, dy),
        };
        Some(Point::new(at.x + dx, at.y + dy))
    }
}

/// One endpoint of a net: a (component, pin-number) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub component: ComponentId,
    pub pin: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Net {
    pub name: String,
    pub class: SignalClass,
    /// Whether the class was supplied by the source (true) or inferred
    /// from the name heuristic (false). Inferred classes may be upgraded.
    pub class_explicit: bool,
    pub endpoints: Vec<Endpoint>,
    pub target_impedance: Option<f64>,
}

/// The netlist graph: component and net arenas plus lookup tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Netlist {
    components: Vec<Component>,
    nets: Vec<Net>,
    by_reference: BTreeMap<String, ComponentId>,
    by_net_name: BTreeMap<String, NetId>,
    next_index: BTreeMap<String, usize>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component, resolving its footprint through the registry and
    /// allocating the next free reference for its prefix.
    pub fn add_component(
        &mut self,
        registry: &Registry,
        kind: ComponentKind,
        value: &str,
        package: Option<&str>,
    ) -> Result<ComponentId, NetlistError> {
        let record = registry.resolve(kind, package)?;
        let counter = self
            .next_index
            .entry(record.prefix.to_string())
            .or_insert(0);
        *counter += 1;
        let reference = format!("{}{}", record.prefix, counter);

        let id = ComponentId(self.components.len());
        self.by_reference.insert(reference.clone(), id);
        self.components.push(Component {
            kind,
            value: value.to_string(),
            package: package.map(str::to_string),
            reference,
            footprint_id: record.footprint_id,
            pin_map: record.pin_map,
            courtyard: record.courtyard,
            position: None,
            rotation: record.default_rotation,
            side: Side::Top,
        });
        Ok(id)
    }

    /// Add a net. The class defaults to the name heuristic when not given.
    pub fn add_net(
        &mut self,
        name: &str,
        class: Option<SignalClass>,
    ) -> Result<NetId, NetlistError> {
        if self.by_net_name.contains_key(name) {
            return Err(NetlistError::DuplicateNet { name: name.into() });
        }
        let id = NetId(self.nets.len());
        let inferred = classify(name);
        let resolved = class.unwrap_or(inferred);
        self.by_net_name.insert(name.to_string(), id);
        self.nets.push(Net {
            name: name.to_string(),
            class: resolved,
            class_explicit: class.is_some(),
            endpoints: Vec::new(),
            target_impedance: resolved.target_impedance(),
        });
        Ok(id)
    }

    /// Connect a component pin (by name or number) to a net. The pin must
    /// exist in the component's registry pin map.
    pub fn connect(
        &mut self,
        net: NetId,
        component: ComponentId,
        pin: &str,
    ) -> Result<(), NetlistError> {
        let comp = self
            .components
            .get(component.0)
            .ok_or_else(|| NetlistError::UnknownComponent {
                id: format!("#{}", component.0),
            })?;
        let pin_number = comp
            .pin_number(pin)
            .ok_or_else(|| NetlistError::UnknownPin {
                reference: comp.reference.clone(),
                pin: pin.to_string(),
            })?;
        let audio_kind = matches!(
            comp.kind,
            ComponentKind::Jack(_) | ComponentKind::Speaker | ComponentKind::Potentiometer
        );

        let net_ref = &mut self.nets[net.0];
        let endpoint = Endpoint {
            component,
            pin: pin_number,
        };
        if !net_ref.endpoints.contains(&endpoint) {
            net_ref.endpoints.push(endpoint);
        }
        // A net touching an audio connector is an audio net, unless the
        // source pinned its class explicitly.
        if audio_kind && !net_ref.class_explicit && net_ref.class == SignalClass::Control {
            net_ref.class = SignalClass::Audio;
            net_ref.target_impedance = SignalClass::Audio.target_impedance();
        }
        Ok(())
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id.0]
    }

    pub fn net(&self, id: NetId) -> &Net {
        &self.nets[id.0]
    }

    pub fn find_component(&self, reference: &str) -> Option<ComponentId> {
        self.by_reference.get(reference).copied()
    }

    pub fn find_net(&self, name: &str) -> Option<NetId> {
        self.by_net_name.get(name).copied()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn net_count(&self) -> usize {
        self.nets.len()
    }

    /// Iterate all components with their ids, in creation order.
    pub fn iter_components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, c)| (ComponentId(i), c))
    }

    /// Iterate all nets with their ids, in creation order. Finite and
    /// restartable.
    pub fn iter_nets(&self) -> impl Iterator<Item = (NetId, &Net)> {
        self.nets.iter().enumerate().map(|(i, n)| (NetId(i), n))
    }
}
