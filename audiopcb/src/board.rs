//! Board descriptor: outline, layer stack, presets, and the copper artifacts
//! (tracks, vias, zones) produced by the routing and zone stages.

use crate::geom::{Point, Rect};
use crate::netlist::NetId;
use serde::{Deserialize, Serialize};

/// Index into the board's layer stack, front copper first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LayerId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerRole {
    Signal,
    Power,
    Ground,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub role: LayerRole,
}

/// Ordered copper stack. Two-, four-, and six-layer stacks are supported;
/// inner layers carry power and ground on four layers and up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn two_layer() -> Self {
        Self {
            layers: vec![
                Layer { name: "F.Cu".into(), role: LayerRole::Mixed },
                Layer { name: "B.Cu".into(), role: LayerRole::Mixed },
            ],
        }
    }

    pub fn four_layer() -> Self {
        Self {
            layers: vec![
                Layer { name: "F.Cu".into(), role: LayerRole::Signal },
                Layer { name: "In1.Cu".into(), role: LayerRole::Power },
                Layer { name: "In2.Cu".into(), role: LayerRole::Ground },
                Layer { name: "B.Cu".into(), role: LayerRole::Signal },
            ],
        }
    }

    pub fn six_layer() -> Self {
        Self {
            layers: vec![
                Layer { name: "F.Cu".into(), role: LayerRole::Signal },
                Layer { name: "In1.Cu".into(), role: LayerRole::Ground },
                Layer { name: "In2.Cu".into(), role: LayerRole::Signal },
                Layer { name: "In3.Cu".into(), role: LayerRole::Power },
                Layer { name: "In4.Cu".into(), role: LayerRole::Ground },
                Layer { name: "B.Cu".into(), role: LayerRole::Signal },
            ],
        }
    }

    pub fn for_layer_count(count: usize) -> Self {
        match count {
            0..=2 => Self::two_layer(),
            3..=4 => Self::four_layer(),
            _ => Self::six_layer(),
        }
    }

    pub fn count(&self) -> usize {
        self.layers.len()
    }

    pub fn front(&self) -> LayerId {
        LayerId(0)
    }

    pub fn back(&self) -> LayerId {
        LayerId(self.layers.len() as u8 - 1)
    }

    pub fn get(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0 as usize)
    }

    pub fn is_enabled(&self, id: LayerId) -> bool {
        (id.0 as usize) < self.layers.len()
    }

    /// First layer with the given role, searching front to back.
    pub fn find_role(&self, role: LayerRole) -> Option<LayerId> {
        self.layers
            .iter()
            .position(|l| l.role == role)
            .map(|i| LayerId(i as u8))
    }

    pub fn iter(&self) -> impl Iterator<Item = (LayerId, &Layer)> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| (LayerId(i as u8), l))
    }
}

/// Copper trace: an ordered polyline on a single layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    pub net: NetId,
    pub layer: LayerId,
    pub width: f64,
    pub points: Vec<Point>,
}

impl Track {
    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance(w[1]))
            .sum()
    }
}

/// Plated hole connecting a pair of layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Via {
    pub net: NetId,
    pub at: Point,
    pub drill: f64,
    pub diameter: f64,
    pub layers: (LayerId, LayerId),
}

/// Thermal-relief spoke joining a pad to its zone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThermalSpoke {
    pub pad: Point,
    pub width: f64,
    pub gap: f64,
}

/// Poured copper region. The fill is stored as axis-aligned strips: the full
/// outline minus clearance halos around foreign copper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub net: NetId,
    pub layer: LayerId,
    pub outline: Rect,
    pub clearance: f64,
    pub fills: Vec<Rect>,
    pub spokes: Vec<ThermalSpoke>,
}

impl Zone {
    /// Filled area in mm², used for plane-coverage checks.
    pub fn filled_area(&self) -> f64 {
        self.fills.iter().map(|r| r.w * r.h).sum()
    }
}

/// Board form-factor preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetId {
    Eurorack,
    Eurorack1u,
    Pedal,
    PedalMini,
    Desktop,
    Rack,
    Custom,
}

impl PresetId {
    pub fn parse(name: &str) -> Option<PresetId> {
        Some(match name {
            "eurorack" => PresetId::Eurorack,
            "eurorack_1u" => PresetId::Eurorack1u,
            "pedal" => PresetId::Pedal,
            "pedal_mini" => PresetId::PedalMini,
            "desktop" => PresetId::Desktop,
            "rack" => PresetId::Rack,
            "custom" => PresetId::Custom,
            _ => return None,
        })
    }
}

/// Which board edge carries panel-mounted components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

/// Panel-mount spacing rules for module form factors.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PanelRules {
    pub edge: Edge,
    pub jack_pitch: f64,
    pub pot_pitch: f64,
    pub led_pitch: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManufacturingLimits {
    pub min_hole: f64,
    pub max_hole: f64,
    pub copper_weight_oz: u8,
    pub solder_mask: bool,
    pub silkscreen: bool,
    /// Presets intended for automated assembly require fiducials.
    pub requires_fiducials: bool,
}

/// A board size preset with its manufacturing envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Preset {
    pub id: PresetId,
    pub name: &'static str,
    pub width: f64,
    pub height: f64,
    pub min_track_width: f64,
    pub min_via_diameter: f64,
    pub min_clearance: f64,
    pub edge_clearance: f64,
    pub max_component_height: f64,
    /// Corner inset for mounting holes, when the preset has them.
    pub mounting_hole_inset: Option<f64>,
    pub panel: Option<PanelRules>,
    pub limits: ManufacturingLimits,
}

impl Preset {
    pub fn lookup(id: PresetId) -> Preset {
        Self::lookup_custom(id, 0.0, 0.0)
    }

    /// `Custom` takes the caller's dimensions; all other presets are fixed.
    pub fn lookup_custom(id: PresetId, width: f64, height: f64) -> Preset {
        let limits = ManufacturingLimits {
            min_hole: 0.3,
            max_hole: 3.5,
            copper_weight_oz: 1,
            solder_mask: true,
            silkscreen: true,
            requires_fiducials: false,
        };
        let panel = PanelRules {
            edge: Edge::Left,
            jack_pitch: 3.5,
            pot_pitch: 7.5,
            led_pitch: 5.0,
        };
        match id {
            PresetId::Eurorack => Preset {
                id,
                name: "Eurorack 3U",
                width: 128.5,
                height: 128.5,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 25.0,
                mounting_hole_inset: Some(3.5),
                panel: Some(panel),
                limits,
            },
            PresetId::Eurorack1u => Preset {
                id,
                name: "Eurorack 1U",
                width: 128.5,
                height: 42.5,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 15.0,
                mounting_hole_inset: Some(3.5),
                panel: Some(panel),
                limits,
            },
            PresetId::Pedal => Preset {
                id,
                name: "Standard Guitar Pedal",
                width: 125.0,
                height: 60.0,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 20.0,
                mounting_hole_inset: Some(3.5),
                panel: Some(panel),
                limits,
            },
            PresetId::PedalMini => Preset {
                id,
                name: "Mini Guitar Pedal",
                width: 90.0,
                height: 40.0,
                min_track_width: 0.15,
                min_via_diameter: 0.25,
                min_clearance: 0.15,
                edge_clearance: 1.5,
                max_component_height: 15.0,
                mounting_hole_inset: Some(3.5),
                panel: Some(panel),
                limits: ManufacturingLimits {
                    min_hole: 0.25,
                    ..limits
                },
            },
            PresetId::Desktop => Preset {
                id,
                name: "Desktop Unit",
                width: 200.0,
                height: 150.0,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 35.0,
                mounting_hole_inset: Some(3.5),
                panel: None,
                limits: ManufacturingLimits {
                    requires_fiducials: true,
                    ..limits
                },
            },
            PresetId::Rack => Preset {
                id,
                name: "Rack 1U",
                width: 483.0,
                height: 44.0,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 15.0,
                mounting_hole_inset: Some(3.5),
                panel: None,
                limits: ManufacturingLimits {
                    requires_fiducials: true,
                    ..limits
                },
            },
            PresetId::Custom => Preset {
                id,
                name: "Custom",
                width,
                height,
                min_track_width: 0.2,
                min_via_diameter: 0.3,
                min_clearance: 0.2,
                edge_clearance: 2.0,
                max_component_height: 25.0,
                mounting_hole_inset: None,
                panel: None,
                limits,
            },
        }
    }

    /// Mounting hole centers, corner-inset, when the preset defines them.
    pub fn mounting_holes(&self) -> Vec<Point> {
        match self.mounting_hole_inset {
            Some(inset) => vec![
                Point::new(inset, inset),
                Point::new(self.width - inset, inset),
                Point::new(inset, self.height - inset),
                Point::new(self.width - inset, self.height - inset),
            ],
            None => Vec::new(),
        }
    }
}

/// The board under construction. Single-owner mutable state: the pipeline
/// driver hands it to each stage exclusively in turn, and validation workers
/// see read-only snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct Board {
    pub preset: Preset,
    pub layers: LayerStack,
    pub tracks: Vec<Track>,
    pub vias: Vec<Via>,
    pub zones: Vec<Zone>,
    /// Component keep-out regions (mounting hardware, panel cutouts).
    pub keepouts: Vec<Rect>,
    /// Nets the router gave up on; validation reports them as connectivity
    /// violations.
    pub unrouted: Vec<NetId>,
}

impl Board {
    pub fn new(preset: Preset, layers: LayerStack) -> Self {
        Self {
            preset,
            layers,
            tracks: Vec::new(),
            vias: Vec::new(),
            zones: Vec::new(),
            keepouts: Vec::new(),
            unrouted: Vec::new(),
        }
    }

    pub fn outline(&self) -> Rect {
        Rect::new(0.0, 0.0, self.preset.width, self.preset.height)
    }

    /// Outline inset by the preset edge clearance: the placeable region.
    pub fn usable(&self) -> Rect {
        self.outline().inset(self.preset.edge_clearance)
    }

    /// Remove all copper belonging to a net (rip-up before re-route).
    pub fn rip_net(&mut self, net: NetId) {
        self.tracks.retain(|t| t.net != net);
        self.vias.retain(|v| v.net != net);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_match_form_factor_dimensions() {
        let euro = Preset::lookup(PresetId::Eurorack);
        assert_eq!((euro.width, euro.height), (128.5, 128.5));
        let pedal = Preset::lookup(PresetId::Pedal);
        assert_eq!((pedal.width, pedal.height), (125.0, 60.0));
        let rack = Preset::lookup(PresetId::Rack);
        assert_eq!((rack.width, rack.height), (483.0, 44.0));
    }

    #[test]
    fn mounting_holes_sit_at_corners() {
        let pedal = Preset::lookup(PresetId::Pedal);
        let holes = pedal.mounting_holes();
        assert_eq!(holes.len(), 4);
        assert_eq!(holes[0], Point::new(3.5, 3.5));
        assert_eq!(holes[3], Point::new(121.5, 56.5));
    }

    #[test]
    fn four_layer_stack_has_power_and_ground_inners() {
        let stack = LayerStack::four_layer();
        assert_eq!(stack.find_role(LayerRole::Power), Some(LayerId(1)));
        assert_eq!(stack.find_role(LayerRole::Ground), Some(LayerId(2)));
        assert_eq!(stack.back(), LayerId(3));
    }

    #[test]
    fn rip_net_removes_tracks_and_vias() {
        let mut board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        board.tracks.push(Track {
            net: NetId(0),
            layer: LayerId(0),
            width: 0.3,
            points: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)],
        });
        board.vias.push(Via {
            net: NetId(0),
            at: Point::new(5.0, 0.0),
            drill: 0.4,
            diameter: 0.8,
            layers: (LayerId(0), LayerId(1)),
        });
        board.rip_net(NetId(0));
        assert!(board.tracks.is_empty());
        assert!(board.vias.is_empty());
    }

    #[test]
    fn track_length_sums_segments() {
        let t = Track {
            net: NetId(0),
            layer: LayerId(0),
            width: 0.3,
            points: vec![
                Point::new(0.0, 0.0),
                Point::new(3.0, 0.0),
                Point::new(3.0, 4.0),
            ],
        };
        assert!((t.length() - 7.0).abs() < 1e-9);
    }
}
