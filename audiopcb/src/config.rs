//! Hierarchical pipeline configuration.
//!
//! Loadable from YAML; every section has defaults matching the audio design
//! rules the engines assume, so an empty file is a valid configuration.
//! Units: distance mm, frequency Hz, voltage V, current A, temperature °C,
//! impedance Ω, angle degrees.

use crate::error::ConfigError;
use crate::netlist::SignalClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub placement: PlacementConfig,
    pub routing: RoutingConfig,
    pub zones: ZoneConfig,
    pub validation: ValidationConfig,
    pub pipeline: PipelineConfig,
    /// Prefer through-hole footprints (default for audio builds).
    #[serde(default = "default_true")]
    pub prefer_through_hole: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            routing: RoutingConfig::default(),
            zones: ZoneConfig::default(),
            validation: ValidationConfig::default(),
            pipeline: PipelineConfig::default(),
            prefer_through_hole: true,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Range-check every numeric the engines depend on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
            if value < min || value > max {
                return Err(ConfigError::OutOfRange {
                    field: field.to_string(),
                    value,
                    min,
                    max,
                });
            }
            Ok(())
        }
        range(
            "placement.margin_percentage",
            self.placement.margin_percentage,
            0.0,
            0.5,
        )?;
        range(
            "placement.grid_spacing_percentage",
            self.placement.grid_spacing_percentage,
            0.001,
            0.25,
        )?;
        range("routing.grid_step", self.routing.grid_step, 0.1, 5.0)?;
        range("routing.via_diameter", self.routing.via_diameter, 0.2, 3.0)?;
        range("routing.via_drill", self.routing.via_drill, 0.1, self.routing.via_diameter)?;
        for (class, rule) in &self.routing.classes {
            let label = format!("routing.classes.{}", class.as_str());
            range(&format!("{label}.min_width"), rule.min_width, 0.05, 5.0)?;
            range(&format!("{label}.min_clearance"), rule.min_clearance, 0.05, 5.0)?;
        }
        range(
            "zones.min_zone_clearance",
            self.zones.min_zone_clearance,
            0.1,
            5.0,
        )?;
        range(
            "validation.warning_threshold",
            self.validation.warning_threshold,
            0.0,
            1.0,
        )?;
        if self.validation.error_threshold < self.validation.warning_threshold {
            return Err(ConfigError::OutOfRange {
                field: "validation.error_threshold".into(),
                value: self.validation.error_threshold,
                min: self.validation.warning_threshold,
                max: 1.0,
            });
        }
        if self.pipeline.refinement_budget == 0 {
            return Err(ConfigError::OutOfRange {
                field: "pipeline.refinement_budget".into(),
                value: 0.0,
                min: 1.0,
                max: f64::MAX,
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Placement
// ---------------------------------------------------------------------------

/// A stability component (ferrite bead, EMC filter, bulk decoupling, audio
/// band-limit filter) pinned to fixed percentage-of-board coordinates before
/// general placement runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StabilityComponent {
    /// Reference of the netlist component to pin (e.g. `FB1`).
    pub reference: String,
    /// Fraction of board width, 0..1.
    pub x_percentage: f64,
    /// Fraction of board height, 0..1.
    pub y_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Inset of all placement zones from the board outline.
    pub margin_percentage: f64,
    /// Radius of the near-opamp disks, as a fraction of the board min
    /// dimension.
    pub center_spacing_percentage: f64,
    /// Candidate grid pitch, as a fraction of the board min dimension.
    pub grid_spacing_percentage: f64,
    /// Minimum courtyard-to-courtyard gap between any two components.
    pub min_component_spacing: f64,
    /// Thermal rule: cap on already-placed neighbors within the radius.
    pub max_nearby_components: usize,
    pub max_component_density_radius: f64,
    /// Decoupling capacitors are pulled within this distance of the IC
    /// power pin they serve.
    pub decoupling_cap_distance: f64,
    pub stability_components: Vec<StabilityComponent>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            margin_percentage: 0.10,
            center_spacing_percentage: 0.15,
            grid_spacing_percentage: 0.02,
            min_component_spacing: 0.5,
            max_nearby_components: 4,
            max_component_density_radius: 12.0,
            decoupling_cap_distance: 2.0,
            stability_components: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Layer preference names resolved against the actual stack at routing time
/// (inner preferences degrade to back copper on two-layer boards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerPref {
    Front,
    Inner1,
    Inner2,
    Back,
}

/// Per-signal-class routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRule {
    pub min_width: f64,
    pub min_clearance: f64,
    pub max_length: f64,
    pub preferred_layer: LayerPref,
    pub avoid_layers: Vec<LayerPref>,
    pub needs_ground_plane: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Lattice pitch for the path search.
    pub grid_step: f64,
    pub via_diameter: f64,
    pub via_drill: f64,
    /// Cost of inserting a via, in mm-equivalent track length.
    pub via_preference: f64,
    /// Cost multiplier for running on a non-preferred layer.
    pub off_layer_penalty: f64,
    /// Parallel runs beyond this length accrue crosstalk cost.
    pub max_parallel_length: f64,
    pub parallel_penalty: f64,
    /// Rip-up budget: how many already-routed nets may be torn out while
    /// retrying a failing net.
    pub max_reroute_attempts: usize,
    pub classes: BTreeMap<SignalClass, ClassRule>,
}

impl RoutingConfig {
    pub fn class_rule(&self, class: SignalClass) -> &ClassRule {
        self.classes
            .get(&class)
            .or_else(|| self.classes.get(&SignalClass::Control))
            .expect("routing config always carries a control-class rule")
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let mut classes = BTreeMap::new();
        classes.insert(
            SignalClass::Audio,
            ClassRule {
                min_width: 0.3,
                min_clearance: 0.3,
                max_length: 100.0,
                preferred_layer: LayerPref::Front,
                avoid_layers: vec![LayerPref::Back],
                needs_ground_plane: true,
            },
        );
        classes.insert(
            SignalClass::Power,
            ClassRule {
                min_width: 0.5,
                min_clearance: 0.3,
                max_length: 50.0,
                preferred_layer: LayerPref::Inner1,
                avoid_layers: vec![LayerPref::Front, LayerPref::Back],
                needs_ground_plane: true,
            },
        );
        classes.insert(
            SignalClass::Ground,
            ClassRule {
                min_width: 0.5,
                min_clearance: 0.3,
                max_length: 50.0,
                preferred_layer: LayerPref::Inner2,
                avoid_layers: vec![LayerPref::Front, LayerPref::Back],
                needs_ground_plane: false,
            },
        );
        classes.insert(
            SignalClass::Control,
            ClassRule {
                min_width: 0.2,
                min_clearance: 0.2,
                max_length: 200.0,
                preferred_layer: LayerPref::Back,
                avoid_layers: vec![LayerPref::Front],
                needs_ground_plane: false,
            },
        );
        classes.insert(
            SignalClass::Digital,
            ClassRule {
                min_width: 0.2,
                min_clearance: 0.3,
                max_length: 200.0,
                preferred_layer: LayerPref::Back,
                avoid_layers: Vec::new(),
                needs_ground_plane: true,
            },
        );
        classes.insert(
            SignalClass::HighSpeed,
            ClassRule {
                min_width: 0.2,
                min_clearance: 0.3,
                max_length: 50.0,
                preferred_layer: LayerPref::Front,
                avoid_layers: Vec::new(),
                needs_ground_plane: true,
            },
        );
        Self {
            grid_step: 1.27,
            via_diameter: 0.8,
            via_drill: 0.4,
            via_preference: 5.0,
            off_layer_penalty: 2.0,
            max_parallel_length: 10.0,
            parallel_penalty: 4.0,
            max_reroute_attempts: 3,
            classes,
        }
    }
}

// ---------------------------------------------------------------------------
// Zones
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Clearance from a pour to foreign-net copper.
    pub min_zone_clearance: f64,
    pub min_thermal_bridge: f64,
    pub max_thermal_bridge: f64,
    pub min_thermal_gap: f64,
    pub max_thermal_gap: f64,
    /// Route all ground returns to a single star point instead of relieving
    /// each pad into the plane.
    pub star_ground: bool,
    /// Star point in mm; when absent with `star_ground` set, the pour falls
    /// back to nearest-pad thermal relief.
    pub star_point: Option<(f64, f64)>,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_zone_clearance: 0.5,
            min_thermal_bridge: 0.3,
            max_thermal_bridge: 0.5,
            min_thermal_gap: 0.5,
            max_thermal_gap: 1.0,
            star_ground: false,
            star_point: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub check_drc: bool,
    pub check_connectivity: bool,
    pub check_power: bool,
    pub check_ground: bool,
    pub check_signal_integrity: bool,
    pub check_emi: bool,
    pub check_thermal: bool,
    pub check_audio: bool,
    pub check_manufacturing: bool,

    /// Numeric 0..1 issue scores map to severities at these bucket edges.
    pub warning_threshold: f64,
    pub error_threshold: f64,
    pub critical_threshold: f64,

    pub max_voltage_drop: f64,
    pub max_current_density: f64,
    pub min_plane_coverage: f64,
    pub max_ground_loop_area: f64,
    pub min_ground_connections: usize,
    pub impedance_tolerance: f64,
    /// Crosstalk proxy cap: parallel length (mm) divided by spacing (mm).
    pub max_crosstalk: f64,
    pub max_loop_area: f64,
    pub max_temperature_rise: f64,
    pub min_thermal_pad_size: f64,
    pub max_dissipating_density: usize,
    pub dissipating_density_radius: f64,
    /// Predicted −3 dB point must stay above the analysis band.
    pub min_response_flatness_db: f64,
    pub extended_bandwidth_analysis: bool,
    /// Upper edge of the frequency-response sweep.
    pub max_frequency: f64,
    pub response_points: usize,
    pub min_annular_ring: f64,
    pub min_silk_width: f64,
    pub min_mask_width: f64,
    pub require_test_points: bool,
    pub min_fiducials: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            check_drc: true,
            check_connectivity: true,
            check_power: true,
            check_ground: true,
            check_signal_integrity: true,
            check_emi: true,
            check_thermal: true,
            check_audio: true,
            check_manufacturing: true,
            warning_threshold: 0.3,
            error_threshold: 0.7,
            critical_threshold: 0.9,
            max_voltage_drop: 0.1,
            max_current_density: 35.0,
            min_plane_coverage: 0.5,
            max_ground_loop_area: 100.0,
            min_ground_connections: 1,
            impedance_tolerance: 0.2,
            max_crosstalk: 20.0,
            max_loop_area: 500.0,
            max_temperature_rise: 40.0,
            min_thermal_pad_size: 4.0,
            max_dissipating_density: 3,
            dissipating_density_radius: 15.0,
            min_response_flatness_db: 3.0,
            extended_bandwidth_analysis: false,
            max_frequency: 20_000.0,
            response_points: 200,
            min_annular_ring: 0.15,
            min_silk_width: 0.15,
            min_mask_width: 0.1,
            require_test_points: false,
            min_fiducials: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum refinement iterations before giving up.
    pub refinement_budget: usize,
    /// Wall-clock deadline for the whole run, milliseconds.
    pub deadline_ms: Option<u64>,
    /// Copper layer count (2, 4, or 6).
    pub layer_count: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            refinement_budget: 4,
            deadline_ms: None,
            layer_count: 2,
        }
    }
}
