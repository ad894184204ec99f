//! Core data model for the audio PCB generation pipeline.
//!
//! This crate holds everything the engines agree on:
//!
//! - [`kinds`] — the closed set of component kinds (tagged variants)
//! - [`registry`] — footprint / pin-map / prefix resolution with
//!   through-hole audio overrides
//! - [`netlist`] — the normalized netlist IR (arena-based, id-linked)
//! - [`board`] — board outline, layer stack, presets, copper artifacts
//! - [`config`] — hierarchical YAML configuration with audio defaults
//! - [`falstad`] — inbound JSON netlist adapter
//! - [`backend`] — the `BoardBackend` capability and the S-expression
//!   emitter
//! - [`error`] — the structured error taxonomy
//!
//! The placement/routing/zone engines live in `audiopcb-layout`; the rule
//! catalog, report, and pipeline driver live in `audiopcb-validate`.

pub mod backend;
pub mod board;
pub mod config;
pub mod error;
pub mod falstad;
pub mod geom;
pub mod kinds;
pub mod netlist;
pub mod registry;
pub mod value;

pub use board::{Board, LayerId, LayerRole, LayerStack, Preset, PresetId, Track, Via, Zone};
pub use config::Config;
pub use error::{
    BackendError, ConfigError, NetlistError, PipelineError, PlacementInfeasible, RegistryError,
    RoutingInfeasible,
};
pub use kinds::ComponentKind;
pub use netlist::{Component, ComponentId, Net, NetId, Netlist, SignalClass, Side};
pub use registry::{FootprintRecord, Registry};
