//! Placement group assignment.
//!
//! Components map to one of five groups by kind (equivalently, by reference
//! prefix). A group carries the placement zone its members prefer, a
//! priority (lower places first), a spacing hint, and whether the group is
//! thermally sensitive.

use audiopcb::kinds::ComponentKind;

/// Where a group's members want to land on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    /// Middle third of the board (short signal paths).
    Center,
    /// Perimeter band (connectors, mechanical).
    Edges,
    /// Top band (power entry and regulation).
    Top,
    /// Disks around already-placed op-amps (feedback passives).
    NearOpamps,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSpec {
    pub name: &'static str,
    pub zone: ZoneKind,
    /// Lower places first. Op-amps and power anchor the board.
    pub priority: u8,
    /// Preferred member spacing as a fraction of the board min dimension.
    pub spacing_percentage: f64,
    /// Members count against the thermal density cap.
    pub thermal: bool,
}

pub const OPAMPS: GroupSpec = GroupSpec {
    name: "opamps",
    zone: ZoneKind::Center,
    priority: 1,
    spacing_percentage: 0.08,
    thermal: true,
};

pub const POWER: GroupSpec = GroupSpec {
    name: "power",
    zone: ZoneKind::Top,
    priority: 1,
    spacing_percentage: 0.10,
    thermal: true,
};

pub const CONNECTORS: GroupSpec = GroupSpec {
    name: "connectors",
    zone: ZoneKind::Edges,
    priority: 2,
    spacing_percentage: 0.06,
    thermal: false,
};

pub const PASSIVES: GroupSpec = GroupSpec {
    name: "passives",
    zone: ZoneKind::NearOpamps,
    priority: 3,
    spacing_percentage: 0.03,
    thermal: false,
};

pub const MECHANICAL: GroupSpec = GroupSpec {
    name: "mechanical",
    zone: ZoneKind::Edges,
    priority: 4,
    spacing_percentage: 0.05,
    thermal: false,
};

/// Group a component by its kind.
pub fn group_of(kind: ComponentKind) -> GroupSpec {
    use ComponentKind::*;
    match kind {
        OpAmp(_) | IcGeneric | Transistor(_) | Tube | Dac | Adc | Vco | Vcf | Vca | Logic
        | Timer => OPAMPS,
        Regulator | Transformer => POWER,
        Jack(_) | Speaker => CONNECTORS,
        MountingHole => MECHANICAL,
        _ => PASSIVES,
    }
}
