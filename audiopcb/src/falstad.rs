//! Falstad-style netlist ingestion.
//!
//! Reads the normalized inbound JSON document (two top-level arrays:
//! `elements` and `wires`) as produced by the Falstad simulator export
//! adapter, and builds the strict netlist IR. Unknown component types are
//! rejected up front in strict mode, or skipped with a warning otherwise.

use crate::error::NetlistError;
use crate::kinds::ComponentKind;
use crate::netlist::{ComponentId, Netlist, SignalClass};
use crate::registry::Registry;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct Document {
    elements: Vec<Element>,
    wires: Vec<Wire>,
}

#[derive(Debug, Deserialize)]
struct Element {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    package: Option<String>,
    pins: Option<u32>,
    transistor_type: Option<String>,
    connector_type: Option<String>,
    capacitor_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Wire {
    net: String,
    #[serde(default)]
    class: Option<SignalClass>,
    endpoints: Vec<WireEndpoint>,
}

#[derive(Debug, Deserialize)]
struct WireEndpoint {
    component_id: String,
    pin: String,
}

impl Element {
    /// Sub-family hint for `ComponentKind::parse`, highest priority first.
    fn hint(&self) -> Option<&str> {
        self.properties
            .transistor_type
            .as_deref()
            .or(self.properties.connector_type.as_deref())
            .or(self.properties.capacitor_type.as_deref())
            .or(match self.properties.pins {
                Some(14) => Some("14"),
                Some(8) => Some("8"),
                _ => None,
            })
    }
}

/// Import a netlist document. `strict` rejects unsupported component types;
/// otherwise they are skipped (together with wires that touch them).
pub fn import(
    json: &str,
    registry: &Registry,
    strict: bool,
) -> Result<Netlist, NetlistError> {
    let doc: Document = serde_json::from_str(json).map_err(|e| NetlistError::Malformed {
        detail: e.to_string(),
    })?;
    import_document(doc, registry, strict)
}

fn import_document(
    doc: Document,
    registry: &Registry,
    strict: bool,
) -> Result<Netlist, NetlistError> {
    let mut netlist = Netlist::new();
    let mut ids: BTreeMap<String, ComponentId> = BTreeMap::new();

    for elem in &doc.elements {
        if ids.contains_key(&elem.id) {
            return Err(NetlistError::DuplicateComponent {
                id: elem.id.clone(),
            });
        }
        let kind = match ComponentKind::parse(&elem.kind, elem.hint()) {
            Some(kind) => kind,
            None if strict => {
                return Err(NetlistError::UnsupportedKind {
                    name: elem.kind.clone(),
                })
            }
            None => {
                warn!(kind = %elem.kind, id = %elem.id, "skipping unsupported component type");
                continue;
            }
        };
        let id = netlist.add_component(
            registry,
            kind,
            &elem.value,
            elem.properties.package.as_deref(),
        )?;
        ids.insert(elem.id.clone(), id);
    }

    for wire in &doc.wires {
        let net = netlist.add_net(&wire.net, wire.class)?;
        for ep in &wire.endpoints {
            match ids.get(&ep.component_id) {
                Some(&component) => netlist.connect(net, component, &ep.pin)?,
                None if strict => {
                    return Err(NetlistError::UnknownComponent {
                        id: ep.component_id.clone(),
                    })
                }
                None => {
                    warn!(net = %wire.net, component = %ep.component_id,
                          "dropping endpoint of skipped component");
                }
            }
        }
    }

    Ok(netlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::SignalClass;

    const TWO_COMPONENT: &str = r#"{
        "elements": [
            {"id": "r1", "type": "resistor", "value": "10k"},
            {"id": "j1", "type": "jack", "value": "", "properties": {"connector_type": "3.5mm"}}
        ],
        "wires": [
            {"net": "IN", "endpoints": [
                {"component_id": "j1", "pin": "TIP"},
                {"component_id": "r1", "pin": "1"}
            ]},
            {"net": "GND", "endpoints": [{"component_id": "j1", "pin": "SLEEVE"}]}
        ]
    }"#;

    #[test]
    fn imports_components_and_wires() {
        let netlist = import(TWO_COMPONENT, &Registry::default(), true).unwrap();
        assert_eq!(netlist.component_count(), 2);
        assert_eq!(netlist.net_count(), 2);
        let in_net = netlist.find_net("IN").unwrap();
        assert_eq!(netlist.net(in_net).endpoints.len(), 2);
        // Touching the jack upgrades IN to an audio net.
        assert_eq!(netlist.net(in_net).class, SignalClass::Audio);
        let gnd = netlist.find_net("GND").unwrap();
        assert_eq!(netlist.net(gnd).class, SignalClass::Ground);
    }

    #[test]
    fn strict_rejects_unknown_type() {
        let json = r#"{"elements": [{"id": "x", "type": "warp_core"}], "wires": []}"#;
        let err = import(json, &Registry::default(), true).unwrap_err();
        assert!(matches!(err, NetlistError::UnsupportedKind { .. }));
    }

    #[test]
    fn lenient_skips_unknown_type_and_its_wires() {
        let json = r#"{
            "elements": [
                {"id": "x", "type": "warp_core"},
                {"id": "r1", "type": "resistor", "value": "1k"}
            ],
            "wires": [
                {"net": "N1", "endpoints": [
                    {"component_id": "x", "pin": "1"},
                    {"component_id": "r1", "pin": "1"}
                ]}
            ]
        }"#;
        let netlist = import(json, &Registry::default(), false).unwrap();
        assert_eq!(netlist.component_count(), 1);
        let n1 = netlist.find_net("N1").unwrap();
        assert_eq!(netlist.net(n1).endpoints.len(), 1);
    }

    #[test]
    fn transistor_subtype_from_properties() {
        let json = r#"{
            "elements": [
                {"id": "q1", "type": "transistor", "value": "2N5457",
                 "properties": {"transistor_type": "jfet"}}
            ],
            "wires": []
        }"#;
        let netlist = import(json, &Registry::default(), true).unwrap();
        let (_, comp) = netlist.iter_components().next().unwrap();
        assert_eq!(comp.kind.kind_str(), "transistor-jfet");
        assert_eq!(comp.pin_map[&2], "G");
    }

    #[test]
    fn missing_arrays_are_malformed() {
        let err = import(r#"{"elements": []}"#, &Registry::default(), true).unwrap_err();
        assert!(matches!(err, NetlistError::Malformed { .. }));
    }

    #[test]
    fn duplicate_element_id_rejected() {
        let json = r#"{
            "elements": [
                {"id": "r1", "type": "resistor"},
                {"id": "r1", "type": "resistor"}
            ],
            "wires": []
        }"#;
        let err = import(json, &Registry::default(), true).unwrap_err();
        assert!(matches!(err, NetlistError::DuplicateComponent { .. }));
    }
}
