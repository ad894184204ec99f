//! Board backend capability.
//!
//! The pipeline does not know which CAD owns the final board file; it talks
//! to anything implementing [`BoardBackend`]. Shipped implementations: a
//! pure S-expression emitter compatible with KiCad-style board documents,
//! and a null backend for tests.

use crate::board::Board;
use crate::error::BackendError;
use crate::geom::{Point, Rect};
use crate::netlist::{Netlist, Side};
use std::fmt::Write as _;
use std::path::Path;

/// Abstract host-CAD capability. All geometry is mm; rotation degrees.
pub trait BoardBackend {
    #[allow(clippy::too_many_arguments)]
    fn place_footprint(
        &mut self,
        reference: &str,
        value: &str,
        footprint_id: &str,
        at: Point,
        rotation: u16,
        side: Side,
    ) -> Result<(), BackendError>;

    fn add_track(
        &mut self,
        net: &str,
        layer: &str,
        width: f64,
        from: Point,
        to: Point,
    ) -> Result<(), BackendError>;

    fn add_via(
        &mut self,
        net: &str,
        at: Point,
        drill: f64,
        diameter: f64,
        layers: (&str, &str),
    ) -> Result<(), BackendError>;

    fn add_zone(
        &mut self,
        net: &str,
        layer: &str,
        outline: Rect,
        clearance: f64,
    ) -> Result<(), BackendError>;

    /// Write the board to its native on-disk format.
    fn persist(&mut self, path: &Path) -> Result<(), BackendError>;
}

/// Walk a finished board and replay it into a backend.
pub fn emit(
    board: &Board,
    netlist: &Netlist,
    backend: &mut dyn BoardBackend,
) -> Result<(), BackendError> {
    for (_, comp) in netlist.iter_components() {
        if let Some(at) = comp.position {
            // Values are normalized to engineering notation where they
            // parse ("10k" stays "10.0k"); free-form values pass through.
            let value = crate::value::parse_eng(&comp.value)
                .map(|v| crate::value::format_eng(v, ""))
                .unwrap_or_else(|| comp.value.clone());
            backend.place_footprint(
                &comp.reference,
                &value,
                &comp.footprint_id,
                at,
                comp.rotation,
                comp.side,
            )?;
        }
    }
    for track in &board.tracks {
        let net = &netlist.net(track.net).name;
        let layer = &board.layers.get(track.layer).expect("enabled layer").name;
        for pair in track.points.windows(2) {
            backend.add_track(net, layer, track.width, pair[0], pair[1])?;
        }
    }
    for via in &board.vias {
        let net = &netlist.net(via.net).name;
        let from = &board.layers.get(via.layers.0).expect("enabled layer").name;
        let to = &board.layers.get(via.layers.1).expect("enabled layer").name;
        backend.add_via(net, via.at, via.drill, via.diameter, (from.as_str(), to.as_str()))?;
    }
    for zone in &board.zones {
        let net = &netlist.net(zone.net).name;
        let layer = &board.layers.get(zone.layer).expect("enabled layer").name;
        backend.add_zone(net, layer, zone.outline, zone.clearance)?;
    }
    Ok(())
}

/// Pure emitter of a KiCad-board-style S-expression document. No host CAD
/// required; the output is a plain text file.
#[derive(Debug, Default)]
pub struct SexprBackend {
    body: String,
}

impl SexprBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The document assembled so far (without writing to disk).
    pub fn document(&self) -> String {
        format!(
            "(kicad_pcb (version 20230121) (generator audiopcb)\n{})\n",
            self.body
        )
    }
}

impl BoardBackend for SexprBackend {
    fn place_footprint(
        &mut self,
        reference: &str,
        value: &str,
        footprint_id: &str,
        at: Point,
        rotation: u16,
        side: Side,
    ) -> Result<(), BackendError> {
        let layer = match side {
            Side::Top => "F.Cu",
            Side::Bottom => "B.Cu",
        };
        writeln!(
            self.body,
            "  (footprint \"{footprint_id}\" (layer \"{layer}\") (at {:.4} {:.4} {rotation})\n    (property \"Reference\" \"{reference}\") (property \"Value\" \"{value}\"))",
            at.x, at.y
        )
        .expect("string write");
        Ok(())
    }

    fn add_track(
        &mut self,
        net: &str,
        layer: &str,
        width: f64,
        from: Point,
        to: Point,
    ) -> Result<(), BackendError> {
        writeln!(
            self.body,
            "  (segment (start {:.4} {:.4}) (end {:.4} {:.4}) (width {width:.3}) (layer \"{layer}\") (net \"{net}\"))",
            from.x, from.y, to.x, to.y
        )
        .expect("string write");
        Ok(())
    }

    fn add_via(
        &mut self,
        net: &str,
        at: Point,
        drill: f64,
        diameter: f64,
        layers: (&str, &str),
    ) -> Result<(), BackendError> {
        writeln!(
            self.body,
            "  (via (at {:.4} {:.4}) (size {diameter:.3}) (drill {drill:.3}) (layers \"{}\" \"{}\") (net \"{net}\"))",
            at.x, at.y, layers.0, layers.1
        )
        .expect("string write");
        Ok(())
    }

    fn add_zone(
        &mut self,
        net: &str,
        layer: &str,
        outline: Rect,
        clearance: f64,
    ) -> Result<(), BackendError> {
        writeln!(
            self.body,
            "  (zone (net \"{net}\") (layer \"{layer}\") (connect_pads (clearance {clearance:.3}))\n    (polygon (pts (xy {:.4} {:.4}) (xy {:.4} {:.4}) (xy {:.4} {:.4}) (xy {:.4} {:.4}))))",
            outline.x,
            outline.y,
            outline.right(),
            outline.y,
            outline.right(),
            outline.bottom(),
            outline.x,
            outline.bottom()
        )
        .expect("string write");
        Ok(())
    }

    fn persist(&mut self, path: &Path) -> Result<(), BackendError> {
        std::fs::write(path, self.document())?;
        Ok(())
    }
}

/// Discards everything. Used by tests and `--validate-only` runs.
#[derive(Debug, Default)]
pub struct NullBackend;

impl BoardBackend for NullBackend {
    fn place_footprint(
        &mut self,
        _reference: &str,
        _value: &str,
        _footprint_id: &str,
        _at: Point,
        _rotation: u16,
        _side: Side,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn add_track(
        &mut self,
        _net: &str,
        _layer: &str,
        _width: f64,
        _from: Point,
        _to: Point,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn add_via(
        &mut self,
        _net: &str,
        _at: Point,
        _drill: f64,
        _diameter: f64,
        _layers: (&str, &str),
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn add_zone(
        &mut self,
        _net: &str,
        _layer: &str,
        _outline: Rect,
        _clearance: f64,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn persist(&mut self, _path: &Path) -> Result<(), BackendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sexpr_document_has_header_and_entries() {
        let mut backend = SexprBackend::new();
        backend
            .place_footprint(
                "R1",
                "10.0k",
                "Device:R_Axial_L9.0mm_D3.0mm_P10.16mm_Horizontal",
                Point::new(10.0, 20.0),
                90,
                Side::Top,
            )
            .unwrap();
        backend
            .add_track("IN", "F.Cu", 0.3, Point::new(0.0, 0.0), Point::new(5.0, 0.0))
            .unwrap();
        backend
            .add_via("GND", Point::new(5.0, 0.0), 0.4, 0.8, ("F.Cu", "B.Cu"))
            .unwrap();
        let doc = backend.document();
        assert!(doc.starts_with("(kicad_pcb"));
        assert!(doc.contains("(generator audiopcb)"));
        assert!(doc.contains("\"R1\""));
        assert!(doc.contains("(width 0.300)"));
        assert!(doc.contains("(drill 0.400)"));
    }

    #[test]
    fn persist_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.kicad_pcb");
        let mut backend = SexprBackend::new();
        backend
            .add_track("N1", "F.Cu", 0.2, Point::new(0.0, 0.0), Point::new(1.0, 0.0))
            .unwrap();
        backend.persist(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("(segment"));
    }
}
