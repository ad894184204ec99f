//! End-to-end pipeline scenarios: netlist in, finished board and report
//! out, covering the minimal circuit, an op-amp stage, infeasible
//! placement, the high-precision audio pass, and Falstad import.

use audiopcb::board::{Preset, PresetId};
use audiopcb::config::Config;
use audiopcb::falstad;
use audiopcb::kinds::{CapDielectric, ComponentKind, JackSize, OpAmpSlots};
use audiopcb::netlist::{Netlist, SignalClass};
use audiopcb_validate::rules::{BoardView, RuleEngine};
use audiopcb_validate::runner::{Runner, StageState};

/// One resistor between two audio nets, jack ground. The smallest real
/// board.
fn minimal_circuit(runner: &Runner) -> Netlist {
    let mut nl = Netlist::new();
    let r1 = nl
        .add_component(&runner.registry, ComponentKind::Resistor, "10k", None)
        .unwrap();
    let j1 = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let input = nl.add_net("IN", None).unwrap();
    nl.connect(input, j1, "TIP").unwrap();
    nl.connect(input, r1, "1").unwrap();
    let out = nl.add_net("OUT", None).unwrap();
    nl.connect(out, r1, "2").unwrap();
    nl.connect(out, j1, "RING").unwrap();
    let gnd = nl.add_net("GND", None).unwrap();
    nl.connect(gnd, j1, "SLEEVE").unwrap();
    nl
}

#[test]
fn minimal_two_component_circuit() {
    let runner = Runner::new(Config::default());
    let outcome = runner
        .run(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();

    assert_eq!(outcome.state, StageState::Finalized, "{:?}", outcome.report);
    assert!(outcome.report.is_valid);
    assert_eq!(outcome.report.error_count(), 0);

    // R1 sits in the middle of the board, orthogonally rotated.
    let r1 = outcome.netlist.find_component("R1").unwrap();
    let r1 = outcome.netlist.component(r1);
    let at = r1.position.unwrap();
    assert!(at.x > 125.0 / 4.0 && at.x < 125.0 * 3.0 / 4.0);
    assert_eq!(r1.rotation % 90, 0);

    // J1 pinned to the left panel edge.
    let j1 = outcome.netlist.find_component("J1").unwrap();
    let j1 = outcome.netlist.component(j1);
    assert!(j1.position.unwrap().x < 125.0 / 4.0);

    // Audio copper at audio width.
    let input = outcome.netlist.find_net("IN").unwrap();
    let audio_tracks: Vec<_> = outcome
        .board
        .tracks
        .iter()
        .filter(|t| t.net == input)
        .collect();
    assert!(!audio_tracks.is_empty(), "IN must be routed");
    assert!(audio_tracks.iter().all(|t| t.width == 0.3));

    // Ground pour exists.
    let gnd = outcome.netlist.find_net("GND").unwrap();
    assert!(outcome.board.zones.iter().any(|z| z.net == gnd));
}

#[test]
fn opamp_inverting_stage_with_decoupling() {
    let runner = Runner::new(Config::default());
    let mut nl = Netlist::new();
    let u1 = nl
        .add_component(&runner.registry, ComponentKind::OpAmp(OpAmpSlots::Dual), "TL072", None)
        .unwrap();
    let r1 = nl
        .add_component(&runner.registry, ComponentKind::Resistor, "10k", None)
        .unwrap();
    let r2 = nl
        .add_component(&runner.registry, ComponentKind::Resistor, "100k", None)
        .unwrap();
    let c1 = nl
        .add_component(
            &runner.registry,
            ComponentKind::Capacitor(CapDielectric::Film),
            "100nF",
            None,
        )
        .unwrap();
    let j_in = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let j_out = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();

    let input = nl.add_net("IN", None).unwrap();
    nl.connect(input, j_in, "TIP").unwrap();
    nl.connect(input, r1, "1").unwrap();
    let inv = nl.add_net("N_INV", None).unwrap();
    nl.connect(inv, r1, "2").unwrap();
    nl.connect(inv, u1, "IN-").unwrap();
    nl.connect(inv, r2, "1").unwrap();
    let out = nl.add_net("OUT", None).unwrap();
    nl.connect(out, r2, "2").unwrap();
    nl.connect(out, u1, "OUT").unwrap();
    nl.connect(out, j_out, "TIP").unwrap();
    let vplus = nl.add_net("+15V", None).unwrap();
    nl.connect(vplus, u1, "V+").unwrap();
    nl.connect(vplus, c1, "1").unwrap();
    let vminus = nl.add_net("-15V", None).unwrap();
    nl.connect(vminus, u1, "V-").unwrap();
    let gnd = nl.add_net("GND", None).unwrap();
    nl.connect(gnd, j_in, "SLEEVE").unwrap();
    nl.connect(gnd, j_out, "SLEEVE").unwrap();
    nl.connect(gnd, u1, "IN+").unwrap();
    nl.connect(gnd, c1, "2").unwrap();

    let outcome = runner.run(nl, Preset::lookup(PresetId::Pedal)).unwrap();
    assert_eq!(outcome.state, StageState::Finalized, "{:?}", outcome.report);

    // Decoupling: C1 serves the V+ pin within the configured distance.
    let u1 = outcome.netlist.find_component("U1").unwrap();
    let pin8 = outcome.netlist.component(u1).pin_position(8).unwrap();
    let c1 = outcome.netlist.find_component("C1").unwrap();
    let c1 = outcome.netlist.component(c1);
    let nearest = c1
        .pin_map
        .keys()
        .filter_map(|&n| c1.pin_position(n))
        .map(|p| p.distance(pin8))
        .fold(f64::INFINITY, f64::min);
    assert!(
        nearest <= 2.0 + 1e-6,
        "C1 pin is {nearest:.2} mm from U1 pin 8"
    );

    // Power copper at power width.
    let vplus = outcome.netlist.find_net("+15V").unwrap();
    assert!(outcome
        .board
        .tracks
        .iter()
        .filter(|t| t.net == vplus)
        .all(|t| t.width == 0.5));
}

#[test]
fn two_channel_board_finalizes_despite_coupling_pressure() {
    // Two parallel audio channels share a corridor from the panel jacks to
    // the center; any crosstalk finding must be remediated away before the
    // pipeline finalizes.
    let runner = Runner::new(Config::default());
    let mut nl = Netlist::new();
    let ja = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let jb = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let ra = nl
        .add_component(&runner.registry, ComponentKind::Resistor, "10k", None)
        .unwrap();
    let rb = nl
        .add_component(&runner.registry, ComponentKind::Resistor, "10k", None)
        .unwrap();
    let in_a = nl.add_net("IN_A", None).unwrap();
    nl.connect(in_a, ja, "TIP").unwrap();
    nl.connect(in_a, ra, "1").unwrap();
    let in_b = nl.add_net("IN_B", None).unwrap();
    nl.connect(in_b, jb, "TIP").unwrap();
    nl.connect(in_b, rb, "1").unwrap();
    let gnd = nl.add_net("GND", None).unwrap();
    nl.connect(gnd, ja, "SLEEVE").unwrap();
    nl.connect(gnd, jb, "SLEEVE").unwrap();

    let outcome = runner.run(nl, Preset::lookup(PresetId::Pedal)).unwrap();
    assert_eq!(outcome.state, StageState::Finalized, "{:?}", outcome.report);
    assert!(!outcome
        .report
        .issues
        .iter()
        .any(|i| i.severity >= audiopcb_validate::Severity::Error));
}

#[test]
fn placement_infeasible_names_component_and_persists_nothing() {
    let runner = Runner::new(Config::default());
    let mut nl = Netlist::new();
    for _ in 0..60 {
        nl.add_component(
            &runner.registry,
            ComponentKind::OpAmp(OpAmpSlots::Quad),
            "TL074",
            None,
        )
        .unwrap();
    }
    let err = runner.run(nl, Preset::lookup(PresetId::Pedal)).unwrap_err();
    match err {
        audiopcb::error::PipelineError::Placement(p) => {
            assert!(p.reference.starts_with('U'), "got {}", p.reference);
        }
        other => panic!("expected placement failure, got {other}"),
    }
}

#[test]
fn high_precision_audio_pass() {
    let mut config = Config::default();
    config.validation.extended_bandwidth_analysis = true;
    config.validation.max_frequency = 80_000.0;
    config.validation.response_points = 200;

    let runner = Runner::new(config);
    let outcome = runner
        .run(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();
    assert_eq!(outcome.state, StageState::Finalized, "{:?}", outcome.report);
    // Any frequency-response finding must carry the path suggestion and
    // document the RC-only model.
    for issue in outcome
        .report
        .issues
        .iter()
        .filter(|i| i.message.contains("-3 dB"))
    {
        assert_eq!(
            issue.suggestion.as_deref(),
            Some("shorten the path or widen the trace")
        );
        assert!(issue
            .details
            .as_deref()
            .unwrap_or("")
            .contains("no parasitic inductance"));
    }
}

#[test]
fn falstad_synth_chain_on_eurorack() {
    const SYNTH: &str = r#"{
        "elements": [
            {"id": "vco", "type": "vco", "value": "3340"},
            {"id": "vcf", "type": "vcf", "value": "2044"},
            {"id": "vca", "type": "vca", "value": "2164"},
            {"id": "j1", "type": "jack", "value": "", "properties": {"connector_type": "3.5mm"}},
            {"id": "j2", "type": "jack", "value": "", "properties": {"connector_type": "3.5mm"}}
        ],
        "wires": [
            {"net": "OSC_OUT", "endpoints": [
                {"component_id": "vco", "pin": "1"},
                {"component_id": "vcf", "pin": "1"}
            ]},
            {"net": "FILT_OUT", "endpoints": [
                {"component_id": "vcf", "pin": "2"},
                {"component_id": "vca", "pin": "1"}
            ]},
            {"net": "CH_OUT", "endpoints": [
                {"component_id": "vca", "pin": "2"},
                {"component_id": "j2", "pin": "TIP"}
            ]},
            {"net": "CV_IN", "endpoints": [
                {"component_id": "j1", "pin": "TIP"},
                {"component_id": "vco", "pin": "3"}
            ]},
            {"net": "GND", "endpoints": [
                {"component_id": "j1", "pin": "SLEEVE"},
                {"component_id": "j2", "pin": "SLEEVE"}
            ]}
        ]
    }"#;

    let runner = Runner::new(Config::default());
    let netlist = falstad::import(SYNTH, &runner.registry, true).unwrap();

    // Audio overrides resolve the chain to through-hole packages.
    for reference in ["U1", "U2", "U3"] {
        let id = netlist.find_component(reference).unwrap();
        assert!(
            netlist.component(id).footprint_id.starts_with("Package_DIP:"),
            "{reference} should be through-hole"
        );
    }

    let outcome = runner
        .run(netlist, Preset::lookup(PresetId::Eurorack))
        .unwrap();
    assert_eq!(outcome.state, StageState::Finalized, "{:?}", outcome.report);
    assert!(outcome.report.is_valid);

    // Panel jacks on the front edge at the eurorack pitch.
    let j1 = outcome.netlist.find_component("J1").unwrap();
    let j2 = outcome.netlist.find_component("J2").unwrap();
    let a = outcome.netlist.component(j1).bounding_box().unwrap();
    let b = outcome.netlist.component(j2).bounding_box().unwrap();
    assert!((a.x - b.x).abs() < 1e-6, "jacks share the panel column");
    let gap = (b.y - a.bottom()).abs().min((a.y - b.bottom()).abs());
    assert!((gap - 3.5).abs() < 1e-6, "jack pitch should be 3.5 mm, got {gap}");
}

#[test]
fn validation_is_idempotent_on_a_finalized_board() {
    let runner = Runner::new(Config::default());
    let outcome = runner
        .run(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();
    assert_eq!(outcome.state, StageState::Finalized);

    let engine = RuleEngine::with_default_rules();
    let config = Config::default();
    let view = BoardView::new(&outcome.netlist, &outcome.board, &config);
    let again = engine.validate(&view);
    assert_eq!(
        serde_json::to_string(&again.issues).unwrap(),
        serde_json::to_string(&outcome.report.issues).unwrap(),
        "re-validating a finalized board must reproduce its report"
    );
}

#[test]
fn refinement_is_bounded() {
    // A board that cannot become valid (digital net forced through an
    // audio-heavy corridor is fine; simplest: give the driver a budget of
    // one and an unroutable situation by disabling reroute attempts).
    let mut config = Config::default();
    config.pipeline.refinement_budget = 2;
    let runner = Runner::new(config);
    let outcome = runner
        .run(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();
    assert!(outcome.iterations <= 2, "budget must bound iterations");
}

#[test]
fn stricter_thresholds_never_reduce_issue_count() {
    let runner = Runner::new(Config::default());
    let baseline = runner
        .validate_only(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();

    let mut strict = Config::default();
    strict.validation.min_plane_coverage = 0.95;
    strict.validation.max_crosstalk = 1.0;
    strict.validation.max_ground_loop_area = 1.0;
    let strict_runner = Runner::new(strict);
    let stricter = strict_runner
        .validate_only(
            minimal_circuit(&strict_runner),
            Preset::lookup(PresetId::Pedal),
        )
        .unwrap();

    assert!(
        stricter.report.issues.len() >= baseline.report.issues.len(),
        "tightening thresholds must not drop issues"
    );
}

#[test]
fn signal_classes_survive_the_pipeline() {
    let runner = Runner::new(Config::default());
    let outcome = runner
        .run(minimal_circuit(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();
    let input = outcome.netlist.find_net("IN").unwrap();
    assert_eq!(outcome.netlist.net(input).class, SignalClass::Audio);
    let gnd = outcome.netlist.find_net("GND").unwrap();
    assert_eq!(outcome.netlist.net(gnd).class, SignalClass::Ground);
}
