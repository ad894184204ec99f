//! Criterion benchmarks for the full pipeline and the validation pass.

use audiopcb::board::{Preset, PresetId};
use audiopcb::config::Config;
use audiopcb::kinds::{CapDielectric, ComponentKind, JackSize, OpAmpSlots};
use audiopcb::netlist::Netlist;
use audiopcb_validate::rules::{BoardView, RuleEngine};
use audiopcb_validate::runner::Runner;
use criterion::{criterion_group, criterion_main, Criterion};

fn stage_netlist(runner: &Runner) -> Netlist {
    let mut nl = Netlist::new();
    let u1 = nl
        .add_component(&runner.registry, ComponentKind::OpAmp(OpAmpSlots::Dual), "TL072", None)
        .unwrap();
    let j_in = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let j_out = nl
        .add_component(&runner.registry, ComponentKind::Jack(JackSize::Mm35), "", None)
        .unwrap();
    let mut passive_nets = Vec::new();
    for i in 0..6 {
        let r = nl
            .add_component(&runner.registry, ComponentKind::Resistor, "10k", None)
            .unwrap();
        let net = nl.add_net(&format!("N{i}"), None).unwrap();
        nl.connect(net, r, "1").unwrap();
        passive_nets.push((r, net));
    }
    let c1 = nl
        .add_component(
            &runner.registry,
            ComponentKind::Capacitor(CapDielectric::Film),
            "100nF",
            None,
        )
        .unwrap();
    let input = nl.add_net("IN", None).unwrap();
    nl.connect(input, j_in, "TIP").unwrap();
    nl.connect(input, passive_nets[0].0, "2").unwrap();
    let out = nl.add_net("OUT", None).unwrap();
    nl.connect(out, j_out, "TIP").unwrap();
    nl.connect(out, u1, "OUT").unwrap();
    let rail = nl.add_net("+15V", None).unwrap();
    nl.connect(rail, u1, "V+").unwrap();
    nl.connect(rail, c1, "1").unwrap();
    let gnd = nl.add_net("GND", None).unwrap();
    nl.connect(gnd, j_in, "SLEEVE").unwrap();
    nl.connect(gnd, j_out, "SLEEVE").unwrap();
    nl.connect(gnd, c1, "2").unwrap();
    nl
}

fn bench_pipeline(c: &mut Criterion) {
    let runner = Runner::new(Config::default());
    c.bench_function("pipeline_pedal_opamp_stage", |b| {
        b.iter(|| {
            runner
                .run(stage_netlist(&runner), Preset::lookup(PresetId::Pedal))
                .unwrap()
        })
    });
}

fn bench_validation_pass(c: &mut Criterion) {
    let runner = Runner::new(Config::default());
    let outcome = runner
        .run(stage_netlist(&runner), Preset::lookup(PresetId::Pedal))
        .unwrap();
    let engine = RuleEngine::with_default_rules();
    let config = Config::default();
    c.bench_function("validation_pass", |b| {
        b.iter(|| {
            let view = BoardView::new(&outcome.netlist, &outcome.board, &config);
            engine.validate(&view)
        })
    });
}

criterion_group!(benches, bench_pipeline, bench_validation_pass);
criterion_main!(benches);
