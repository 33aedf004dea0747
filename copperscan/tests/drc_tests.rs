//! Integration tests for the design rule checker.

use copperscan::prelude::*;
use copperscan::{
    Component, ComponentId, GroupMember, Layer, LayerGroup, LayerId, Line, LineId, Polygon, Pv,
    PvId, Side, SilkLine,
};

fn rules() -> DesignRules {
    DesignRules {
        bloat: 1_000,
        shrink: 0,
        min_wid: 1_000,
        min_slk: 1_000,
        min_drill: 500,
        min_ring: 500,
    }
}

fn board_with_rules(rules: DesignRules) -> Board {
    Board {
        rules,
        layers: vec![Layer {
            name: "top".into(),
            ..Layer::default()
        }],
        groups: vec![LayerGroup {
            members: vec![
                GroupMember::Copper(LayerId(0)),
                GroupMember::PadSide(Side::Component),
            ],
        }],
        ..Board::default()
    }
}

fn line_of_thickness(thickness: i64) -> Line {
    Line {
        p1: Point::new(0, 0),
        p2: Point::new(50_000, 0),
        thickness,
        clearance: 10_000,
        flags: Flags::NONE,
    }
}

fn via_at(x: i64, y: i64, thickness: i64, drill: i64) -> Pv {
    Pv {
        pos: Point::new(x, y),
        thickness,
        drill,
        clearance: 10_000,
        component: None,
        intconn: 0,
        therm_layers: 0,
        name: None,
        flags: Flags::NONE,
    }
}

#[test]
fn test_line_at_minimum_width_is_clean() {
    let mut board = board_with_rules(rules());
    board.layers[0].lines.push(line_of_thickness(1_000));

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 0);
    assert!(!summary.aborted);
}

#[test]
fn test_thin_line_reports_one_violation() {
    let mut board = board_with_rules(rules());
    board.layers[0].lines.push(line_of_thickness(999));

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 1);
    let v = &sink.violations[0];
    assert_eq!(v.title, "Line width is too thin");
    assert_eq!(v.measured, Some(999));
    assert_eq!(v.required, 1_000);
    assert_eq!(
        v.objects,
        vec![ObjRef::Line(LineId {
            layer: LayerId(0),
            index: 0
        })]
    );
}

#[test]
fn test_annular_ring_boundary() {
    // ring of exactly min_ring is clean
    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 2_000, 1_000));
    let mut sink = ViolationCollector::default();
    assert_eq!(check_board(&mut board, &mut sink).violation_count, 0);

    // one unit under produces exactly one violation with the measurement
    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 1_998, 1_000));
    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 1);
    let v = &sink.violations[0];
    assert_eq!(v.title, "Via annular ring too small");
    assert_eq!(v.measured, Some(499));
    assert_eq!(v.required, 500);
}

#[test]
fn test_hole_skips_ring_rule() {
    let mut board = board_with_rules(rules());
    let mut hole = via_at(0, 0, 1_000, 1_000);
    hole.flags = Flags::HOLE;
    board.pvs.push(hole);

    let mut sink = ViolationCollector::default();
    assert_eq!(check_board(&mut board, &mut sink).violation_count, 0);
}

#[test]
fn test_small_drill_reported() {
    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 2_000, 499));

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 1);
    assert_eq!(sink.violations[0].title, "Via drill size is too small");
    assert_eq!(sink.violations[0].measured, Some(499));
}

#[test]
fn test_short_detected_under_bloat() {
    let mut rules = rules();
    rules.bloat = 5_000;
    let mut board = board_with_rules(rules);
    // net A: via plus trace at y = 0
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 0),
        p2: Point::new(50_000, 0),
        thickness: 1_000,
        clearance: 20_000,
        flags: Flags::NONE,
    });
    // net B: parallel trace 5500 away, separate at nominal size
    board.pvs.push(via_at(50_000, 5_500, 2_000, 800));
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 5_500),
        p2: Point::new(50_000, 5_500),
        thickness: 1_000,
        clearance: 20_000,
        flags: Flags::NONE,
    });

    let mut sink = ViolationCollector::default();
    let mut engine = DrcEngine::new(&mut board);
    let aborted = engine.check_net(ObjRef::Pv(PvId(0)), &mut sink);
    assert!(!aborted);
    assert_eq!(sink.violations.len(), 1);
    assert_eq!(sink.violations[0].title, "Copper areas too close");
    assert_eq!(sink.violations[0].required, 5_000);
}

#[test]
fn test_short_reported_once_per_net_side() {
    let mut rules = rules();
    rules.bloat = 5_000;
    let mut board = board_with_rules(rules);
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 0),
        p2: Point::new(50_000, 0),
        thickness: 1_000,
        clearance: 20_000,
        flags: Flags::NONE,
    });
    board.pvs.push(via_at(50_000, 4_500, 2_000, 800));
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 4_500),
        p2: Point::new(50_000, 4_500),
        thickness: 1_000,
        clearance: 20_000,
        flags: Flags::NONE,
    });

    // the whole-board pass seeds both nets; each one reports the short
    // exactly once and the run settles
    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert!(!summary.aborted);
    assert_eq!(summary.violation_count, 2);
    assert!(sink
        .violations
        .iter()
        .all(|v| v.title == "Copper areas too close"));
}

#[test]
fn test_separate_nets_clean_without_bloat_overlap() {
    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.pvs.push(via_at(500_000, 500_000, 2_000, 800));

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 0);
}

#[test]
fn test_broken_trace_under_shrink() {
    let mut rules = rules();
    rules.shrink = 1_000;
    let mut board = board_with_rules(rules);
    // trace starts exactly at the copper edge of the via: connected at
    // nominal size, lost when the copper shrinks
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.layers[0].lines.push(Line {
        p1: Point::new(1_500, 0),
        p2: Point::new(50_000, 0),
        thickness: 1_000,
        clearance: 20_000,
        flags: Flags::NONE,
    });

    let mut sink = ViolationCollector::default();
    let mut engine = DrcEngine::new(&mut board);
    engine.check_net(ObjRef::Pv(PvId(0)), &mut sink);
    assert!(sink
        .violations
        .iter()
        .any(|v| v.title == "Potential for broken trace"));
}

#[test]
fn test_plow_rule_flags_tight_clearance() {
    let mut board = board_with_rules(rules());
    board.layers[0].polygons.push(Polygon {
        contour: vec![
            Point::new(-10_000, -10_000),
            Point::new(60_000, -10_000),
            Point::new(60_000, 10_000),
            Point::new(-10_000, 10_000),
        ],
        flags: Flags::CLEARPOLY,
    });
    // clearance 1500 < 2 * bloat (2000)
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 0),
        p2: Point::new(50_000, 0),
        thickness: 1_000,
        clearance: 1_500,
        flags: Flags::CLEARLINE,
    });

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 1);
    assert_eq!(
        sink.violations[0].title,
        "Line with insufficient clearance inside polygon"
    );
}

#[test]
fn test_plow_rule_passes_wide_clearance() {
    let mut board = board_with_rules(rules());
    board.layers[0].polygons.push(Polygon {
        contour: vec![
            Point::new(-10_000, -10_000),
            Point::new(60_000, -10_000),
            Point::new(60_000, 10_000),
            Point::new(-10_000, 10_000),
        ],
        flags: Flags::CLEARPOLY,
    });
    board.layers[0].lines.push(Line {
        p1: Point::new(0, 0),
        p2: Point::new(50_000, 0),
        thickness: 1_000,
        clearance: 2_000,
        flags: Flags::CLEARLINE,
    });

    let mut sink = ViolationCollector::default();
    assert_eq!(check_board(&mut board, &mut sink).violation_count, 0);
}

#[test]
fn test_silk_violations_grouped_per_component() {
    let mut board = board_with_rules(rules());
    board.components.push(Component {
        refdes: "U1".into(),
        flags: Flags::NONE,
    });
    for i in 0..2 {
        board.silk.push(SilkLine {
            p1: Point::new(0, i * 2_000),
            p2: Point::new(10_000, i * 2_000),
            thickness: 500,
            component: Some(ComponentId(0)),
            flags: Flags::NONE,
        });
    }
    board.silk.push(SilkLine {
        p1: Point::new(0, 50_000),
        p2: Point::new(10_000, 50_000),
        thickness: 500,
        component: None,
        flags: Flags::NONE,
    });

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 2);
    assert_eq!(sink.violations[0].title, "Silk line is too thin");
    assert_eq!(
        sink.violations[1].title,
        "Element U1 has 2 silk lines which are too thin"
    );
}

#[test]
fn test_abort_yields_negative_count() {
    struct AbortFirst;
    impl ViolationSink for AbortFirst {
        fn report(&mut self, _v: &Violation) -> Verdict {
            Verdict::Abort
        }
    }

    let mut board = board_with_rules(rules());
    board.layers[0].lines.push(line_of_thickness(500));
    board.layers[0].lines.push(line_of_thickness(500));

    let mut sink = AbortFirst;
    let summary = check_board(&mut board, &mut sink);
    assert!(summary.aborted);
    assert_eq!(summary.violation_count, 1);
    assert_eq!(summary.signed_count(), -1);
}

#[test]
fn test_nopaste_pads_counted() {
    let mut board = board_with_rules(rules());
    board.components.push(Component {
        refdes: "U1".into(),
        flags: Flags::NONE,
    });
    board.pads.push(copperscan::Pad {
        p1: Point::new(0, 0),
        p2: Point::new(5_000, 0),
        thickness: 2_000,
        clearance: 10_000,
        component: ComponentId(0),
        intconn: 0,
        name: Some("1".into()),
        flags: Flags::NOPASTE,
    });

    let mut sink = ViolationCollector::default();
    let summary = check_board(&mut board, &mut sink);
    assert_eq!(summary.violation_count, 0);
    assert_eq!(summary.nopaste_pads, 1);
}

#[test]
fn test_board_loaded_from_file_checks_clean() {
    use std::io::Write;

    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.layers[0].lines.push(line_of_thickness(1_000));
    let json = serde_json::to_string(&board).unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let mut loaded: Board = serde_json::from_str(&text).unwrap();
    let mut sink = ViolationCollector::default();
    assert_eq!(check_board(&mut loaded, &mut sink).violation_count, 0);
}

#[test]
fn test_run_leaves_no_transient_marks() {
    let mut board = board_with_rules(rules());
    board.pvs.push(via_at(0, 0, 2_000, 800));
    board.layers[0].lines.push(line_of_thickness(1_000));

    let mut sink = ViolationCollector::default();
    check_board(&mut board, &mut sink);
    for pv in &board.pvs {
        assert!(!pv.flags.intersects(Flags::VISIT_MASK));
    }
    for line in &board.layers[0].lines {
        assert!(!line.flags.intersects(Flags::VISIT_MASK));
    }
}
