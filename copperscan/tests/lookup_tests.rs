//! Integration tests for the connectivity lookup engine.

use copperscan::prelude::*;
use copperscan::{
    ComponentId, FlagUndo, GroupId, GroupMember, Layer, LayerGroup, LayerId, Line, LineId, PolyId,
    Polygon, Pv, PvId, Rat, RatId, Side,
};

fn via_at(x: i64, y: i64) -> Pv {
    Pv {
        pos: Point::new(x, y),
        thickness: 2_000,
        drill: 800,
        clearance: 0,
        component: None,
        intconn: 0,
        therm_layers: 0,
        name: None,
        flags: Flags::NONE,
    }
}

fn line_between(x1: i64, y1: i64, x2: i64, y2: i64) -> Line {
    Line {
        p1: Point::new(x1, y1),
        p2: Point::new(x2, y2),
        thickness: 1_000,
        clearance: 0,
        flags: Flags::NONE,
    }
}

fn one_layer_board() -> Board {
    Board {
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

fn found_set(board: &mut Board, seed: ObjRef, bloat: i64, rats: bool) -> Vec<ObjRef> {
    let opts = LookupOptions {
        bloat,
        ..LookupOptions::default()
    };
    let mut set = find_connections(board, seed, opts, rats).unwrap();
    set.sort_unstable();
    set
}

#[test]
fn test_idempotent_lookup() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0), via_at(50_000, 0)];
    board.layers[0].lines.push(line_between(0, 0, 50_000, 0));

    let first = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    let second = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);
}

#[test]
fn test_symmetric_reachability() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0), via_at(50_000, 0)];
    board.layers[0].lines.push(line_between(0, 0, 50_000, 0));

    let from_a = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    let from_b = found_set(&mut board, ObjRef::Pv(PvId(1)), 0, false);
    assert!(from_a.contains(&ObjRef::Pv(PvId(1))));
    assert!(from_b.contains(&ObjRef::Pv(PvId(0))));
    assert_eq!(from_a, from_b);
}

#[test]
fn test_bloat_monotonicity() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0)];
    // gap of 500 between the via copper and the line copper
    board.layers[0].lines.push(line_between(2_000, 0, 50_000, 0));

    let tight = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    let loose = found_set(&mut board, ObjRef::Pv(PvId(0)), 600, false);
    assert!(!tight.contains(&ObjRef::Line(LineId {
        layer: LayerId(0),
        index: 0
    })));
    assert!(loose.contains(&ObjRef::Line(LineId {
        layer: LayerId(0),
        index: 0
    })));
    for obj in &tight {
        assert!(loose.contains(obj), "{:?} lost under larger bloat", obj);
    }
}

#[test]
fn test_component_internal_bridge() {
    let mut board = one_layer_board();
    board.components.push(copperscan::Component {
        refdes: "U1".into(),
        flags: Flags::NONE,
    });
    let mut pin_a = via_at(0, 0);
    pin_a.component = Some(ComponentId(0));
    pin_a.intconn = 1;
    let mut pin_b = via_at(900_000, 900_000);
    pin_b.component = Some(ComponentId(0));
    pin_b.intconn = 1;
    board.pvs = vec![pin_a, pin_b];

    let found = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    assert!(found.contains(&ObjRef::Pv(PvId(1))));
}

#[test]
fn test_intconn_requires_same_component_and_group() {
    let mut board = one_layer_board();
    board.components.push(copperscan::Component {
        refdes: "U1".into(),
        flags: Flags::NONE,
    });
    board.components.push(copperscan::Component {
        refdes: "U2".into(),
        flags: Flags::NONE,
    });
    let mut pin_a = via_at(0, 0);
    pin_a.component = Some(ComponentId(0));
    pin_a.intconn = 1;
    let mut pin_b = via_at(900_000, 900_000);
    pin_b.component = Some(ComponentId(1));
    pin_b.intconn = 1;
    let mut pin_c = via_at(500_000, 500_000);
    pin_c.component = Some(ComponentId(0));
    pin_c.intconn = 2;
    board.pvs = vec![pin_a, pin_b, pin_c];

    let found = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    assert_eq!(found, vec![ObjRef::Pv(PvId(0))]);
}

#[test]
fn test_rat_line_joins_nets() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0)];
    board.layers[0].lines.push(line_between(50_000, 0, 90_000, 0));
    board.rats.push(Rat {
        p1: Point::new(0, 0),
        group1: GroupId(0),
        p2: Point::new(50_000, 0),
        group2: GroupId(0),
        flags: Flags::NONE,
    });

    let without = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    assert!(!without.contains(&ObjRef::Rat(RatId(0))));

    let with = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, true);
    assert!(with.contains(&ObjRef::Rat(RatId(0))));
    assert!(with.contains(&ObjRef::Line(LineId {
        layer: LayerId(0),
        index: 0
    })));
}

#[test]
fn test_rat_endpoint_tolerance() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0)];
    board.rats.push(Rat {
        p1: Point::new(3, 0),
        group1: GroupId(0),
        p2: Point::new(500_000, 0),
        group2: GroupId(0),
        flags: Flags::NONE,
    });

    let exact = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, true);
    assert!(!exact.contains(&ObjRef::Rat(RatId(0))));

    let opts = LookupOptions {
        rat_match_tolerance: 5,
        ..LookupOptions::default()
    };
    let mut relaxed = find_connections(&mut board, ObjRef::Pv(PvId(0)), opts, true).unwrap();
    relaxed.sort_unstable();
    assert!(relaxed.contains(&ObjRef::Rat(RatId(0))));
}

#[test]
fn test_therm_bit_on_high_layer_index() {
    // layer indices past 31 must still work, thermal bits included
    let mut board = Board {
        layers: (0..40)
            .map(|i| Layer {
                name: format!("copper{}", i),
                ..Layer::default()
            })
            .collect(),
        groups: vec![LayerGroup {
            members: vec![
                GroupMember::Copper(LayerId(39)),
                GroupMember::PadSide(Side::Component),
            ],
        }],
        ..Board::default()
    };
    let mut pin = via_at(0, 0);
    pin.clearance = 2_000;
    pin.therm_layers = 1u64 << 39;
    let mut clearing = via_at(5_000, 0);
    clearing.clearance = 2_000;
    board.pvs = vec![pin, clearing];
    board.layers[39].polygons.push(Polygon {
        contour: vec![
            Point::new(-10_000, -10_000),
            Point::new(10_000, -10_000),
            Point::new(10_000, 10_000),
            Point::new(-10_000, 10_000),
        ],
        flags: Flags::CLEARPOLY,
    });

    let found = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    let poly = ObjRef::Polygon(PolyId {
        layer: LayerId(39),
        index: 0,
    });
    assert!(found.contains(&poly));
    // the second via clears the polygon and has no thermal, so the
    // polygon does not carry the net to it
    assert!(!found.contains(&ObjRef::Pv(PvId(1))));
}

#[test]
fn test_hole_proximity_sets_warn() {
    let mut board = one_layer_board();
    let mut hole = via_at(1_000, 0);
    hole.drill = 1_000;
    hole.flags = Flags::HOLE;
    board.pvs = vec![via_at(0, 0), hole];

    let mut session = LookupSession::new(&mut board, LookupOptions::default());
    let mut hooks = copperscan::Hooks::none();
    session.seed(ObjRef::Pv(PvId(0)), &mut hooks);
    session.run(false, &mut hooks);
    assert!(session.rat_warn());
    assert!(session
        .board()
        .flags_of(ObjRef::Pv(PvId(1)))
        .contains(Flags::WARN));
    // the hole itself never joins the net
    assert!(!session
        .board()
        .flags_of(ObjRef::Pv(PvId(1)))
        .contains(Flags::FOUND));
}

#[test]
fn test_worklists_drained_after_run() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0), via_at(50_000, 0)];
    board.layers[0].lines.push(line_between(0, 0, 50_000, 0));

    let mut session = LookupSession::new(&mut board, LookupOptions::default());
    let mut hooks = copperscan::Hooks::none();
    session.seed(ObjRef::Pv(PvId(0)), &mut hooks);
    session.run(false, &mut hooks);
    assert!(session.lists().all_expanded(false, &[false]));
}

#[test]
fn test_no_drc_layer_is_skipped() {
    let mut board = one_layer_board();
    board.layers.push(Layer {
        name: "outline".into(),
        no_drc: true,
        ..Layer::default()
    });
    board.groups[0]
        .members
        .push(GroupMember::Copper(LayerId(1)));
    board.pvs = vec![via_at(0, 0)];
    board.layers[1].lines.push(line_between(0, 0, 50_000, 0));

    let found = found_set(&mut board, ObjRef::Pv(PvId(0)), 0, false);
    assert!(!found.contains(&ObjRef::Line(LineId {
        layer: LayerId(1),
        index: 0
    })));
}

#[test]
fn test_undo_rolls_back_flags() {
    let mut board = one_layer_board();
    board.pvs = vec![via_at(0, 0), via_at(50_000, 0)];
    board.layers[0].lines.push(line_between(0, 0, 50_000, 0));

    let mut session = LookupSession::new(&mut board, LookupOptions::default());
    let mut undo = FlagUndo::default();
    let mut hooks = copperscan::Hooks {
        undo: Some(&mut undo),
        ..copperscan::Hooks::default()
    };
    session.seed(ObjRef::Pv(PvId(0)), &mut hooks);
    session.run(false, &mut hooks);
    assert!(session.board().flags_of(ObjRef::Pv(PvId(1))).contains(Flags::FOUND));

    undo.restore(session.board_mut());
    assert_eq!(session.board().flags_of(ObjRef::Pv(PvId(0))), Flags::NONE);
    assert_eq!(session.board().flags_of(ObjRef::Pv(PvId(1))), Flags::NONE);
}
