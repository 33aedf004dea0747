use criterion::{black_box, criterion_group, criterion_main, Criterion};
use copperscan::prelude::*;
use copperscan::{GroupMember, Layer, LayerGroup, LayerId, Line, Pv, PvId, Side};

/// A ladder of vias joined by traces, all one net.
fn ladder_board(rungs: i64) -> Board {
    let mut board = Board {
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
    };
    for i in 0..rungs {
        board.pvs.push(Pv {
            pos: Point::new(i * 50_000, 0),
            thickness: 2_000,
            drill: 800,
            clearance: 0,
            component: None,
            intconn: 0,
            therm_layers: 0,
            name: None,
            flags: Flags::NONE,
        });
        if i > 0 {
            board.layers[0].lines.push(Line {
                p1: Point::new((i - 1) * 50_000, 0),
                p2: Point::new(i * 50_000, 0),
                thickness: 1_000,
                clearance: 0,
                flags: Flags::NONE,
            });
        }
    }
    board
}

fn bench_find_connections(c: &mut Criterion) {
    let mut board = ladder_board(200);
    c.bench_function("find_connections_ladder_200", |b| {
        b.iter(|| {
            find_connections(
                black_box(&mut board),
                ObjRef::Pv(PvId(0)),
                LookupOptions::default(),
                false,
            )
        });
    });
}

fn bench_check_board(c: &mut Criterion) {
    let mut board = ladder_board(100);
    c.bench_function("check_board_ladder_100", |b| {
        b.iter(|| {
            let mut sink = ViolationCollector::default();
            check_board(black_box(&mut board), &mut sink)
        });
    });
}

fn bench_collect_nets(c: &mut Criterion) {
    let mut board = ladder_board(200);
    c.bench_function("collect_nets_ladder_200", |b| {
        b.iter(|| collect_nets(black_box(&mut board), false));
    });
}

criterion_group!(
    benches,
    bench_find_connections,
    bench_check_board,
    bench_collect_nets
);
criterion_main!(benches);
