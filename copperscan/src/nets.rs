//! Net extraction: partition the board's conducting objects into
//! electrical equivalence classes by running the connectivity lookup from
//! every terminal that has not been reached yet.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;
use serde::Serialize;

use crate::board::{Board, Flags, ObjRef};
use crate::lookup::hooks::{ConnKind, EdgeObserver, Hooks};
use crate::lookup::{LookupOptions, LookupSession};

/// One net: every object electrically connected to the others, sorted
/// for stable output.
#[derive(Clone, Debug, Serialize)]
pub struct Net {
    pub objects: Vec<ObjRef>,
}

#[derive(Default)]
struct EdgeCollector {
    order: Vec<ObjRef>,
    edges: Vec<(ObjRef, ObjRef)>,
}

impl EdgeObserver for EdgeCollector {
    fn on_connection(&mut self, target: ObjRef, source: Option<ObjRef>, _kind: ConnKind) {
        self.order.push(target);
        if let Some(src) = source {
            self.edges.push((src, target));
        }
    }
}

/// Enumerate all nets on the board. Seeds at every pin, via and pad not
/// already reached from an earlier seed; with `include_rats` set, rat
/// lines merge the nets they connect. Board flags are restored on return.
pub fn collect_nets(board: &mut Board, include_rats: bool) -> Vec<Net> {
    let seeds: Vec<ObjRef> = board
        .pv_ids()
        .map(ObjRef::Pv)
        .chain(board.pad_ids().map(ObjRef::Pad))
        .collect();

    let mut session = LookupSession::new(board, LookupOptions::default());
    session.reset_flags(&mut Hooks::none());

    let mut collector = EdgeCollector::default();
    for seed in seeds {
        if session.board().flags_of(seed).intersects(Flags::FOUND) {
            continue;
        }
        let mut hooks = Hooks {
            observer: Some(&mut collector),
            ..Hooks::default()
        };
        session.seed(seed, &mut hooks);
        session.run(include_rats, &mut hooks);
    }
    session.reset_flags(&mut Hooks::none());

    let mut index: HashMap<ObjRef, usize> = HashMap::new();
    for &obj in &collector.order {
        let next = index.len();
        index.entry(obj).or_insert(next);
    }
    let mut uf: UnionFind<usize> = UnionFind::new(index.len());
    for &(a, b) in &collector.edges {
        if let (Some(&ia), Some(&ib)) = (index.get(&a), index.get(&b)) {
            uf.union(ia, ib);
        }
    }

    let mut groups: HashMap<usize, Vec<ObjRef>> = HashMap::new();
    for &obj in &collector.order {
        let root = uf.find(index[&obj]);
        let group = groups.entry(root).or_default();
        if group.last() != Some(&obj) {
            group.push(obj);
        }
    }
    let mut nets: Vec<Net> = groups
        .into_values()
        .map(|mut objects| {
            objects.sort_unstable();
            objects.dedup();
            Net { objects }
        })
        .collect();
    nets.sort_by(|a, b| a.objects.first().cmp(&b.objects.first()));
    nets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{GroupMember, Layer, LayerGroup, LayerId, Line, Pv, PvId, Side};
    use crate::geometry::Point;

    fn via(x: i64, y: i64) -> Pv {
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

    fn one_layer_board() -> Board {
        Board {
            layers: vec![Layer::default()],
            groups: vec![LayerGroup {
                members: vec![
                    GroupMember::Copper(LayerId(0)),
                    GroupMember::PadSide(Side::Component),
                ],
            }],
            ..Board::default()
        }
    }

    #[test]
    fn traced_vias_form_one_net_isolated_via_another() {
        let mut board = one_layer_board();
        board.pvs = vec![via(0, 0), via(50_000, 0), via(500_000, 500_000)];
        board.layers[0].lines.push(Line {
            p1: Point::new(0, 0),
            p2: Point::new(50_000, 0),
            thickness: 1_000,
            clearance: 0,
            flags: Flags::NONE,
        });

        let nets = collect_nets(&mut board, false);
        assert_eq!(nets.len(), 2);
        assert!(nets[0].objects.contains(&ObjRef::Pv(PvId(0))));
        assert!(nets[0].objects.contains(&ObjRef::Pv(PvId(1))));
        assert_eq!(nets[1].objects, vec![ObjRef::Pv(PvId(2))]);
        // flags restored
        assert!(!board.pvs[0].flags.intersects(Flags::FOUND));
    }
}
