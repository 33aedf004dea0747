//! R-tree spatial index over board objects.
//!
//! One tree per object class, and per copper layer for layer-bound
//! classes. Queries collect the candidate ids and sort them, so traversal
//! order is stable regardless of tree shape.

use rstar::{RTree, RTreeObject, AABB};

use crate::board::{ArcId, Board, LayerId, LineId, PadId, PolyId, PvId, RatId};
use crate::geometry::BBox;

/// Verdict of a search visitor: keep scanning candidates or stop the
/// whole search right away.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Search {
    Continue,
    Stop,
}

impl Search {
    pub fn stopped(self) -> bool {
        matches!(self, Search::Stop)
    }
}

#[derive(Clone, Debug)]
struct Indexed<T> {
    id: T,
    envelope: AABB<[i64; 2]>,
}

impl<T> Indexed<T> {
    fn new(id: T, bb: BBox) -> Self {
        Indexed {
            id,
            envelope: AABB::from_corners([bb.x1, bb.y1], [bb.x2, bb.y2]),
        }
    }
}

impl<T: Clone> RTreeObject for Indexed<T> {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn hits<T: Copy + Ord>(tree: &RTree<Indexed<T>>, bb: BBox) -> Vec<T> {
    let env = AABB::from_corners([bb.x1, bb.y1], [bb.x2, bb.y2]);
    let mut ids: Vec<T> = tree
        .locate_in_envelope_intersecting(&env)
        .map(|o| o.id)
        .collect();
    ids.sort_unstable();
    ids
}

/// Spatial index over every object class of one board. The index holds
/// only ids and envelopes; geometry stays on the board.
#[derive(Debug)]
pub struct BoardIndex {
    pvs: RTree<Indexed<PvId>>,
    pads: RTree<Indexed<PadId>>,
    rats: RTree<Indexed<RatId>>,
    lines: Vec<RTree<Indexed<LineId>>>,
    arcs: Vec<RTree<Indexed<ArcId>>>,
    polygons: Vec<RTree<Indexed<PolyId>>>,
}

impl BoardIndex {
    pub fn build(board: &Board) -> Self {
        let pvs = RTree::bulk_load(
            board
                .pv_ids()
                .map(|id| Indexed::new(id, board.pvs[id.0 as usize].bounds()))
                .collect(),
        );
        let pads = RTree::bulk_load(
            board
                .pad_ids()
                .map(|id| Indexed::new(id, board.pads[id.0 as usize].bounds()))
                .collect(),
        );
        let rats = RTree::bulk_load(
            board
                .rat_ids()
                .map(|id| Indexed::new(id, board.rats[id.0 as usize].bounds()))
                .collect(),
        );
        let mut lines = Vec::with_capacity(board.layers.len());
        let mut arcs = Vec::with_capacity(board.layers.len());
        let mut polygons = Vec::with_capacity(board.layers.len());
        for (li, layer) in board.layers.iter().enumerate() {
            let layer_id = LayerId(li as u32);
            lines.push(RTree::bulk_load(
                layer
                    .lines
                    .iter()
                    .enumerate()
                    .map(|(i, l)| {
                        Indexed::new(
                            LineId {
                                layer: layer_id,
                                index: i as u32,
                            },
                            l.bounds(),
                        )
                    })
                    .collect(),
            ));
            arcs.push(RTree::bulk_load(
                layer
                    .arcs
                    .iter()
                    .enumerate()
                    .map(|(i, a)| {
                        Indexed::new(
                            ArcId {
                                layer: layer_id,
                                index: i as u32,
                            },
                            a.bounds(),
                        )
                    })
                    .collect(),
            ));
            polygons.push(RTree::bulk_load(
                layer
                    .polygons
                    .iter()
                    .enumerate()
                    .map(|(i, p)| {
                        Indexed::new(
                            PolyId {
                                layer: layer_id,
                                index: i as u32,
                            },
                            p.bounds(),
                        )
                    })
                    .collect(),
            ));
        }
        BoardIndex {
            pvs,
            pads,
            rats,
            lines,
            arcs,
            polygons,
        }
    }

    pub fn pvs_in(&self, bb: BBox) -> Vec<PvId> {
        hits(&self.pvs, bb)
    }

    pub fn pads_in(&self, bb: BBox) -> Vec<PadId> {
        hits(&self.pads, bb)
    }

    pub fn rats_in(&self, bb: BBox) -> Vec<RatId> {
        hits(&self.rats, bb)
    }

    pub fn lines_in(&self, layer: LayerId, bb: BBox) -> Vec<LineId> {
        self.lines
            .get(layer.0 as usize)
            .map(|t| hits(t, bb))
            .unwrap_or_default()
    }

    pub fn arcs_in(&self, layer: LayerId, bb: BBox) -> Vec<ArcId> {
        self.arcs
            .get(layer.0 as usize)
            .map(|t| hits(t, bb))
            .unwrap_or_default()
    }

    pub fn polygons_in(&self, layer: LayerId, bb: BBox) -> Vec<PolyId> {
        self.polygons
            .get(layer.0 as usize)
            .map(|t| hits(t, bb))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Flags, Layer, Line, Pv};
    use crate::geometry::Point;

    fn via(x: i64, y: i64) -> Pv {
        Pv {
            pos: Point::new(x, y),
            thickness: 100,
            drill: 40,
            clearance: 0,
            component: None,
            intconn: 0,
            therm_layers: 0,
            name: None,
            flags: Flags::NONE,
        }
    }

    #[test]
    fn query_returns_sorted_candidates() {
        let board = Board {
            pvs: vec![via(0, 0), via(5_000, 0), via(100_000, 0)],
            layers: vec![Layer::default()],
            ..Board::default()
        };
        let index = BoardIndex::build(&board);
        let found = index.pvs_in(BBox::new(-200, -200, 6_000, 200));
        assert_eq!(found, vec![PvId(0), PvId(1)]);
    }

    #[test]
    fn layer_query_out_of_range_is_empty() {
        let mut layer = Layer::default();
        layer.lines.push(Line {
            p1: Point::new(0, 0),
            p2: Point::new(1_000, 0),
            thickness: 100,
            clearance: 0,
            flags: Flags::NONE,
        });
        let board = Board {
            layers: vec![layer],
            ..Board::default()
        };
        let index = BoardIndex::build(&board);
        assert_eq!(
            index.lines_in(LayerId(0), BBox::new(-10, -10, 10, 10)).len(),
            1
        );
        assert!(index.lines_in(LayerId(9), BBox::new(-10, -10, 10, 10)).is_empty());
    }
}
