//! High-level entry points: the crate error type, the one-shot
//! "find everything connected to this object" query, and the point hit
//! test the CLI uses to turn a coordinate into a seed.

use thiserror::Error;
use tracing::debug;

use crate::board::{Board, ObjRef};
use crate::geometry::{Coord, Point};
use crate::intersect::{self, Seg};
use crate::lookup::hooks::{ConnKind, EdgeObserver, Hooks};
use crate::lookup::{LookupOptions, LookupSession};

#[derive(Debug, Error)]
pub enum CopperscanError {
    #[error("no conducting object within range of the given point")]
    NothingAtPoint,
    #[error("cannot start a connection scan from a {0}")]
    BadSeed(&'static str),
    #[error("dangling object reference: {0}")]
    UnknownObject(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("board JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

fn seed_exists(board: &Board, seed: ObjRef) -> bool {
    match seed {
        ObjRef::Pv(id) => (id.0 as usize) < board.pvs.len(),
        ObjRef::Pad(id) => (id.0 as usize) < board.pads.len(),
        ObjRef::Line(id) => board.line(id).is_some(),
        ObjRef::Arc(id) => board.arc(id).is_some(),
        ObjRef::Polygon(id) => board.polygon(id).is_some(),
        ObjRef::Rat(id) => (id.0 as usize) < board.rats.len(),
        ObjRef::Silk(id) => (id.0 as usize) < board.silk.len(),
        ObjRef::Component(id) => (id.0 as usize) < board.components.len(),
    }
}

#[derive(Default)]
struct FoundSet {
    objects: Vec<ObjRef>,
}

impl EdgeObserver for FoundSet {
    fn on_connection(&mut self, target: ObjRef, _source: Option<ObjRef>, _kind: ConnKind) {
        self.objects.push(target);
    }
}

/// Everything electrically reachable from `seed`, in discovery order
/// (seed first). Clears the session flag beforehand and leaves it set on
/// the found objects afterwards, so callers can render the found set.
pub fn find_connections(
    board: &mut Board,
    seed: ObjRef,
    opts: LookupOptions,
    include_rats: bool,
) -> Result<Vec<ObjRef>, CopperscanError> {
    if matches!(seed, ObjRef::Silk(_) | ObjRef::Component(_)) {
        return Err(CopperscanError::BadSeed(seed.kind_name()));
    }
    if !seed_exists(board, seed) {
        return Err(CopperscanError::UnknownObject(format!("{:?}", seed)));
    }
    let mut session = LookupSession::new(board, opts);
    session.reset_flags(&mut Hooks::none());
    let mut found = FoundSet::default();
    let mut hooks = Hooks {
        observer: Some(&mut found),
        ..Hooks::default()
    };
    session.seed(seed, &mut hooks);
    session.run(include_rats, &mut hooks);
    debug!(count = found.objects.len(), "connection query finished");
    Ok(found.objects)
}

impl Board {
    /// The first conducting object whose copper lies within `range` of
    /// `point`. Layers flagged `no_drc` and silk are never hit. Scan
    /// order is pins/vias, pads, then lines, arcs and polygons per layer.
    pub fn object_at(&self, point: Point, range: Coord) -> Option<ObjRef> {
        let radius = range.max(0) as f64;
        for id in self.pv_ids() {
            if intersect::point_on_pv(point, radius, &self.pvs[id.0 as usize]) {
                return Some(ObjRef::Pv(id));
            }
        }
        for id in self.pad_ids() {
            let seg: Seg = (&self.pads[id.0 as usize]).into();
            if intersect::point_in_seg(point, radius, &seg) {
                return Some(ObjRef::Pad(id));
            }
        }
        for layer_id in self.layer_ids() {
            let layer = self.layer(layer_id)?;
            if layer.no_drc {
                continue;
            }
            for id in self.line_ids(layer_id) {
                let seg: Seg = self.line(id).map(Seg::from)?;
                if intersect::point_in_seg(point, radius, &seg) {
                    return Some(ObjRef::Line(id));
                }
            }
            for id in self.arc_ids(layer_id) {
                if intersect::point_on_arc(point, radius, self.arc(id)?) {
                    return Some(ObjRef::Arc(id));
                }
            }
            for id in self.polygon_ids(layer_id) {
                if intersect::point_in_polygon(point, radius, self.polygon(id)?) {
                    return Some(ObjRef::Polygon(id));
                }
            }
        }
        None
    }
}
