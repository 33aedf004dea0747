//! Connectivity lookup: breadth-first propagation of a flag across
//! touching copper.
//!
//! A [`LookupSession`] borrows the board mutably for its whole lifetime,
//! so there is never more than one lookup in flight per board. Seeding
//! puts one object on its work list; [`LookupSession::run`] then expands
//! the frontiers in four alternating steps (pin/via against pin/via,
//! layer objects reached from pins, layer objects against layer objects
//! per layer group, and pins reached from layer objects) until no list
//! holds unexpanded entries.

pub mod hooks;
pub mod worklist;

use tracing::{debug, warn};

use crate::board::{
    ArcId, Board, Flags, GroupId, GroupMember, LayerId, LineId, ObjRef, PadId, PolyId, PvId, RatId,
};
use crate::geometry::{BBox, Coord, Point};
use crate::index::{BoardIndex, Search};
use crate::intersect::{self, Seg};
use hooks::{ConnKind, DrawSink, Hooks};
use worklist::WorkLists;

/// Tunables of one lookup pass.
#[derive(Clone, Copy, Debug)]
pub struct LookupOptions {
    /// Flag bits set on every found object; objects already carrying any
    /// of them are treated as visited.
    pub flag: Flags,
    /// Signed copper growth applied to every pair predicate.
    pub bloat: Coord,
    /// Stop at the first found object that is not SELECTED, keeping it
    /// as the pending hit.
    pub drc: bool,
    /// Per-axis slack when matching rat endpoints to attachment points.
    /// Zero means exact equality.
    pub rat_match_tolerance: Coord,
}

impl Default for LookupOptions {
    fn default() -> Self {
        LookupOptions {
            flag: Flags::FOUND,
            bloat: 0,
            drc: false,
            rat_match_tolerance: 0,
        }
    }
}

/// One connectivity scan over a board.
pub struct LookupSession<'a> {
    board: &'a mut Board,
    index: BoardIndex,
    pub opts: LookupOptions,
    lists: WorkLists,
    pending: Option<ObjRef>,
    rat_warn: bool,
    no_drc: Vec<bool>,
}

impl<'a> LookupSession<'a> {
    pub fn new(board: &'a mut Board, opts: LookupOptions) -> Self {
        let index = BoardIndex::build(board);
        let no_drc = board.layers.iter().map(|l| l.no_drc).collect();
        let lists = WorkLists::new(board.layers.len());
        LookupSession {
            board,
            index,
            opts,
            lists,
            pending: None,
            rat_warn: false,
            no_drc,
        }
    }

    pub fn board(&self) -> &Board {
        self.board
    }

    pub fn board_mut(&mut self) -> &mut Board {
        self.board
    }

    pub fn lists(&self) -> &WorkLists {
        &self.lists
    }

    /// The object that stopped a DRC-escalated scan, if any.
    pub fn pending(&self) -> Option<ObjRef> {
        self.pending
    }

    /// True once any hole-proximity warning fired in this session.
    pub fn rat_warn(&self) -> bool {
        self.rat_warn
    }

    /// Drop all work list entries and the pending hit, then put `obj` on
    /// its list as the start of a new scan.
    pub fn seed(&mut self, obj: ObjRef, hooks: &mut Hooks) -> Search {
        self.lists.reset();
        self.pending = None;
        match obj {
            ObjRef::Pv(_)
            | ObjRef::Pad(_)
            | ObjRef::Line(_)
            | ObjRef::Arc(_)
            | ObjRef::Polygon(_)
            | ObjRef::Rat(_) => self.mark(obj, None, ConnKind::Start, hooks),
            ObjRef::Silk(_) | ObjRef::Component(_) => {
                warn!("cannot start a connection scan from a {}", obj.kind_name());
                Search::Continue
            }
        }
    }

    /// Expand all frontiers to the fixed point. Returns `Stop` when a
    /// DRC-escalated scan hit an unselected object.
    pub fn run(&mut self, and_rats: bool, hooks: &mut Hooks) -> Search {
        self.no_drc = self.board.layers.iter().map(|l| l.no_drc).collect();
        let result = loop {
            let mut s = self.pvs_to_pvs(hooks);
            if !s.stopped() {
                s = self.los_to_pvs(and_rats, hooks);
            }
            if !s.stopped() {
                s = self.los_to_los(and_rats, hooks);
            }
            if !s.stopped() {
                s = self.pvs_to_los(and_rats, hooks);
            }
            if let Some(d) = hooks.draw.as_deref_mut() {
                self.draw_new(d);
            }
            if s.stopped() {
                break Search::Stop;
            }
            if self.lists.all_expanded(and_rats, &self.no_drc) {
                break Search::Continue;
            }
        };
        if let Some(d) = hooks.draw.as_deref_mut() {
            d.flush();
        }
        debug!(
            pvs = self.lists.pvs.len(),
            rats = self.lists.rats.len(),
            aborted = result.stopped(),
            "connection lookup settled"
        );
        result
    }

    /// Clear the session flag from every conducting object, recording
    /// undo entries and draw events through the hooks. Returns whether
    /// anything changed.
    pub fn reset_flags(&mut self, hooks: &mut Hooks) -> bool {
        let flag = self.opts.flag;
        let mut change = false;
        for obj in self.board.conducting_refs() {
            let before = self.board.flags_of(obj);
            if !before.intersects(flag) {
                continue;
            }
            if let Some(u) = hooks.undo.as_deref_mut() {
                u.record(obj, before);
            }
            if let Some(f) = self.board.flags_mut(obj) {
                f.remove(flag);
            }
            if let Some(d) = hooks.draw.as_deref_mut() {
                d.draw(obj);
            }
            change = true;
        }
        change
    }

    fn visited(&self, obj: ObjRef) -> bool {
        self.board.flags_of(obj).intersects(self.opts.flag)
    }

    /// Flag an object, record it on its work list, and report it through
    /// the hooks. `Stop` when DRC escalation trips.
    fn mark(&mut self, obj: ObjRef, source: Option<ObjRef>, kind: ConnKind, hooks: &mut Hooks) -> Search {
        let before = self.board.flags_of(obj);
        if let Some(u) = hooks.undo.as_deref_mut() {
            u.record(obj, before);
        }
        let after = match self.board.flags_mut(obj) {
            Some(f) => {
                f.insert(self.opts.flag);
                *f
            }
            None => {
                warn!("dangling object reference {:?}", obj);
                return Search::Continue;
            }
        };
        if let Some(obs) = hooks.observer.as_deref_mut() {
            obs.on_connection(obj, source, kind);
        }
        match obj {
            ObjRef::Pv(id) => self.lists.pvs.push(id),
            ObjRef::Rat(id) => self.lists.rats.push(id),
            ObjRef::Pad(id) => {
                let side = self.board.pads[id.0 as usize].side();
                self.lists.pads[side.index()].push(id);
            }
            ObjRef::Line(id) => self.lists.lines[id.layer.0 as usize].push(id),
            ObjRef::Arc(id) => self.lists.arcs[id.layer.0 as usize].push(id),
            ObjRef::Polygon(id) => self.lists.polygons[id.layer.0 as usize].push(id),
            ObjRef::Silk(_) | ObjRef::Component(_) => {}
        }
        // flag first, test second: once the session flag carries
        // SELECTED the escalation goes quiet, so a resume pass walks
        // the rest of the net without stopping again. The seed can
        // never conflict with its own net.
        if self.opts.drc && kind != ConnKind::Start && !after.intersects(Flags::SELECTED) {
            self.pending = Some(obj);
            return Search::Stop;
        }
        Search::Continue
    }

    fn warn_hole(&mut self, pv: PvId, message: &'static str) {
        if let Some(f) = self.board.flags_mut(ObjRef::Pv(pv)) {
            f.insert(Flags::WARN);
        }
        self.rat_warn = true;
        warn!("{}", message);
    }

    fn copper_layers(&self) -> Vec<LayerId> {
        self.board
            .layer_ids()
            .filter(|l| !self.no_drc[l.0 as usize])
            .collect()
    }

    /// Step one: pins and vias reachable from listed pins and vias. The
    /// cursor is restored afterwards so later steps rescan the same
    /// entries against other classes.
    fn pvs_to_pvs(&mut self, hooks: &mut Hooks) -> Search {
        let save = self.lists.pvs.expanded();
        while !self.lists.pvs.fully_expanded() {
            let pos = self.lists.pvs.expanded();
            let pv_id = self.lists.pvs.get(pos);
            let pv = self.board.pvs[pv_id.0 as usize].clone();

            // pins of one component with the same nonzero group number
            // are internally connected; these bridges never escalate
            if pv.intconn > 0 {
                if let Some(comp) = pv.component {
                    let mates: Vec<PvId> = self
                        .board
                        .pv_ids()
                        .filter(|&other| {
                            other != pv_id && {
                                let o = &self.board.pvs[other.0 as usize];
                                o.component == Some(comp) && o.intconn == pv.intconn
                            }
                        })
                        .collect();
                    for other in mates {
                        if !self.visited(ObjRef::Pv(other)) {
                            let _ = self.mark(
                                ObjRef::Pv(other),
                                Some(ObjRef::Pv(pv_id)),
                                ConnKind::Internal,
                                hooks,
                            );
                        }
                    }
                }
            }

            let bb = pv.bounds().expand_by_bloat(self.opts.bloat);
            for cand in self.index.pvs_in(bb) {
                if self.visited(ObjRef::Pv(cand)) {
                    continue;
                }
                let other = self.board.pvs[cand.0 as usize].clone();
                if intersect::pv_pv(&pv, &other, self.opts.bloat) {
                    if pv.is_hole() || other.is_hole() {
                        let message = if other.component.is_some() {
                            "hole too close to pin"
                        } else {
                            "hole too close to via"
                        };
                        self.warn_hole(cand, message);
                    } else if self
                        .mark(ObjRef::Pv(cand), Some(ObjRef::Pv(pv_id)), ConnKind::Copper, hooks)
                        .stopped()
                    {
                        return Search::Stop;
                    }
                }
            }
            self.lists.pvs.set_expanded(pos + 1);
        }
        self.lists.pvs.set_expanded(save);
        Search::Continue
    }

    /// Step two: layer objects and pads touching listed pins/vias. This
    /// step consumes the pin/via cursor.
    fn los_to_pvs(&mut self, and_rats: bool, hooks: &mut Hooks) -> Search {
        while !self.lists.pvs.fully_expanded() {
            let pos = self.lists.pvs.expanded();
            let pv_id = self.lists.pvs.get(pos);
            let pv = self.board.pvs[pv_id.0 as usize].clone();
            let src = ObjRef::Pv(pv_id);
            let hole = pv.is_hole();
            let bb = pv.bounds().expand_by_bloat(self.opts.bloat);

            for cand in self.index.pads_in(bb) {
                if self.visited(ObjRef::Pad(cand)) {
                    continue;
                }
                let pad = self.board.pads[cand.0 as usize].clone();
                if !hole
                    && intersect::pv_pad(&pv, &pad, self.opts.bloat)
                    && self
                        .mark(ObjRef::Pad(cand), Some(src), ConnKind::Copper, hooks)
                        .stopped()
                {
                    return Search::Stop;
                }
            }

            for layer in self.copper_layers() {
                for cand in self.index.lines_in(layer, bb) {
                    if self.visited(ObjRef::Line(cand)) {
                        continue;
                    }
                    let line = match self.board.line(cand) {
                        Some(l) => l.clone(),
                        None => continue,
                    };
                    if !hole
                        && intersect::pv_line(&pv, &line, self.opts.bloat)
                        && self
                            .mark(ObjRef::Line(cand), Some(src), ConnKind::Copper, hooks)
                            .stopped()
                    {
                        return Search::Stop;
                    }
                }
                for cand in self.index.arcs_in(layer, bb) {
                    if self.visited(ObjRef::Arc(cand)) {
                        continue;
                    }
                    let arc = match self.board.arc(cand) {
                        Some(a) => a.clone(),
                        None => continue,
                    };
                    if !hole
                        && intersect::pv_arc(&pv, &arc, self.opts.bloat)
                        && self
                            .mark(ObjRef::Arc(cand), Some(src), ConnKind::Copper, hooks)
                            .stopped()
                    {
                        return Search::Stop;
                    }
                }
                for cand in self.index.polygons_in(layer, bb) {
                    if self.visited(ObjRef::Polygon(cand)) {
                        continue;
                    }
                    let poly = match self.board.polygon(cand) {
                        Some(p) => p.clone(),
                        None => continue,
                    };
                    // a clearing polygon cannot touch a clearing pin
                    // unless a thermal bridges them; the edge cases
                    // (thermal outside the polygon) still need the test
                    let therm = (layer.0 as u64) < 64 && pv.therm_layers & (1u64 << layer.0) != 0;
                    if !hole
                        && (therm || !poly.flags.contains(Flags::CLEARPOLY) || pv.clearance == 0)
                        && intersect::pv_in_polygon(&pv, &poly, self.opts.bloat)
                        && self
                            .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Copper, hooks)
                            .stopped()
                    {
                        return Search::Stop;
                    }
                }
            }

            if and_rats {
                let tol = self.opts.rat_match_tolerance;
                for cand in self.index.rats_in(bb) {
                    if self.visited(ObjRef::Rat(cand)) {
                        continue;
                    }
                    let rat = self.board.rats[cand.0 as usize].clone();
                    if (pv.pos.matches(&rat.p1, tol) || pv.pos.matches(&rat.p2, tol))
                        && self
                            .mark(ObjRef::Rat(cand), Some(src), ConnKind::Rat, hooks)
                            .stopped()
                    {
                        return Search::Stop;
                    }
                }
            }
            self.lists.pvs.set_expanded(pos + 1);
        }
        Search::Continue
    }

    /// Step three: layer objects against layer objects, walked per layer
    /// group. Cursors are local copies; the real ones stay put for step
    /// four, and the inner loop repeats until the group scan stops
    /// producing new entries.
    fn los_to_los(&mut self, and_rats: bool, hooks: &mut Hooks) -> Search {
        let nlayers = self.board.layers.len();
        let mut linepos: Vec<usize> = (0..nlayers).map(|i| self.lists.lines[i].expanded()).collect();
        let mut arcpos: Vec<usize> = (0..nlayers).map(|i| self.lists.arcs[i].expanded()).collect();
        let mut polypos: Vec<usize> =
            (0..nlayers).map(|i| self.lists.polygons[i].expanded()).collect();
        let mut padpos = [
            self.lists.pads[0].expanded(),
            self.lists.pads[1].expanded(),
        ];
        let mut ratpos = self.lists.rats.expanded();

        loop {
            if and_rats {
                while ratpos < self.lists.rats.len() {
                    let rat_id = self.lists.rats.get(ratpos);
                    let rat = self.board.rats[rat_id.0 as usize].clone();
                    if self.rat_end(rat_id, rat.p1, rat.group1, hooks).stopped() {
                        return Search::Stop;
                    }
                    if self.rat_end(rat_id, rat.p2, rat.group2, hooks).stopped() {
                        return Search::Stop;
                    }
                    ratpos += 1;
                }
            }
            for g in 0..self.board.groups.len() {
                let group = GroupId(g as u32);
                let members = self.board.groups[g].members.clone();
                for member in members {
                    match member {
                        GroupMember::Copper(layer) => {
                            let li = layer.0 as usize;
                            if li >= nlayers {
                                warn!(
                                    "layer group {} references missing layer {}",
                                    g, layer.0
                                );
                                continue;
                            }
                            while linepos[li] < self.lists.lines[li].len() {
                                let id = self.lists.lines[li].get(linepos[li]);
                                if self.lo_line(id, group, hooks).stopped() {
                                    return Search::Stop;
                                }
                                linepos[li] += 1;
                            }
                            while arcpos[li] < self.lists.arcs[li].len() {
                                let id = self.lists.arcs[li].get(arcpos[li]);
                                if self.lo_arc(id, group, hooks).stopped() {
                                    return Search::Stop;
                                }
                                arcpos[li] += 1;
                            }
                            while polypos[li] < self.lists.polygons[li].len() {
                                let id = self.lists.polygons[li].get(polypos[li]);
                                if self.lo_poly(id, group, hooks).stopped() {
                                    return Search::Stop;
                                }
                                polypos[li] += 1;
                            }
                        }
                        GroupMember::PadSide(side) => {
                            let si = side.index();
                            while padpos[si] < self.lists.pads[si].len() {
                                let id = self.lists.pads[si].get(padpos[si]);
                                if self.lo_pad(id, group, hooks).stopped() {
                                    return Search::Stop;
                                }
                                padpos[si] += 1;
                            }
                        }
                    }
                }
            }

            let mut done = !and_rats || ratpos >= self.lists.rats.len();
            for i in 0..nlayers {
                done = done
                    && linepos[i] >= self.lists.lines[i].len()
                    && arcpos[i] >= self.lists.arcs[i].len()
                    && polypos[i] >= self.lists.polygons[i].len();
            }
            done = done
                && padpos[0] >= self.lists.pads[0].len()
                && padpos[1] >= self.lists.pads[1].len();
            if done {
                return Search::Continue;
            }
        }
    }

    fn lo_line(&mut self, id: LineId, group: GroupId, hooks: &mut Hooks) -> Search {
        let line = match self.board.line(id) {
            Some(l) => l.clone(),
            None => return Search::Continue,
        };
        let bb = line.bounds().expand_by_bloat(self.opts.bloat);
        self.lo_seg(ObjRef::Line(id), (&line).into(), line.flags, bb, group, true, hooks)
    }

    /// Everything a thick segment (line, or a round pad standing in for
    /// one) can reach inside one layer group. `polys_to` turns the
    /// polygon scan on; pads leave polygons to the polygon side.
    fn lo_seg(
        &mut self,
        src: ObjRef,
        seg: Seg,
        seg_flags: Flags,
        bb: BBox,
        group: GroupId,
        polys_to: bool,
        hooks: &mut Hooks,
    ) -> Search {
        let tol = self.opts.rat_match_tolerance;
        for cand in self.index.rats_in(bb) {
            if self.visited(ObjRef::Rat(cand)) {
                continue;
            }
            let rat = self.board.rats[cand.0 as usize].clone();
            let hit = (rat.group1 == group
                && intersect::rat_on_seg_end(rat.p1, seg.p1, seg.p2, tol))
                || (rat.group2 == group
                    && intersect::rat_on_seg_end(rat.p2, seg.p1, seg.p2, tol));
            if hit
                && self
                    .mark(ObjRef::Rat(cand), Some(src), ConnKind::Rat, hooks)
                    .stopped()
            {
                return Search::Stop;
            }
        }

        for member in self.board.groups[group.0 as usize].members.clone() {
            match member {
                GroupMember::Copper(layer) => {
                    if self.board.layer(layer).is_none() {
                        warn!("layer group {} references missing layer {}", group.0, layer.0);
                        continue;
                    }
                    for cand in self.index.lines_in(layer, bb) {
                        if self.visited(ObjRef::Line(cand)) {
                            continue;
                        }
                        let other = match self.board.line(cand) {
                            Some(l) => l.clone(),
                            None => continue,
                        };
                        if intersect::seg_seg(&seg, &(&other).into(), self.opts.bloat)
                            && self
                                .mark(ObjRef::Line(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.arcs_in(layer, bb) {
                        if self.visited(ObjRef::Arc(cand)) {
                            continue;
                        }
                        let arc = match self.board.arc(cand) {
                            Some(a) => a.clone(),
                            None => continue,
                        };
                        if arc.thickness == 0 {
                            continue;
                        }
                        if intersect::seg_arc(&seg, &arc, self.opts.bloat)
                            && self
                                .mark(ObjRef::Arc(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    if polys_to {
                        for cand in self.board.polygon_ids(layer).collect::<Vec<_>>() {
                            if self.visited(ObjRef::Polygon(cand)) {
                                continue;
                            }
                            let poly = match self.board.polygon(cand) {
                                Some(p) => p.clone(),
                                None => continue,
                            };
                            if intersect::seg_in_polygon(&seg, seg_flags, &poly, self.opts.bloat)
                                && self
                                    .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Copper, hooks)
                                    .stopped()
                            {
                                return Search::Stop;
                            }
                        }
                    }
                }
                GroupMember::PadSide(side) => {
                    for cand in self.index.pads_in(bb) {
                        if self.visited(ObjRef::Pad(cand)) {
                            continue;
                        }
                        let pad = self.board.pads[cand.0 as usize].clone();
                        if pad.side() == side
                            && intersect::seg_seg(&seg, &(&pad).into(), self.opts.bloat)
                            && self
                                .mark(ObjRef::Pad(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
            }
        }
        Search::Continue
    }

    fn lo_arc(&mut self, id: ArcId, group: GroupId, hooks: &mut Hooks) -> Search {
        let arc = match self.board.arc(id) {
            Some(a) => a.clone(),
            None => return Search::Continue,
        };
        let src = ObjRef::Arc(id);
        let bb = arc.bounds().expand_by_bloat(self.opts.bloat);

        // rats never attach to arcs
        for member in self.board.groups[group.0 as usize].members.clone() {
            match member {
                GroupMember::Copper(layer) => {
                    if self.board.layer(layer).is_none() {
                        warn!("layer group {} references missing layer {}", group.0, layer.0);
                        continue;
                    }
                    for cand in self.index.lines_in(layer, bb) {
                        if self.visited(ObjRef::Line(cand)) {
                            continue;
                        }
                        let line = match self.board.line(cand) {
                            Some(l) => l.clone(),
                            None => continue,
                        };
                        if intersect::line_arc(&line, &arc, self.opts.bloat)
                            && self
                                .mark(ObjRef::Line(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.arcs_in(layer, bb) {
                        if self.visited(ObjRef::Arc(cand)) {
                            continue;
                        }
                        let other = match self.board.arc(cand) {
                            Some(a) => a.clone(),
                            None => continue,
                        };
                        if other.thickness == 0 {
                            continue;
                        }
                        if intersect::arc_arc(&arc, &other, self.opts.bloat)
                            && self
                                .mark(ObjRef::Arc(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.board.polygon_ids(layer).collect::<Vec<_>>() {
                        if self.visited(ObjRef::Polygon(cand)) {
                            continue;
                        }
                        let poly = match self.board.polygon(cand) {
                            Some(p) => p.clone(),
                            None => continue,
                        };
                        if intersect::arc_in_polygon(&arc, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                GroupMember::PadSide(side) => {
                    for cand in self.index.pads_in(bb) {
                        if self.visited(ObjRef::Pad(cand)) {
                            continue;
                        }
                        let pad = self.board.pads[cand.0 as usize].clone();
                        if pad.side() == side
                            && intersect::pad_arc(&pad, &arc, self.opts.bloat)
                            && self
                                .mark(ObjRef::Pad(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
            }
        }
        Search::Continue
    }

    fn lo_poly(&mut self, id: PolyId, group: GroupId, hooks: &mut Hooks) -> Search {
        let poly = match self.board.polygon(id) {
            Some(p) => p.clone(),
            None => return Search::Continue,
        };
        let src = ObjRef::Polygon(id);
        let bb = poly.bounds().expand_by_bloat(self.opts.bloat);
        let tol = self.opts.rat_match_tolerance;

        for cand in self.index.rats_in(bb) {
            if self.visited(ObjRef::Rat(cand)) {
                continue;
            }
            let rat = self.board.rats[cand.0 as usize].clone();
            let hit = (rat.group1 == group && intersect::rat_on_polygon(rat.p1, &poly, tol))
                || (rat.group2 == group && intersect::rat_on_polygon(rat.p2, &poly, tol));
            if hit
                && self
                    .mark(ObjRef::Rat(cand), Some(src), ConnKind::Rat, hooks)
                    .stopped()
            {
                return Search::Stop;
            }
        }

        for member in self.board.groups[group.0 as usize].members.clone() {
            match member {
                GroupMember::Copper(layer) => {
                    if self.board.layer(layer).is_none() {
                        warn!("layer group {} references missing layer {}", group.0, layer.0);
                        continue;
                    }
                    for cand in self.board.polygon_ids(layer).collect::<Vec<_>>() {
                        if self.visited(ObjRef::Polygon(cand)) {
                            continue;
                        }
                        let other = match self.board.polygon(cand) {
                            Some(p) => p.clone(),
                            None => continue,
                        };
                        if intersect::polygon_in_polygon(&other, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.lines_in(layer, bb) {
                        if self.visited(ObjRef::Line(cand)) {
                            continue;
                        }
                        let line = match self.board.line(cand) {
                            Some(l) => l.clone(),
                            None => continue,
                        };
                        if intersect::line_in_polygon(&line, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Line(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.arcs_in(layer, bb) {
                        if self.visited(ObjRef::Arc(cand)) {
                            continue;
                        }
                        let arc = match self.board.arc(cand) {
                            Some(a) => a.clone(),
                            None => continue,
                        };
                        if arc.thickness == 0 {
                            continue;
                        }
                        if intersect::arc_in_polygon(&arc, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Arc(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                GroupMember::PadSide(side) => {
                    for cand in self.index.pads_in(bb) {
                        if self.visited(ObjRef::Pad(cand)) {
                            continue;
                        }
                        let pad = self.board.pads[cand.0 as usize].clone();
                        if pad.side() == side
                            && intersect::pad_in_polygon(&pad, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Pad(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
            }
        }
        Search::Continue
    }

    fn lo_pad(&mut self, id: PadId, group: GroupId, hooks: &mut Hooks) -> Search {
        let pad = self.board.pads[id.0 as usize].clone();
        let src = ObjRef::Pad(id);
        let mut deferred_stop = false;

        // pads of one component with the same nonzero group number are
        // internally connected across sides
        if pad.intconn > 0 {
            let group_side = self.board.groups[group.0 as usize]
                .members
                .iter()
                .find_map(|m| match m {
                    GroupMember::PadSide(s) => Some(*s),
                    GroupMember::Copper(_) => None,
                });
            if let Some(tside) = group_side {
                let mates: Vec<PadId> = self
                    .board
                    .pad_ids()
                    .filter(|&other| {
                        other != id && {
                            let o = &self.board.pads[other.0 as usize];
                            o.component == pad.component && o.intconn == pad.intconn
                        }
                    })
                    .collect();
                for other in mates {
                    let other_side = self.board.pads[other.0 as usize].side();
                    if !self.visited(ObjRef::Pad(other)) && other_side != tside {
                        let _ = self.mark(ObjRef::Pad(other), Some(src), ConnKind::Internal, hooks);
                        if self.lo_pad(other, group, hooks).stopped() {
                            deferred_stop = true;
                        }
                    }
                }
            }
        }

        if !pad.flags.contains(Flags::SQUARE) {
            let bb = pad.bounds().expand_by_bloat(self.opts.bloat);
            let result = self.lo_seg(src, (&pad).into(), pad.flags, bb, group, false, hooks);
            if result.stopped() || deferred_stop {
                return Search::Stop;
            }
            return Search::Continue;
        }

        let bb = pad.bounds().expand_by_bloat(self.opts.bloat);
        let tol = self.opts.rat_match_tolerance;
        for cand in self.index.rats_in(bb) {
            if self.visited(ObjRef::Rat(cand)) {
                continue;
            }
            let rat = self.board.rats[cand.0 as usize].clone();
            let hit = (rat.group1 == group && intersect::rat_on_pad(rat.p1, &pad, tol))
                || (rat.group2 == group && intersect::rat_on_pad(rat.p2, &pad, tol));
            if hit
                && self
                    .mark(ObjRef::Rat(cand), Some(src), ConnKind::Rat, hooks)
                    .stopped()
            {
                return Search::Stop;
            }
        }

        for member in self.board.groups[group.0 as usize].members.clone() {
            match member {
                GroupMember::Copper(layer) => {
                    if self.board.layer(layer).is_none() {
                        warn!("layer group {} references missing layer {}", group.0, layer.0);
                        continue;
                    }
                    for cand in self.index.lines_in(layer, bb) {
                        if self.visited(ObjRef::Line(cand)) {
                            continue;
                        }
                        let line = match self.board.line(cand) {
                            Some(l) => l.clone(),
                            None => continue,
                        };
                        if intersect::line_pad(&line, &pad, self.opts.bloat)
                            && self
                                .mark(ObjRef::Line(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.arcs_in(layer, bb) {
                        if self.visited(ObjRef::Arc(cand)) {
                            continue;
                        }
                        let arc = match self.board.arc(cand) {
                            Some(a) => a.clone(),
                            None => continue,
                        };
                        if arc.thickness == 0 {
                            continue;
                        }
                        if intersect::pad_arc(&pad, &arc, self.opts.bloat)
                            && self
                                .mark(ObjRef::Arc(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.polygons_in(layer, bb) {
                        if self.visited(ObjRef::Polygon(cand)) {
                            continue;
                        }
                        let poly = match self.board.polygon(cand) {
                            Some(p) => p.clone(),
                            None => continue,
                        };
                        if (!poly.flags.contains(Flags::CLEARPOLY) || pad.clearance == 0)
                            && intersect::pad_in_polygon(&pad, &poly, self.opts.bloat)
                            && self
                                .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                GroupMember::PadSide(side) => {
                    for cand in self.index.pads_in(bb) {
                        if self.visited(ObjRef::Pad(cand)) {
                            continue;
                        }
                        let other = self.board.pads[cand.0 as usize].clone();
                        if other.side() == side
                            && intersect::pad_pad(&other, &pad, self.opts.bloat)
                            && self
                                .mark(ObjRef::Pad(cand), Some(src), ConnKind::Copper, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
            }
        }
        if deferred_stop {
            return Search::Stop;
        }
        Search::Continue
    }

    /// Objects a rat endpoint attaches to inside its layer group: lines
    /// ending at the point, polygons starting there, pads whose ends or
    /// center match.
    fn rat_end(&mut self, rat: RatId, point: Point, group: GroupId, hooks: &mut Hooks) -> Search {
        let gi = group.0 as usize;
        if gi >= self.board.groups.len() {
            warn!("rat references missing layer group {}", group.0);
            return Search::Continue;
        }
        let tol = self.opts.rat_match_tolerance;
        let bb = BBox::around(point, 1 + tol);
        let src = ObjRef::Rat(rat);

        for member in self.board.groups[gi].members.clone() {
            match member {
                GroupMember::Copper(layer) => {
                    for cand in self.index.lines_in(layer, bb) {
                        if self.visited(ObjRef::Line(cand)) {
                            continue;
                        }
                        let line = match self.board.line(cand) {
                            Some(l) => l.clone(),
                            None => continue,
                        };
                        if intersect::rat_on_seg_end(point, line.p1, line.p2, tol)
                            && self
                                .mark(ObjRef::Line(cand), Some(src), ConnKind::Rat, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                    for cand in self.index.polygons_in(layer, bb) {
                        if self.visited(ObjRef::Polygon(cand)) {
                            continue;
                        }
                        let poly = match self.board.polygon(cand) {
                            Some(p) => p.clone(),
                            None => continue,
                        };
                        if intersect::rat_on_polygon(point, &poly, tol)
                            && self
                                .mark(ObjRef::Polygon(cand), Some(src), ConnKind::Rat, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                GroupMember::PadSide(side) => {
                    for cand in self.index.pads_in(bb) {
                        if self.visited(ObjRef::Pad(cand)) {
                            continue;
                        }
                        let pad = self.board.pads[cand.0 as usize].clone();
                        if pad.side() == side
                            && intersect::rat_on_pad(point, &pad, tol)
                            && self
                                .mark(ObjRef::Pad(cand), Some(src), ConnKind::Rat, hooks)
                                .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
            }
        }
        Search::Continue
    }

    /// Step four: pins and vias touching newly listed layer objects.
    /// This step consumes the layer-object, pad and rat cursors.
    fn pvs_to_los(&mut self, and_rats: bool, hooks: &mut Hooks) -> Search {
        let has_pvs = !self.board.pvs.is_empty();
        for layer in self.board.layer_ids().collect::<Vec<_>>() {
            let li = layer.0 as usize;
            if self.no_drc[li] {
                continue;
            }
            if !has_pvs {
                let n = self.lists.lines[li].len();
                self.lists.lines[li].set_expanded(n);
                let n = self.lists.arcs[li].len();
                self.lists.arcs[li].set_expanded(n);
                let n = self.lists.polygons[li].len();
                self.lists.polygons[li].set_expanded(n);
                continue;
            }

            while !self.lists.lines[li].fully_expanded() {
                let pos = self.lists.lines[li].expanded();
                let id = self.lists.lines[li].get(pos);
                let line = match self.board.line(id) {
                    Some(l) => l.clone(),
                    None => {
                        self.lists.lines[li].set_expanded(pos + 1);
                        continue;
                    }
                };
                let bb = line.bounds().expand_by_bloat(self.opts.bloat);
                for cand in self.index.pvs_in(bb) {
                    if self.visited(ObjRef::Pv(cand)) {
                        continue;
                    }
                    let pv = self.board.pvs[cand.0 as usize].clone();
                    if intersect::pv_line(&pv, &line, self.opts.bloat) {
                        if pv.is_hole() {
                            self.warn_hole(cand, "hole too close to line");
                        } else if self
                            .mark(ObjRef::Pv(cand), Some(ObjRef::Line(id)), ConnKind::Copper, hooks)
                            .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                self.lists.lines[li].set_expanded(pos + 1);
            }

            while !self.lists.arcs[li].fully_expanded() {
                let pos = self.lists.arcs[li].expanded();
                let id = self.lists.arcs[li].get(pos);
                let arc = match self.board.arc(id) {
                    Some(a) => a.clone(),
                    None => {
                        self.lists.arcs[li].set_expanded(pos + 1);
                        continue;
                    }
                };
                let bb = arc.bounds().expand_by_bloat(self.opts.bloat);
                for cand in self.index.pvs_in(bb) {
                    if self.visited(ObjRef::Pv(cand)) {
                        continue;
                    }
                    let pv = self.board.pvs[cand.0 as usize].clone();
                    if intersect::pv_arc(&pv, &arc, self.opts.bloat) {
                        if pv.is_hole() {
                            self.warn_hole(cand, "hole touches arc");
                        } else if self
                            .mark(ObjRef::Pv(cand), Some(ObjRef::Arc(id)), ConnKind::Copper, hooks)
                            .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                self.lists.arcs[li].set_expanded(pos + 1);
            }

            while !self.lists.polygons[li].fully_expanded() {
                let pos = self.lists.polygons[li].expanded();
                let id = self.lists.polygons[li].get(pos);
                let poly = match self.board.polygon(id) {
                    Some(p) => p.clone(),
                    None => {
                        self.lists.polygons[li].set_expanded(pos + 1);
                        continue;
                    }
                };
                let bb = poly.bounds().expand_by_bloat(self.opts.bloat);
                for cand in self.index.pvs_in(bb) {
                    if self.visited(ObjRef::Pv(cand)) {
                        continue;
                    }
                    let pv = self.board.pvs[cand.0 as usize].clone();
                    // holes inside polygons are fine, no warning here
                    if pv.is_hole() {
                        continue;
                    }
                    let therm = li < 64 && pv.therm_layers & (1u64 << li) != 0;
                    if (therm || !poly.flags.contains(Flags::CLEARPOLY) || pv.clearance == 0)
                        && intersect::pv_in_polygon(&pv, &poly, self.opts.bloat)
                        && self
                            .mark(
                                ObjRef::Pv(cand),
                                Some(ObjRef::Polygon(id)),
                                ConnKind::Copper,
                                hooks,
                            )
                            .stopped()
                    {
                        return Search::Stop;
                    }
                }
                self.lists.polygons[li].set_expanded(pos + 1);
            }
        }

        for si in 0..2 {
            if !has_pvs {
                let n = self.lists.pads[si].len();
                self.lists.pads[si].set_expanded(n);
                continue;
            }
            while !self.lists.pads[si].fully_expanded() {
                let pos = self.lists.pads[si].expanded();
                let id = self.lists.pads[si].get(pos);
                let pad = self.board.pads[id.0 as usize].clone();
                let bb = pad.bounds().expand_by_bloat(self.opts.bloat);
                for cand in self.index.pvs_in(bb) {
                    if self.visited(ObjRef::Pv(cand)) {
                        continue;
                    }
                    let pv = self.board.pvs[cand.0 as usize].clone();
                    if intersect::pv_pad(&pv, &pad, self.opts.bloat) {
                        if pv.is_hole() {
                            self.warn_hole(cand, "hole too close to pad");
                        } else if self
                            .mark(ObjRef::Pv(cand), Some(ObjRef::Pad(id)), ConnKind::Copper, hooks)
                            .stopped()
                        {
                            return Search::Stop;
                        }
                    }
                }
                self.lists.pads[si].set_expanded(pos + 1);
            }
        }

        if !has_pvs {
            let n = self.lists.rats.len();
            self.lists.rats.set_expanded(n);
        }
        if and_rats {
            let tol = self.opts.rat_match_tolerance;
            while !self.lists.rats.fully_expanded() {
                let pos = self.lists.rats.expanded();
                let id = self.lists.rats.get(pos);
                let rat = self.board.rats[id.0 as usize].clone();
                for pt in [rat.p1, rat.p2] {
                    let bb = BBox::around(pt, 1 + tol);
                    for cand in self.index.pvs_in(bb) {
                        if self.visited(ObjRef::Pv(cand)) {
                            continue;
                        }
                        let pv = self.board.pvs[cand.0 as usize].clone();
                        // rat attachments cannot cause a DRC hit
                        if pv.pos.matches(&pt, tol) {
                            let _ = self.mark(
                                ObjRef::Pv(cand),
                                Some(ObjRef::Rat(id)),
                                ConnKind::Rat,
                                hooks,
                            );
                        }
                    }
                }
                self.lists.rats.set_expanded(pos + 1);
            }
        }
        Search::Continue
    }

    /// Push draw events for everything appended since the last call.
    /// Layers go out top of stack first.
    fn draw_new(&mut self, sink: &mut dyn DrawSink) {
        for li in (0..self.lists.lines.len()).rev() {
            for &id in self.lists.lines[li].take_undrawn() {
                sink.draw(ObjRef::Line(id));
            }
            for &id in self.lists.arcs[li].take_undrawn() {
                sink.draw(ObjRef::Arc(id));
            }
            for &id in self.lists.polygons[li].take_undrawn() {
                sink.draw(ObjRef::Polygon(id));
            }
        }
        for si in 0..2 {
            for &id in self.lists.pads[si].take_undrawn() {
                sink.draw(ObjRef::Pad(id));
            }
        }
        for &id in self.lists.pvs.take_undrawn() {
            sink.draw(ObjRef::Pv(id));
        }
        for &id in self.lists.rats.take_undrawn() {
            sink.draw(ObjRef::Rat(id));
        }
    }
}
