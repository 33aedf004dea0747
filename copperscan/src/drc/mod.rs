//! Design rule checking.
//!
//! Three rule families share one board pass: net-topology rules (a short
//! or a trace about to break, found by re-running the connectivity lookup
//! under signed copper perturbation and comparing against a control run),
//! static numeric rules (trace width, annular ring, drill size, silk
//! width), and the polygon clearance rule (copper plowing through a
//! polygon with less clearance than the spacing rule allows).
//!
//! Violations stream to a [`ViolationSink`], which decides after each one
//! whether the run continues. Flag changes made while investigating a
//! violation are held in a [`FlagUndo`] transaction and rolled back when
//! the sink continues, so a finished run leaves only the per-net bookkeeping
//! marks behind.

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::board::{
    Board, ComponentId, DesignRules, Flags, GroupMember, LayerId, ObjRef, PvId, Side,
};
use crate::geometry::{Coord, Point};
use crate::intersect;
use crate::lookup::hooks::{FlagUndo, Hooks};
use crate::lookup::{LookupOptions, LookupSession};

/// One design rule violation, ready for human or JSON output.
#[derive(Clone, Debug, Serialize)]
pub struct Violation {
    pub id: Uuid,
    pub title: String,
    pub explanation: String,
    pub location: Point,
    /// Offending value, when the rule measures one.
    pub measured: Option<Coord>,
    pub required: Coord,
    pub objects: Vec<ObjRef>,
}

/// Verdict of a sink after one violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

/// Receives violations as they are found and steers the run.
pub trait ViolationSink {
    fn report(&mut self, violation: &Violation) -> Verdict;
}

/// Sink that keeps every violation and never aborts.
#[derive(Debug, Default)]
pub struct ViolationCollector {
    pub violations: Vec<Violation>,
}

impl ViolationSink for ViolationCollector {
    fn report(&mut self, violation: &Violation) -> Verdict {
        self.violations.push(violation.clone());
        Verdict::Continue
    }
}

/// Outcome of a whole-board check.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct DrcSummary {
    pub violation_count: usize,
    pub aborted: bool,
    /// Pads carrying the no-paste flag, reported as a note only.
    pub nopaste_pads: usize,
}

impl DrcSummary {
    /// Violation count, negated when the run was aborted, so a full
    /// review is distinguishable from a partial one.
    pub fn signed_count(&self) -> i64 {
        if self.aborted {
            -(self.violation_count as i64)
        } else {
            self.violation_count as i64
        }
    }
}

const WIDTH_EXPL: &str =
    "Process specifications dictate a minimum feature-width\nthat can reliably be reproduced";
const RING_EXPL: &str =
    "Annular rings that are too small may erode during etching,\nresulting in a broken connection";
const DRILL_EXPL: &str = "Process rules dictate the minimum drill size which can be used";
const PAD_THIN_EXPL: &str =
    "Pads which are too thin may erode during etching,\nresulting in a broken or unreliable connection";
const CLOSE_EXPL: &str = "Circuits that are too close may bridge during imaging, etching,\nplating, or soldering processes resulting in a direct short.";
const BROKEN_EXPL: &str = "Insufficient overlap between objects can lead to broken tracks\ndue to registration errors with old wheel style photo-plotters.";
const SILK_EXPL: &str = "Process specifications dictate a minimum silkscreen feature-width\nthat can reliably be reproduced";
const SILK_ELEMENT_EXPL: &str =
    "Process specifications dictate a minimum silkscreen\nfeature-width that can reliably be reproduced";

/// Run a whole-board check with default options.
pub fn check_board(board: &mut Board, sink: &mut dyn ViolationSink) -> DrcSummary {
    DrcEngine::new(board).check_all(sink)
}

/// Design rule checker over one board. Owns the lookup session (and with
/// it the board borrow) for the duration of the run.
pub struct DrcEngine<'a> {
    session: LookupSession<'a>,
    rules: DesignRules,
    pub rat_match_tolerance: Coord,
    errors: usize,
    aborted: bool,
}

impl<'a> DrcEngine<'a> {
    pub fn new(board: &'a mut Board) -> Self {
        let rules = board.rules;
        let session = LookupSession::new(board, LookupOptions::default());
        DrcEngine {
            session,
            rules,
            rat_match_tolerance: 0,
            errors: 0,
            aborted: false,
        }
    }

    fn set_opts(&mut self, flag: Flags, bloat: Coord, drc: bool) {
        self.session.opts = LookupOptions {
            flag,
            bloat,
            drc,
            rat_match_tolerance: self.rat_match_tolerance,
        };
    }

    fn violation(
        &self,
        title: impl Into<String>,
        explanation: &str,
        objects: Vec<ObjRef>,
        measured: Option<Coord>,
        required: Coord,
    ) -> Violation {
        let location = objects
            .first()
            .map(|&o| self.session.board().location_of(o))
            .unwrap_or_default();
        Violation {
            id: Uuid::new_v4(),
            title: title.into(),
            explanation: explanation.to_string(),
            location,
            measured,
            required,
            objects,
        }
    }

    /// Mark the offenders, report, and either roll the marks back
    /// (continue) or keep them and latch the abort.
    fn report_static(
        &mut self,
        violation: Violation,
        marks: &[(ObjRef, Flags)],
        sink: &mut dyn ViolationSink,
    ) -> bool {
        let mut undo = FlagUndo::default();
        let board = self.session.board_mut();
        for &(obj, flag) in marks {
            undo.record(obj, board.flags_of(obj));
            if let Some(f) = board.flags_mut(obj) {
                f.insert(flag);
            }
        }
        self.errors += 1;
        match sink.report(&violation) {
            Verdict::Abort => {
                self.aborted = true;
                true
            }
            Verdict::Continue => {
                undo.restore(self.session.board_mut());
                false
            }
        }
    }

    /// Re-run the control and perturbed lookups under undo so the
    /// offending net carries visible marks while the sink looks at the
    /// violation. The opening reset is part of the transaction: rolling
    /// it back must bring the control set and any already-reported-net
    /// marks back too.
    fn replay_for_report(
        &mut self,
        seed: ObjRef,
        control_bloat: Coord,
        perturbed_bloat: Coord,
        undo: &mut FlagUndo,
    ) {
        self.set_opts(Flags::FOUND | Flags::SELECTED, 0, false);
        let mut hooks = Hooks {
            undo: Some(&mut *undo),
            ..Hooks::default()
        };
        self.session.reset_flags(&mut hooks);

        self.set_opts(Flags::SELECTED, control_bloat, false);
        let mut hooks = Hooks {
            undo: Some(&mut *undo),
            ..Hooks::default()
        };
        self.session.seed(seed, &mut hooks);
        self.session.run(true, &mut hooks);

        self.set_opts(Flags::FOUND, perturbed_bloat, true);
        let mut hooks = Hooks {
            undo: Some(&mut *undo),
            ..Hooks::default()
        };
        self.session.seed(seed, &mut hooks);
        self.session.run(true, &mut hooks);
    }

    /// Net-topology check from one seed: a control run under shrink marks
    /// the net SELECTED, then a nominal-size run stops at anything the
    /// shrunk net missed (broken trace). The bloated run then stops at
    /// anything outside the control set (short). Returns true on abort.
    pub fn check_net(&mut self, seed: ObjRef, sink: &mut dyn ViolationSink) -> bool {
        let rules = self.rules;
        debug!(?seed, "net topology check");

        // control set; DRC doubles as the "this net was already checked"
        // mark for the whole-board pass
        self.set_opts(Flags::DRC | Flags::SELECTED, -rules.shrink, false);
        self.session.seed(seed, &mut Hooks::none());
        self.session.run(true, &mut Hooks::none());

        if rules.shrink != 0 {
            self.set_opts(Flags::FOUND, 0, true);
            self.session.seed(seed, &mut Hooks::none());
            if self.session.run(true, &mut Hooks::none()).stopped() {
                if let Some(thing) = self.session.pending() {
                    let mut undo = FlagUndo::default();
                    self.replay_for_report(seed, -rules.shrink, 0, &mut undo);
                    self.errors += 1;
                    let v = self.violation(
                        "Potential for broken trace",
                        BROKEN_EXPL,
                        vec![thing],
                        None,
                        rules.shrink,
                    );
                    if sink.report(&v) == Verdict::Abort {
                        self.aborted = true;
                        return true;
                    }
                    undo.restore(self.session.board_mut());
                }
            }
        }

        // bloated condition: clear the perturbed marks, keep the control set
        self.set_opts(Flags::FOUND, 0, false);
        self.session.reset_flags(&mut Hooks::none());
        self.set_opts(Flags::FOUND, rules.bloat, true);
        self.session.seed(seed, &mut Hooks::none());
        while self.session.run(true, &mut Hooks::none()).stopped() {
            let thing = match self.session.pending() {
                Some(t) => t,
                None => break,
            };
            let mut undo = FlagUndo::default();
            self.replay_for_report(seed, 0, rules.bloat, &mut undo);
            self.errors += 1;
            let v = self.violation(
                "Copper areas too close",
                CLOSE_EXPL,
                vec![thing],
                None,
                rules.bloat,
            );
            if sink.report(&v) == Verdict::Abort {
                self.aborted = true;
                return true;
            }
            undo.restore(self.session.board_mut());

            // mark the rest of the encroaching net so it is reported once
            self.set_opts(Flags::FOUND | Flags::SELECTED, 0, false);
            self.session.seed(thing, &mut Hooks::none());
            self.session.run(true, &mut Hooks::none());

            self.set_opts(Flags::FOUND | Flags::SELECTED, rules.bloat, true);
            self.session.seed(seed, &mut Hooks::none());
        }

        self.set_opts(Flags::FOUND | Flags::SELECTED, 0, false);
        self.session.reset_flags(&mut Hooks::none());
        false
    }

    /// Copper layers whose polygons an object on `layer` can plow into.
    fn plow_layers_of_group(&self, layer: LayerId) -> Vec<LayerId> {
        let board = self.session.board();
        let layers = board
            .group_of_layer(layer)
            .map(|g| {
                board.groups[g.0 as usize]
                    .members
                    .iter()
                    .filter_map(|m| match m {
                        GroupMember::Copper(l) => Some(*l),
                        GroupMember::PadSide(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_else(|| vec![layer]);
        layers
    }

    fn plow_layers_of_side(&self, side: Side) -> Vec<LayerId> {
        let board = self.session.board();
        board
            .group_of_side(side)
            .map(|g| {
                board.groups[g.0 as usize]
                    .members
                    .iter()
                    .filter_map(|m| match m {
                        GroupMember::Copper(l) => Some(*l),
                        GroupMember::PadSide(_) => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Polygon clearance rule for one object: every polygon the object's
    /// clearance-expanded footprint overlaps gets a violation when the
    /// clearance is below twice the spacing rule. Returns true on abort.
    fn check_plow(&mut self, obj: ObjRef, sink: &mut dyn ViolationSink) -> bool {
        let rules = self.rules;
        let board = self.session.board();
        let (clearance, needs_clearance, bounds, layers, title) = match obj {
            ObjRef::Line(id) => match board.line(id) {
                Some(l) => (
                    l.clearance,
                    false,
                    l.bounds(),
                    self.plow_layers_of_group(id.layer),
                    "Line with insufficient clearance inside polygon",
                ),
                None => return false,
            },
            ObjRef::Arc(id) => match board.arc(id) {
                Some(a) => (
                    a.clearance,
                    false,
                    a.bounds(),
                    self.plow_layers_of_group(id.layer),
                    "Arc with insufficient clearance inside polygon",
                ),
                None => return false,
            },
            ObjRef::Pv(id) => {
                let pv = &board.pvs[id.0 as usize];
                let title = if pv.component.is_some() {
                    "Pin with insufficient clearance inside polygon"
                } else {
                    "Via with insufficient clearance inside polygon"
                };
                (
                    pv.clearance,
                    true,
                    pv.bounds(),
                    board.layer_ids().collect(),
                    title,
                )
            }
            ObjRef::Pad(id) => {
                let pad = &board.pads[id.0 as usize];
                (
                    pad.clearance,
                    true,
                    pad.bounds(),
                    self.plow_layers_of_side(pad.side()),
                    "Pad with insufficient clearance inside polygon",
                )
            }
            _ => return false,
        };
        if needs_clearance && clearance == 0 {
            return false;
        }
        if clearance >= 2 * rules.bloat {
            return false;
        }

        for layer in layers {
            let board = self.session.board();
            if board.layer(layer).map_or(true, |l| l.no_drc) {
                continue;
            }
            let candidates: Vec<_> = board
                .polygon_ids(layer)
                .filter(|&pid| {
                    let poly = match board.polygon(pid) {
                        Some(p) => p,
                        None => return false,
                    };
                    if !bounds.overlaps(&poly.bounds()) {
                        return false;
                    }
                    // pads verify real overlap, the rest go by footprint
                    match obj {
                        ObjRef::Pad(id) => {
                            intersect::pad_in_polygon(&board.pads[id.0 as usize], poly, 0)
                        }
                        _ => true,
                    }
                })
                .collect();
            for pid in candidates {
                let v = self.violation(title, CLOSE_EXPL, vec![obj], None, rules.bloat);
                let marks = [
                    (obj, Flags::SELECTED),
                    (ObjRef::Polygon(pid), Flags::FOUND),
                ];
                if self.report_static(v, &marks, sink) {
                    return true;
                }
            }
        }
        false
    }

    /// Whole-board check: connectivity baseline per unchecked pin, pad
    /// and via, then the static and plow rules, then silk widths.
    pub fn check_all(&mut self, sink: &mut dyn ViolationSink) -> DrcSummary {
        self.errors = 0;
        self.aborted = false;
        let rules = self.rules;
        let mut nopaste_pads = 0usize;

        self.set_opts(Flags::FOUND | Flags::DRC | Flags::SELECTED, 0, false);
        self.session.reset_flags(&mut Hooks::none());

        // net topology, component by component, then free vias
        let component_count = self.session.board().components.len();
        'nets: for ci in 0..component_count {
            let cid = ComponentId(ci as u32);
            let pins: Vec<PvId> = self
                .session
                .board()
                .pv_ids()
                .filter(|&id| self.session.board().pvs[id.0 as usize].component == Some(cid))
                .collect();
            for pin in pins {
                let r = ObjRef::Pv(pin);
                if !self.session.board().flags_of(r).intersects(Flags::DRC)
                    && self.check_net(r, sink)
                {
                    break 'nets;
                }
            }
            let pads: Vec<_> = self
                .session
                .board()
                .pad_ids()
                .filter(|&id| self.session.board().pads[id.0 as usize].component == cid)
                .collect();
            for pad in pads {
                if self.session.board().pads[pad.0 as usize]
                    .flags
                    .contains(Flags::NOPASTE)
                {
                    nopaste_pads += 1;
                }
                let r = ObjRef::Pad(pad);
                if !self.session.board().flags_of(r).intersects(Flags::DRC)
                    && self.check_net(r, sink)
                {
                    break 'nets;
                }
            }
        }
        if !self.aborted {
            let vias: Vec<PvId> = self
                .session
                .board()
                .pv_ids()
                .filter(|&id| self.session.board().pvs[id.0 as usize].component.is_none())
                .collect();
            for via in vias {
                let r = ObjRef::Pv(via);
                if !self.session.board().flags_of(r).intersects(Flags::DRC)
                    && self.check_net(r, sink)
                {
                    break;
                }
            }
        }

        // drop the net bookkeeping marks; on abort the DRC marks stay so
        // the offending nets remain highlighted
        let cleanup = if self.aborted {
            Flags::DRC
        } else {
            Flags::FOUND | Flags::DRC | Flags::SELECTED
        };
        self.set_opts(cleanup, 0, false);
        self.session.reset_flags(&mut Hooks::none());

        // minimum widths and polygon clearances
        if !self.aborted {
            'lines: for layer in self.copper_layer_ids() {
                for id in self.layer_line_ids(layer) {
                    if self.check_plow(ObjRef::Line(id), sink) {
                        break 'lines;
                    }
                    let thickness = match self.session.board().line(id) {
                        Some(l) => l.thickness,
                        None => continue,
                    };
                    if thickness < rules.min_wid {
                        let v = self.violation(
                            "Line width is too thin",
                            WIDTH_EXPL,
                            vec![ObjRef::Line(id)],
                            Some(thickness),
                            rules.min_wid,
                        );
                        if self.report_static(v, &[(ObjRef::Line(id), Flags::SELECTED)], sink) {
                            break 'lines;
                        }
                    }
                }
            }
        }
        if !self.aborted {
            'arcs: for layer in self.copper_layer_ids() {
                for id in self.layer_arc_ids(layer) {
                    if self.check_plow(ObjRef::Arc(id), sink) {
                        break 'arcs;
                    }
                    let thickness = match self.session.board().arc(id) {
                        Some(a) => a.thickness,
                        None => continue,
                    };
                    if thickness < rules.min_wid {
                        let v = self.violation(
                            "Arc width is too thin",
                            WIDTH_EXPL,
                            vec![ObjRef::Arc(id)],
                            Some(thickness),
                            rules.min_wid,
                        );
                        if self.report_static(v, &[(ObjRef::Arc(id), Flags::SELECTED)], sink) {
                            break 'arcs;
                        }
                    }
                }
            }
        }
        if !self.aborted {
            self.check_pv_rules(true, sink);
        }
        if !self.aborted {
            let pads: Vec<_> = self.session.board().pad_ids().collect();
            'pads: for id in pads {
                if self.check_plow(ObjRef::Pad(id), sink) {
                    break 'pads;
                }
                let thickness = self.session.board().pads[id.0 as usize].thickness;
                if thickness < rules.min_wid {
                    let v = self.violation(
                        "Pad is too thin",
                        PAD_THIN_EXPL,
                        vec![ObjRef::Pad(id)],
                        Some(thickness),
                        rules.min_wid,
                    );
                    if self.report_static(v, &[(ObjRef::Pad(id), Flags::SELECTED)], sink) {
                        break 'pads;
                    }
                }
            }
        }
        if !self.aborted {
            self.check_pv_rules(false, sink);
        }

        // silk widths outside of components
        if !self.aborted {
            let free_silk: Vec<usize> = self
                .session
                .board()
                .silk
                .iter()
                .enumerate()
                .filter(|(_, s)| s.component.is_none())
                .map(|(i, _)| i)
                .collect();
            for i in free_silk {
                let silk = self.session.board().silk[i].clone();
                if silk.thickness < rules.min_slk {
                    let r = ObjRef::Silk(crate::board::SilkId(i as u32));
                    let v = self.violation(
                        "Silk line is too thin",
                        SILK_EXPL,
                        vec![r],
                        Some(silk.thickness),
                        rules.min_slk,
                    );
                    if self.report_static(v, &[(r, Flags::SELECTED)], sink) {
                        break;
                    }
                }
            }
        }

        // silk widths inside components, grouped per component
        if !self.aborted {
            for ci in 0..component_count {
                let cid = ComponentId(ci as u32);
                let board = self.session.board();
                let thin: Vec<usize> = board
                    .silk
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.component == Some(cid) && s.thickness < rules.min_slk)
                    .map(|(i, _)| i)
                    .collect();
                if thin.is_empty() {
                    continue;
                }
                let refdes = board.components[ci].refdes.clone();
                let title = format!(
                    "Element {} has {} silk lines which are too thin",
                    refdes,
                    thin.len()
                );
                let first = crate::board::SilkId(thin[0] as u32);
                let mut v = self.violation(
                    title,
                    SILK_ELEMENT_EXPL,
                    vec![ObjRef::Component(cid)],
                    None,
                    rules.min_slk,
                );
                v.location = self.session.board().location_of(ObjRef::Silk(first));
                if self.report_static(v, &[(ObjRef::Component(cid), Flags::SELECTED)], sink) {
                    break;
                }
            }
        }

        if nopaste_pads > 0 {
            info!(
                "{} pad{} the nopaste flag set",
                nopaste_pads,
                if nopaste_pads > 1 { "s have" } else { " has" }
            );
        }
        DrcSummary {
            violation_count: self.errors,
            aborted: self.aborted,
            nopaste_pads,
        }
    }

    /// Plow, annular ring and drill rules for pins (`component_pins`) or
    /// free vias.
    fn check_pv_rules(&mut self, component_pins: bool, sink: &mut dyn ViolationSink) {
        let rules = self.rules;
        let (ring_title, drill_title) = if component_pins {
            ("Pin annular ring too small", "Pin drill size is too small")
        } else {
            ("Via annular ring too small", "Via drill size is too small")
        };
        let ids: Vec<PvId> = self
            .session
            .board()
            .pv_ids()
            .filter(|&id| {
                self.session.board().pvs[id.0 as usize].component.is_some() == component_pins
            })
            .collect();
        for id in ids {
            if self.check_plow(ObjRef::Pv(id), sink) {
                return;
            }
            let pv = self.session.board().pvs[id.0 as usize].clone();
            if !pv.is_hole() && pv.thickness - pv.drill < 2 * rules.min_ring {
                let v = self.violation(
                    ring_title,
                    RING_EXPL,
                    vec![ObjRef::Pv(id)],
                    Some((pv.thickness - pv.drill) / 2),
                    rules.min_ring,
                );
                if self.report_static(v, &[(ObjRef::Pv(id), Flags::SELECTED)], sink) {
                    return;
                }
            }
            if pv.drill < rules.min_drill {
                let v = self.violation(
                    drill_title,
                    DRILL_EXPL,
                    vec![ObjRef::Pv(id)],
                    Some(pv.drill),
                    rules.min_drill,
                );
                if self.report_static(v, &[(ObjRef::Pv(id), Flags::SELECTED)], sink) {
                    return;
                }
            }
        }
    }

    fn copper_layer_ids(&self) -> Vec<LayerId> {
        self.session
            .board()
            .layers
            .iter()
            .enumerate()
            .filter(|(_, l)| !l.no_drc)
            .map(|(i, _)| LayerId(i as u32))
            .collect()
    }

    fn layer_line_ids(&self, layer: LayerId) -> Vec<crate::board::LineId> {
        self.session.board().line_ids(layer).collect()
    }

    fn layer_arc_ids(&self, layer: LayerId) -> Vec<crate::board::ArcId> {
        self.session.board().arc_ids(layer).collect()
    }
}
