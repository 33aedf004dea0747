//! Append-only work lists driving the connectivity fixed point.
//!
//! Each list is a growable frontier with two cursors: `expanded` marks
//! how far propagation has consumed the list, `drawn` how far an
//! incremental redraw has caught up. Lists only ever grow between
//! resets, so a saved cursor stays valid across nested expansion.

use crate::board::{ArcId, LineId, PadId, PolyId, PvId, RatId};

#[derive(Clone, Debug)]
pub struct WorkList<T> {
    items: Vec<T>,
    expanded: usize,
    drawn: usize,
}

impl<T> Default for WorkList<T> {
    fn default() -> Self {
        WorkList {
            items: Vec::new(),
            expanded: 0,
            drawn: 0,
        }
    }
}

impl<T: Copy> WorkList<T> {
    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> T {
        self.items[i]
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Position of the expansion cursor.
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    pub fn set_expanded(&mut self, pos: usize) {
        self.expanded = pos;
    }

    pub fn fully_expanded(&self) -> bool {
        self.expanded >= self.items.len()
    }

    /// Entries appended since the last draw, advancing the draw cursor.
    pub fn take_undrawn(&mut self) -> &[T] {
        let start = self.drawn;
        self.drawn = self.items.len();
        &self.items[start..]
    }

    /// Drop all entries and rewind both cursors.
    pub fn reset(&mut self) {
        self.items.clear();
        self.expanded = 0;
        self.drawn = 0;
    }
}

/// The full set of frontiers: one per global class, one per copper layer
/// for layer-bound classes, one per board side for pads.
#[derive(Clone, Debug)]
pub struct WorkLists {
    pub pvs: WorkList<PvId>,
    pub rats: WorkList<RatId>,
    pub pads: [WorkList<PadId>; 2],
    pub lines: Vec<WorkList<LineId>>,
    pub arcs: Vec<WorkList<ArcId>>,
    pub polygons: Vec<WorkList<PolyId>>,
}

impl WorkLists {
    pub fn new(layer_count: usize) -> Self {
        WorkLists {
            pvs: WorkList::default(),
            rats: WorkList::default(),
            pads: [WorkList::default(), WorkList::default()],
            lines: vec![WorkList::default(); layer_count],
            arcs: vec![WorkList::default(); layer_count],
            polygons: vec![WorkList::default(); layer_count],
        }
    }

    /// True when every frontier that drives propagation is consumed.
    /// Pads are deliberately not checked: pad entries are expanded
    /// eagerly by the step that appends them.
    pub fn all_expanded(&self, and_rats: bool, layer_no_drc: &[bool]) -> bool {
        let mut empty = self.pvs.fully_expanded();
        if and_rats {
            empty = empty && self.rats.fully_expanded();
        }
        for i in 0..self.lines.len() {
            if !empty {
                break;
            }
            if layer_no_drc.get(i).copied().unwrap_or(false) {
                continue;
            }
            empty = empty
                && self.lines[i].fully_expanded()
                && self.arcs[i].fully_expanded()
                && self.polygons[i].fully_expanded();
        }
        empty
    }

    /// Drop every entry and rewind all cursors.
    pub fn reset(&mut self) {
        self.pvs.reset();
        self.rats.reset();
        for l in &mut self.pads {
            l.reset();
        }
        for l in &mut self.lines {
            l.reset();
        }
        for l in &mut self.arcs {
            l.reset();
        }
        for l in &mut self.polygons {
            l.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_survives_growth() {
        let mut wl: WorkList<u32> = WorkList::default();
        wl.push(1);
        wl.push(2);
        let saved = wl.expanded();
        wl.set_expanded(wl.len());
        assert!(wl.fully_expanded());
        wl.push(3);
        assert!(!wl.fully_expanded());
        assert_eq!(&wl.items()[saved..], &[1, 2, 3]);
    }

    #[test]
    fn draw_cursor_yields_deltas() {
        let mut wl: WorkList<u32> = WorkList::default();
        wl.push(1);
        assert_eq!(wl.take_undrawn(), &[1]);
        assert_eq!(wl.take_undrawn(), &[] as &[u32]);
        wl.push(2);
        wl.push(3);
        assert_eq!(wl.take_undrawn(), &[2, 3]);
    }

    #[test]
    fn emptiness_ignores_pads_and_no_drc_layers() {
        let mut lists = WorkLists::new(2);
        lists.pads[0].push(PadId(0));
        assert!(lists.all_expanded(false, &[false, false]));

        lists.lines[1].push(LineId {
            layer: crate::board::LayerId(1),
            index: 0,
        });
        assert!(!lists.all_expanded(false, &[false, false]));
        assert!(lists.all_expanded(false, &[false, true]));

        lists.rats.push(RatId(0));
        assert!(lists.all_expanded(false, &[false, true]));
        assert!(!lists.all_expanded(true, &[false, true]));
    }
}
