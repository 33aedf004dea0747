//! Collaborator seams of the lookup engine: undo recording, incremental
//! redraw and connection observation. All of them are optional; a bare
//! session runs with none attached.

use crate::board::{Board, Flags, ObjRef};

/// How a connection was discovered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnKind {
    /// The seed object itself.
    Start,
    /// Geometric copper overlap.
    Copper,
    /// Component-internal bridge between same-numbered pins or pads.
    Internal,
    /// Attachment through a rat line endpoint.
    Rat,
}

/// Recorded flag states, restorable in one step. Flag changes are pushed
/// in discovery order; `restore` rewinds them newest first so an object
/// recorded twice ends up at its oldest state.
#[derive(Debug, Default)]
pub struct FlagUndo {
    entries: Vec<(ObjRef, Flags)>,
}

impl FlagUndo {
    pub fn record(&mut self, obj: ObjRef, before: Flags) {
        self.entries.push((obj, before));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep the current flag state and forget the recording.
    pub fn commit(&mut self) {
        self.entries.clear();
    }

    /// Put every recorded object back to its pre-change flags.
    pub fn restore(&mut self, board: &mut Board) {
        while let Some((obj, before)) = self.entries.pop() {
            if let Some(f) = board.flags_mut(obj) {
                *f = before;
            }
        }
    }
}

/// Incremental display updates: `draw` is called once per newly found
/// object, `flush` when a propagation pass settles.
pub trait DrawSink {
    fn draw(&mut self, obj: ObjRef);
    fn flush(&mut self) {}
}

/// Observes every connection edge the lookup discovers.
pub trait EdgeObserver {
    fn on_connection(&mut self, target: ObjRef, source: Option<ObjRef>, kind: ConnKind);
}

/// Bundle of the optional collaborators for one lookup call.
#[derive(Default)]
pub struct Hooks<'a> {
    pub undo: Option<&'a mut FlagUndo>,
    pub draw: Option<&'a mut dyn DrawSink>,
    pub observer: Option<&'a mut dyn EdgeObserver>,
}

impl<'a> Hooks<'a> {
    pub fn none() -> Self {
        Hooks::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{Layer, Line, Pv};
    use crate::geometry::Point;

    #[test]
    fn undo_restores_oldest_state() {
        let mut board = Board {
            layers: vec![Layer::default()],
            pvs: vec![Pv {
                pos: Point::new(0, 0),
                thickness: 100,
                drill: 40,
                clearance: 0,
                component: None,
                intconn: 0,
                therm_layers: 0,
                name: None,
                flags: Flags::NONE,
            }],
            ..Board::default()
        };
        board.layers[0].lines.push(Line {
            p1: Point::new(0, 0),
            p2: Point::new(100, 0),
            thickness: 10,
            clearance: 0,
            flags: Flags::NONE,
        });

        let pv = ObjRef::Pv(crate::board::PvId(0));
        let mut undo = FlagUndo::default();

        undo.record(pv, board.flags_of(pv));
        board.flags_mut(pv).unwrap().insert(Flags::FOUND);
        undo.record(pv, board.flags_of(pv));
        board.flags_mut(pv).unwrap().insert(Flags::SELECTED);

        undo.restore(&mut board);
        assert_eq!(board.flags_of(pv), Flags::NONE);
        assert!(undo.is_empty());
    }
}
