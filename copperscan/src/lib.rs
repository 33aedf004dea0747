//! Copperscan - PCB connectivity lookup and design rule checking
//!
//! This library answers two questions about a printed circuit board:
//! which copper objects are electrically connected, and where the layout
//! violates manufacturing design rules. The same fixed-point propagation
//! engine drives both: a connectivity query runs it once, the rule
//! checker re-runs it under signed copper perturbation (bloat/shrink) and
//! compares the reachable sets.
//!
//! # Quick Start
//!
//! ```no_run
//! use copperscan::{check_board, Board, ViolationCollector};
//!
//! let json = std::fs::read_to_string("board.json").unwrap();
//! let mut board: Board = serde_json::from_str(&json).unwrap();
//!
//! let mut sink = ViolationCollector::default();
//! let summary = check_board(&mut board, &mut sink);
//! for v in &sink.violations {
//!     println!("{} (required {})", v.title, v.required);
//! }
//! println!("{} violations", summary.violation_count);
//! ```
//!
//! # Features
//!
//! - **Connectivity lookup**: breadth-first propagation across pins,
//!   vias, pads, traces, arcs, polygons and rat lines
//! - **Net-topology DRC**: shorts and traces about to break, found by
//!   bloat/shrink what-if runs
//! - **Static rules**: trace width, annular ring, drill size, silk width
//! - **Net extraction**: equivalence classes for the whole board

pub mod board;
pub mod core;
pub mod drc;
pub mod geometry;
pub mod index;
pub mod intersect;
pub mod lookup;
pub mod nets;

// Re-export main types
pub use board::{
    Arc, ArcId, Board, Component, ComponentId, DesignRules, Flags, GroupId, GroupMember, Layer,
    LayerGroup, LayerId, Line, LineId, ObjRef, Pad, PadId, PolyId, Polygon, Pv, PvId, Rat, RatId,
    Side, SilkId, SilkLine,
};
pub use crate::core::{find_connections, CopperscanError};
pub use drc::{
    check_board, DrcEngine, DrcSummary, Verdict, Violation, ViolationCollector, ViolationSink,
};
pub use geometry::{BBox, Coord, Point, MIL, MM};
pub use index::{BoardIndex, Search};
pub use lookup::hooks::{ConnKind, DrawSink, EdgeObserver, FlagUndo, Hooks};
pub use lookup::{LookupOptions, LookupSession};
pub use nets::{collect_nets, Net};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        check_board, collect_nets, find_connections, Board, CopperscanError, DesignRules,
        DrcEngine, DrcSummary, Flags, LookupOptions, LookupSession, ObjRef, Point, Verdict,
        Violation, ViolationCollector, ViolationSink,
    };
}
