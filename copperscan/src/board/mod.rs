//! Board data model: layers, layer groups, copper objects and design rules.
//!
//! Objects are addressed by small typed ids (`PvId`, `LineId`, ...) that
//! index into the `Board` vectors, and [`ObjRef`] is the sum of all of
//! them. Connectivity state lives on each object as a [`Flags`] bitset.

use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Coord, Point, MIL};

/// Per-object flag bitset.
///
/// `FOUND`, `SELECTED`, `DRC` and `WARN` are transient connectivity state;
/// the rest describe the object itself (shape, side, hole).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(pub u32);

impl Flags {
    pub const NONE: Flags = Flags(0);
    /// Member of the currently found connection set.
    pub const FOUND: Flags = Flags(1 << 0);
    /// Member of the user selection (DRC uses it for the control run).
    pub const SELECTED: Flags = Flags(1 << 1);
    /// Visited during a perturbed DRC run.
    pub const DRC: Flags = Flags(1 << 2);
    /// Flagged by a hole-proximity warning.
    pub const WARN: Flags = Flags(1 << 3);
    /// Unplated drill, carries no copper.
    pub const HOLE: Flags = Flags(1 << 4);
    /// Square/rectangular pad or pin shape.
    pub const SQUARE: Flags = Flags(1 << 5);
    /// Octagonal pin shape.
    pub const OCTAGON: Flags = Flags(1 << 6);
    /// Polygon keeps clearance around clearing objects.
    pub const CLEARPOLY: Flags = Flags(1 << 7);
    /// Line/arc clears polygons instead of connecting to them.
    pub const CLEARLINE: Flags = Flags(1 << 8);
    /// Pad sits on the solder side.
    pub const ONSOLDER: Flags = Flags(1 << 9);
    /// Pad excluded from the paste mask.
    pub const NOPASTE: Flags = Flags(1 << 10);

    /// All transient connectivity marks.
    pub const VISIT_MASK: Flags = Flags(
        Self::FOUND.0 | Self::SELECTED.0 | Self::DRC.0 | Self::WARN.0,
    );

    pub fn contains(self, other: Flags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Flags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Flags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Flags) {
        self.0 &= !other.0;
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for Flags {
    type Output = Flags;
    fn bitor(self, rhs: Flags) -> Flags {
        Flags(self.0 | rhs.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PvId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PadId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SilkId(pub u32);

/// Layer-local object ids: the layer plus the index into that layer's vec.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId {
    pub layer: LayerId,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ArcId {
    pub layer: LayerId,
    pub index: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PolyId {
    pub layer: LayerId,
    pub index: u32,
}

/// Reference to any board object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ObjRef {
    Pv(PvId),
    Pad(PadId),
    Line(LineId),
    Arc(ArcId),
    Polygon(PolyId),
    Rat(RatId),
    Silk(SilkId),
    Component(ComponentId),
}

impl ObjRef {
    pub fn kind_name(&self) -> &'static str {
        match self {
            ObjRef::Pv(_) => "pin/via",
            ObjRef::Pad(_) => "pad",
            ObjRef::Line(_) => "line",
            ObjRef::Arc(_) => "arc",
            ObjRef::Polygon(_) => "polygon",
            ObjRef::Rat(_) => "rat",
            ObjRef::Silk(_) => "silk line",
            ObjRef::Component(_) => "component",
        }
    }
}

/// Which board face a pad (or the pad shard of a layer group) sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Component,
    Solder,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Component => 0,
            Side::Solder => 1,
        }
    }
}

/// A layer group member: either a copper layer or one of the pad sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMember {
    Copper(LayerId),
    PadSide(Side),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LayerGroup {
    pub members: Vec<GroupMember>,
}

/// Numeric design rules. Distances in board units (nanometers).
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DesignRules {
    /// Minimum copper-to-copper spacing; DRC bloats by this.
    pub bloat: Coord,
    /// Minimum overlap of connected copper; DRC shrinks by this.
    pub shrink: Coord,
    /// Minimum copper trace width.
    pub min_wid: Coord,
    /// Minimum silk line width.
    pub min_slk: Coord,
    /// Minimum drill diameter.
    pub min_drill: Coord,
    /// Minimum annular ring (copper around a plated hole).
    pub min_ring: Coord,
}

impl Default for DesignRules {
    fn default() -> Self {
        DesignRules {
            bloat: 10 * MIL,
            shrink: 10 * MIL,
            min_wid: 10 * MIL,
            min_slk: 10 * MIL,
            min_drill: 15 * MIL,
            min_ring: 10 * MIL,
        }
    }
}

/// Pin or via: a plated (or unplated, when `HOLE`) drill with a copper pad
/// stack spanning every copper layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pv {
    pub pos: Point,
    /// Copper diameter.
    pub thickness: Coord,
    /// Drill diameter.
    pub drill: Coord,
    pub clearance: Coord,
    /// `Some` for component pins, `None` for free vias.
    #[serde(default)]
    pub component: Option<ComponentId>,
    /// Pins of the same component with equal nonzero `intconn` are
    /// internally connected.
    #[serde(default)]
    pub intconn: u8,
    /// Copper layers on which the pin connects to polygons thermally,
    /// one bit per layer index.
    #[serde(default)]
    pub therm_layers: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub flags: Flags,
}

impl Pv {
    pub fn is_hole(&self) -> bool {
        self.flags.contains(Flags::HOLE)
    }

    /// Effective copper diameter: plain holes have no copper ring, so the
    /// drill is all there is.
    pub fn copper_size(&self) -> Coord {
        if self.is_hole() {
            self.drill
        } else {
            self.thickness
        }
    }

    pub fn bounds(&self) -> BBox {
        let r = (self.thickness.max(self.drill) + self.clearance + 1) / 2;
        BBox::around(self.pos, r)
    }
}

/// SMD pad: a thick segment on one side of the board.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Pad {
    pub p1: Point,
    pub p2: Point,
    pub thickness: Coord,
    pub clearance: Coord,
    pub component: ComponentId,
    #[serde(default)]
    pub intconn: u8,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub flags: Flags,
}

impl Pad {
    pub fn side(&self) -> Side {
        if self.flags.contains(Flags::ONSOLDER) {
            Side::Solder
        } else {
            Side::Component
        }
    }

    pub fn bounds(&self) -> BBox {
        let r = (self.thickness + self.clearance + 1) / 2;
        BBox::from_points(&[self.p1, self.p2]).grow(r)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Line {
    pub p1: Point,
    pub p2: Point,
    pub thickness: Coord,
    pub clearance: Coord,
    #[serde(default)]
    pub flags: Flags,
}

impl Line {
    pub fn bounds(&self) -> BBox {
        let r = (self.thickness + self.clearance + 1) / 2;
        BBox::from_points(&[self.p1, self.p2]).grow(r)
    }
}

/// Circular arc. `start_angle`/`delta_angle` in degrees; the zero angle
/// points toward negative x and positive angles sweep toward positive y.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Arc {
    pub center: Point,
    pub radius: Coord,
    pub start_angle: f64,
    pub delta_angle: f64,
    pub thickness: Coord,
    pub clearance: Coord,
    #[serde(default)]
    pub flags: Flags,
}

impl Arc {
    pub fn bounds(&self) -> BBox {
        let r = self.radius + (self.thickness + self.clearance + 1) / 2;
        BBox::around(self.center, r)
    }
}

/// Copper polygon, one outer contour. Holes and thermal clipping are not
/// modeled; `CLEARPOLY` plus per-pin thermal bits stand in for the
/// clipped shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Polygon {
    pub contour: Vec<Point>,
    #[serde(default)]
    pub flags: Flags,
}

impl Polygon {
    pub fn bounds(&self) -> BBox {
        BBox::from_points(&self.contour)
    }
}

/// Rat line: a zero-width logical connection between two layer groups.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Rat {
    pub p1: Point,
    pub group1: GroupId,
    pub p2: Point,
    pub group2: GroupId,
    #[serde(default)]
    pub flags: Flags,
}

impl Rat {
    pub fn bounds(&self) -> BBox {
        BBox::from_points(&[self.p1, self.p2])
    }
}

/// Silk screen line; only the width rule ever looks at these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SilkLine {
    pub p1: Point,
    pub p2: Point,
    pub thickness: Coord,
    #[serde(default)]
    pub component: Option<ComponentId>,
    #[serde(default)]
    pub flags: Flags,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Component {
    pub refdes: String,
    #[serde(default)]
    pub flags: Flags,
}

/// One copper layer and the objects drawn on it.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    /// Objects on this layer are exempt from DRC and from seeding.
    #[serde(default)]
    pub no_drc: bool,
    #[serde(default)]
    pub lines: Vec<Line>,
    #[serde(default)]
    pub arcs: Vec<Arc>,
    #[serde(default)]
    pub polygons: Vec<Polygon>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Board {
    #[serde(default)]
    pub rules: DesignRules,
    pub layers: Vec<Layer>,
    pub groups: Vec<LayerGroup>,
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub pvs: Vec<Pv>,
    #[serde(default)]
    pub pads: Vec<Pad>,
    #[serde(default)]
    pub rats: Vec<Rat>,
    #[serde(default)]
    pub silk: Vec<SilkLine>,
}

impl Board {
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.0 as usize)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.layer(id.layer)?.lines.get(id.index as usize)
    }

    pub fn arc(&self, id: ArcId) -> Option<&Arc> {
        self.layer(id.layer)?.arcs.get(id.index as usize)
    }

    pub fn polygon(&self, id: PolyId) -> Option<&Polygon> {
        self.layer(id.layer)?.polygons.get(id.index as usize)
    }

    /// Layer group a copper layer belongs to.
    pub fn group_of_layer(&self, layer: LayerId) -> Option<GroupId> {
        self.groups.iter().position(|g| {
            g.members
                .iter()
                .any(|m| matches!(m, GroupMember::Copper(l) if *l == layer))
        })
        .map(|i| GroupId(i as u32))
    }

    /// Layer group containing a pad side.
    pub fn group_of_side(&self, side: Side) -> Option<GroupId> {
        self.groups.iter().position(|g| {
            g.members
                .iter()
                .any(|m| matches!(m, GroupMember::PadSide(s) if *s == side))
        })
        .map(|i| GroupId(i as u32))
    }

    pub fn layer_ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        (0..self.layers.len()).map(|i| LayerId(i as u32))
    }

    pub fn line_ids(&self, layer: LayerId) -> impl Iterator<Item = LineId> + '_ {
        let n = self.layer(layer).map_or(0, |l| l.lines.len());
        (0..n).map(move |i| LineId { layer, index: i as u32 })
    }

    pub fn arc_ids(&self, layer: LayerId) -> impl Iterator<Item = ArcId> + '_ {
        let n = self.layer(layer).map_or(0, |l| l.arcs.len());
        (0..n).map(move |i| ArcId { layer, index: i as u32 })
    }

    pub fn polygon_ids(&self, layer: LayerId) -> impl Iterator<Item = PolyId> + '_ {
        let n = self.layer(layer).map_or(0, |l| l.polygons.len());
        (0..n).map(move |i| PolyId { layer, index: i as u32 })
    }

    pub fn pv_ids(&self) -> impl Iterator<Item = PvId> {
        (0..self.pvs.len() as u32).map(PvId)
    }

    pub fn pad_ids(&self) -> impl Iterator<Item = PadId> {
        (0..self.pads.len() as u32).map(PadId)
    }

    pub fn rat_ids(&self) -> impl Iterator<Item = RatId> {
        (0..self.rats.len() as u32).map(RatId)
    }

    /// References to every object that can take part in a connection:
    /// pins/vias, pads, rats and all layer objects. Silk and components
    /// are excluded.
    pub fn conducting_refs(&self) -> Vec<ObjRef> {
        let mut refs: Vec<ObjRef> = Vec::new();
        refs.extend(self.pv_ids().map(ObjRef::Pv));
        refs.extend(self.pad_ids().map(ObjRef::Pad));
        refs.extend(self.rat_ids().map(ObjRef::Rat));
        for layer in self.layer_ids() {
            refs.extend(self.line_ids(layer).map(ObjRef::Line));
            refs.extend(self.arc_ids(layer).map(ObjRef::Arc));
            refs.extend(self.polygon_ids(layer).map(ObjRef::Polygon));
        }
        refs
    }

    /// Flags of the referenced object, `Flags::NONE` for dangling refs.
    pub fn flags_of(&self, r: ObjRef) -> Flags {
        match r {
            ObjRef::Pv(id) => self.pvs.get(id.0 as usize).map(|o| o.flags),
            ObjRef::Pad(id) => self.pads.get(id.0 as usize).map(|o| o.flags),
            ObjRef::Line(id) => self.line(id).map(|o| o.flags),
            ObjRef::Arc(id) => self.arc(id).map(|o| o.flags),
            ObjRef::Polygon(id) => self.polygon(id).map(|o| o.flags),
            ObjRef::Rat(id) => self.rats.get(id.0 as usize).map(|o| o.flags),
            ObjRef::Silk(id) => self.silk.get(id.0 as usize).map(|o| o.flags),
            ObjRef::Component(id) => self.components.get(id.0 as usize).map(|o| o.flags),
        }
        .unwrap_or(Flags::NONE)
    }

    pub fn flags_mut(&mut self, r: ObjRef) -> Option<&mut Flags> {
        match r {
            ObjRef::Pv(id) => self.pvs.get_mut(id.0 as usize).map(|o| &mut o.flags),
            ObjRef::Pad(id) => self.pads.get_mut(id.0 as usize).map(|o| &mut o.flags),
            ObjRef::Line(id) => {
                let layer = self.layers.get_mut(id.layer.0 as usize)?;
                layer.lines.get_mut(id.index as usize).map(|o| &mut o.flags)
            }
            ObjRef::Arc(id) => {
                let layer = self.layers.get_mut(id.layer.0 as usize)?;
                layer.arcs.get_mut(id.index as usize).map(|o| &mut o.flags)
            }
            ObjRef::Polygon(id) => {
                let layer = self.layers.get_mut(id.layer.0 as usize)?;
                layer
                    .polygons
                    .get_mut(id.index as usize)
                    .map(|o| &mut o.flags)
            }
            ObjRef::Rat(id) => self.rats.get_mut(id.0 as usize).map(|o| &mut o.flags),
            ObjRef::Silk(id) => self.silk.get_mut(id.0 as usize).map(|o| &mut o.flags),
            ObjRef::Component(id) => self
                .components
                .get_mut(id.0 as usize)
                .map(|o| &mut o.flags),
        }
    }

    /// Representative location of an object, used for violation markers.
    pub fn location_of(&self, r: ObjRef) -> Point {
        match r {
            ObjRef::Pv(id) => self.pvs.get(id.0 as usize).map(|o| o.pos),
            ObjRef::Pad(id) => self
                .pads
                .get(id.0 as usize)
                .map(|o| o.bounds().center()),
            ObjRef::Line(id) => self.line(id).map(|o| o.bounds().center()),
            ObjRef::Arc(id) => self.arc(id).map(|o| o.center),
            ObjRef::Polygon(id) => self.polygon(id).map(|o| o.bounds().center()),
            ObjRef::Rat(id) => self.rats.get(id.0 as usize).map(|o| o.bounds().center()),
            ObjRef::Silk(id) => self
                .silk
                .get(id.0 as usize)
                .map(|o| BBox::from_points(&[o.p1, o.p2]).center()),
            ObjRef::Component(_) => None,
        }
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_ops() {
        let mut f = Flags::NONE;
        f.insert(Flags::FOUND | Flags::SQUARE);
        assert!(f.contains(Flags::FOUND));
        assert!(f.intersects(Flags::VISIT_MASK));
        f.remove(Flags::VISIT_MASK);
        assert!(!f.contains(Flags::FOUND));
        assert!(f.contains(Flags::SQUARE));
    }

    #[test]
    fn group_lookup() {
        let board = Board {
            layers: vec![Layer::default(), Layer::default()],
            groups: vec![
                LayerGroup {
                    members: vec![
                        GroupMember::Copper(LayerId(0)),
                        GroupMember::PadSide(Side::Component),
                    ],
                },
                LayerGroup {
                    members: vec![
                        GroupMember::Copper(LayerId(1)),
                        GroupMember::PadSide(Side::Solder),
                    ],
                },
            ],
            ..Board::default()
        };
        assert_eq!(board.group_of_layer(LayerId(1)), Some(GroupId(1)));
        assert_eq!(board.group_of_side(Side::Component), Some(GroupId(0)));
        assert_eq!(board.group_of_layer(LayerId(7)), None);
    }

    #[test]
    fn pv_bounds_cover_drill_and_clearance() {
        let pv = Pv {
            pos: Point::new(0, 0),
            thickness: 100,
            drill: 40,
            clearance: 20,
            component: None,
            intconn: 0,
            therm_layers: 0,
            name: None,
            flags: Flags::NONE,
        };
        assert_eq!(pv.bounds(), BBox::new(-60, -60, 60, 60));
    }
}
