//! Cell occupancy for the farm field.
//!
//! The grid maps integer cells to the item standing on them and back. Which
//! cells are legal at all is decided by a [`LayoutConfig`]; the default is the
//! irregular field of the standard farm.

use crate::id::ItemId;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::{BTreeMap, BTreeSet};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the farm field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::fmt::Display for GridPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Which cells of the field accept items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayoutConfig {
    /// The standard farm field: columns -5..=4 without the road at x = -1,
    /// each column trimmed to the shape of the plot.
    #[default]
    Standard,
    /// Every cell in the inclusive rectangle.
    Rect { min: GridPosition, max: GridPosition },
    /// An explicit list of cells.
    Cells { cells: BTreeSet<GridPosition> },
    /// Any cell.
    Unbounded,
}

impl LayoutConfig {
    /// Whether `pos` is a legal cell in this layout.
    pub fn contains(&self, pos: GridPosition) -> bool {
        match self {
            LayoutConfig::Standard => standard_contains(pos),
            LayoutConfig::Rect { min, max } => {
                (min.x..=max.x).contains(&pos.x) && (min.y..=max.y).contains(&pos.y)
            }
            LayoutConfig::Cells { cells } => cells.contains(&pos),
            LayoutConfig::Unbounded => true,
        }
    }

    /// All legal cells in `(x, y)` order, or `None` for an unbounded layout.
    pub fn cells(&self) -> Option<Vec<GridPosition>> {
        match self {
            LayoutConfig::Standard => Some(
                (-5..=4)
                    .flat_map(|x| (-4..=3).map(move |y| GridPosition::new(x, y)))
                    .filter(|&pos| standard_contains(pos))
                    .collect(),
            ),
            LayoutConfig::Rect { min, max } => Some(
                (min.x..=max.x)
                    .flat_map(|x| (min.y..=max.y).map(move |y| GridPosition::new(x, y)))
                    .collect(),
            ),
            LayoutConfig::Cells { cells } => Some(cells.iter().copied().collect()),
            LayoutConfig::Unbounded => None,
        }
    }
}

fn standard_contains(pos: GridPosition) -> bool {
    let GridPosition { x, y } = pos;
    if !(-4..=3).contains(&y) {
        return false;
    }
    match x {
        -5 => y == 0,
        -4 => (-1..=1).contains(&y),
        -3 => y >= -2,
        -2 => y >= -3,
        0 | 1 => y <= 2,
        2 => y <= 1,
        3 => y <= 0,
        4 => y <= -1,
        // x = -1 is the road.
        _ => false,
    }
}

/// Errors from occupancy operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("cell {0} is outside the farm layout")]
    InvalidCell(GridPosition),
    #[error("cell {0} is occupied")]
    Occupied(GridPosition),
    #[error("item is not placed on the grid")]
    NotPlaced,
    #[error("item is already placed on the grid")]
    AlreadyPlaced,
}

// ---------------------------------------------------------------------------
// PlacementGrid
// ---------------------------------------------------------------------------

/// Bidirectional occupancy map.
///
/// - `cells`: position -> item standing on it
/// - `positions`: item -> its cell
///
/// A cell is occupied iff exactly one live item was placed there and has not
/// been released.
#[derive(Debug, Default)]
pub struct PlacementGrid {
    layout: LayoutConfig,
    cells: BTreeMap<GridPosition, ItemId>,
    positions: SecondaryMap<ItemId, GridPosition>,
}

impl PlacementGrid {
    pub fn new(layout: LayoutConfig) -> Self {
        Self {
            layout,
            cells: BTreeMap::new(),
            positions: SecondaryMap::new(),
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    /// True if `pos` is legal and nothing stands on it.
    pub fn is_cell_free(&self, pos: GridPosition) -> bool {
        self.check_cell(pos).is_ok()
    }

    /// Explain why `pos` cannot take an item, if it cannot.
    pub fn check_cell(&self, pos: GridPosition) -> Result<(), GridError> {
        if !self.layout.contains(pos) {
            return Err(GridError::InvalidCell(pos));
        }
        if self.cells.contains_key(&pos) {
            return Err(GridError::Occupied(pos));
        }
        Ok(())
    }

    /// Mark `pos` as occupied by `item`.
    pub fn occupy(&mut self, item: ItemId, pos: GridPosition) -> Result<(), GridError> {
        if self.positions.contains_key(item) {
            return Err(GridError::AlreadyPlaced);
        }
        self.check_cell(pos)?;
        self.cells.insert(pos, item);
        self.positions.insert(item, pos);
        Ok(())
    }

    /// Free the cell held by `item`. Returns the cell.
    pub fn release(&mut self, item: ItemId) -> Result<GridPosition, GridError> {
        let pos = self.positions.remove(item).ok_or(GridError::NotPlaced)?;
        self.cells.remove(&pos);
        Ok(pos)
    }

    pub fn item_at(&self, pos: GridPosition) -> Option<ItemId> {
        self.cells.get(&pos).copied()
    }

    pub fn position_of(&self, item: ItemId) -> Option<GridPosition> {
        self.positions.get(item).copied()
    }

    /// Legal, unoccupied cells in `(x, y)` order. Empty for an unbounded layout.
    pub fn free_cells(&self) -> Vec<GridPosition> {
        self.layout
            .cells()
            .unwrap_or_default()
            .into_iter()
            .filter(|pos| !self.cells.contains_key(pos))
            .collect()
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.len()
    }

    /// Occupied cells in `(x, y)` order.
    pub fn iter(&self) -> impl Iterator<Item = (GridPosition, ItemId)> + '_ {
        self.cells.iter().map(|(&pos, &item)| (pos, item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn items(n: usize) -> Vec<ItemId> {
        let mut sm = SlotMap::<ItemId, ()>::with_key();
        (0..n).map(|_| sm.insert(())).collect()
    }

    #[test]
    fn standard_layout_mask() {
        let layout = LayoutConfig::Standard;
        assert!(layout.contains(GridPosition::new(-5, 0)));
        assert!(!layout.contains(GridPosition::new(-5, 1)));
        assert!(layout.contains(GridPosition::new(-4, -1)));
        assert!(!layout.contains(GridPosition::new(-4, 2)));
        assert!(!layout.contains(GridPosition::new(-3, -3)));
        assert!(layout.contains(GridPosition::new(-2, -3)));
        assert!(!layout.contains(GridPosition::new(-1, 0)));
        assert!(layout.contains(GridPosition::new(0, 2)));
        assert!(!layout.contains(GridPosition::new(0, 3)));
        assert!(layout.contains(GridPosition::new(4, -1)));
        assert!(!layout.contains(GridPosition::new(4, 0)));
        assert!(!layout.contains(GridPosition::new(5, 0)));
        assert!(!layout.contains(GridPosition::new(0, -5)));
    }

    #[test]
    fn standard_layout_cell_count() {
        // Column sizes: 1 + 3 + 6 + 7 + 7 + 7 + 6 + 5 + 4.
        let cells = LayoutConfig::Standard.cells().unwrap();
        assert_eq!(cells.len(), 46);
        assert_eq!(cells[0], GridPosition::new(-5, 0));
    }

    #[test]
    fn rect_layout_is_inclusive() {
        let layout = LayoutConfig::Rect {
            min: GridPosition::new(0, 0),
            max: GridPosition::new(1, 2),
        };
        assert_eq!(layout.cells().unwrap().len(), 6);
        assert!(layout.contains(GridPosition::new(1, 2)));
        assert!(!layout.contains(GridPosition::new(2, 2)));
    }

    #[test]
    fn occupy_and_release() {
        let ids = items(1);
        let mut grid = PlacementGrid::new(LayoutConfig::Standard);
        let cell = GridPosition::new(0, 0);

        assert!(grid.is_cell_free(cell));
        grid.occupy(ids[0], cell).unwrap();
        assert!(!grid.is_cell_free(cell));
        assert_eq!(grid.item_at(cell), Some(ids[0]));
        assert_eq!(grid.position_of(ids[0]), Some(cell));
        assert_eq!(grid.occupied_count(), 1);

        assert_eq!(grid.release(ids[0]), Ok(cell));
        assert!(grid.is_cell_free(cell));
        assert_eq!(grid.release(ids[0]), Err(GridError::NotPlaced));
    }

    #[test]
    fn occupied_and_invalid_cells_rejected() {
        let ids = items(3);
        let mut grid = PlacementGrid::new(LayoutConfig::Standard);
        let cell = GridPosition::new(2, 1);
        grid.occupy(ids[0], cell).unwrap();

        assert_eq!(grid.occupy(ids[1], cell), Err(GridError::Occupied(cell)));
        let road = GridPosition::new(-1, 0);
        assert_eq!(grid.occupy(ids[1], road), Err(GridError::InvalidCell(road)));
        assert_eq!(
            grid.occupy(ids[0], GridPosition::new(0, 0)),
            Err(GridError::AlreadyPlaced)
        );
        assert_eq!(grid.occupied_count(), 1);
    }

    #[test]
    fn free_cells_skip_occupied() {
        let ids = items(1);
        let mut grid = PlacementGrid::new(LayoutConfig::Standard);
        grid.occupy(ids[0], GridPosition::new(-5, 0)).unwrap();
        let free = grid.free_cells();
        assert_eq!(free.len(), 45);
        assert!(!free.contains(&GridPosition::new(-5, 0)));
    }

    #[test]
    fn unbounded_accepts_anything() {
        let ids = items(1);
        let mut grid = PlacementGrid::new(LayoutConfig::Unbounded);
        grid.occupy(ids[0], GridPosition::new(1000, -1000)).unwrap();
        assert!(grid.free_cells().is_empty());
    }

    #[test]
    fn layout_config_from_json() {
        let layout: LayoutConfig =
            serde_json::from_str(r#"{"kind":"rect","min":{"x":0,"y":0},"max":{"x":2,"y":2}}"#)
                .unwrap();
        assert_eq!(layout.cells().unwrap().len(), 9);
        let layout: LayoutConfig = serde_json::from_str(r#"{"kind":"standard"}"#).unwrap();
        assert_eq!(layout, LayoutConfig::Standard);
    }
}
