use std::collections::VecDeque;

use crate::geometry::TileCoord;

/// Neighbor expansion order. It decides which of several equally short
/// paths is returned, never the path length.
pub const NAV_NEIGHBOR_ORDER: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

/// Rectangular grid searched by [`find_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavGrid {
    pub width: u32,
    pub height: u32,
}

impl NavGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, tile: TileCoord) -> bool {
        self.index_of(tile).is_some()
    }

    fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 {
            return None;
        }
        let (x, y) = (tile.x as u32, tile.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    fn coord_of(&self, index: usize) -> TileCoord {
        let width = self.width as usize;
        TileCoord::new((index % width) as i32, (index / width) as i32)
    }
}

/// Unweighted breadth-first search over the 4-connected grid.
///
/// Returns the full path including `start` and `goal`, or `None` when either
/// endpoint lies outside the grid or the goal cannot be reached. The start
/// tile itself is never probed for walkability; every other tile is only
/// entered when `walkable` accepts it.
pub fn find_path(
    grid: NavGrid,
    start: TileCoord,
    goal: TileCoord,
    mut walkable: impl FnMut(TileCoord) -> bool,
) -> Option<Vec<TileCoord>> {
    let start_index = grid.index_of(start)?;
    let goal_index = grid.index_of(goal)?;
    if start_index == goal_index {
        return Some(vec![start]);
    }

    let node_count = grid.width as usize * grid.height as usize;
    let mut came_from = vec![None::<usize>; node_count];
    let mut visited = vec![false; node_count];
    let mut frontier = VecDeque::new();
    visited[start_index] = true;
    frontier.push_back(start_index);

    while let Some(current_index) = frontier.pop_front() {
        if current_index == goal_index {
            break;
        }
        let current = grid.coord_of(current_index);
        for (dx, dy) in NAV_NEIGHBOR_ORDER {
            let neighbor = current.offset(dx, dy);
            let Some(neighbor_index) = grid.index_of(neighbor) else {
                continue;
            };
            if visited[neighbor_index] || !walkable(neighbor) {
                continue;
            }
            visited[neighbor_index] = true;
            came_from[neighbor_index] = Some(current_index);
            frontier.push_back(neighbor_index);
        }
    }

    if !visited[goal_index] {
        return None;
    }
    reconstruct_tile_path(&grid, &came_from, start_index, goal_index)
}

fn reconstruct_tile_path(
    grid: &NavGrid,
    came_from: &[Option<usize>],
    start_index: usize,
    goal_index: usize,
) -> Option<Vec<TileCoord>> {
    let mut cursor = goal_index;
    let mut indices = vec![cursor];
    while cursor != start_index {
        cursor = came_from.get(cursor).copied().flatten()?;
        indices.push(cursor);
    }
    indices.reverse();
    Some(indices.into_iter().map(|index| grid.coord_of(index)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocked_set(blocked: &[(i32, i32)]) -> impl FnMut(TileCoord) -> bool + '_ {
        move |tile| !blocked.contains(&(tile.x, tile.y))
    }

    fn assert_contiguous(path: &[TileCoord]) {
        for pair in path.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1, "{pair:?}");
        }
    }

    #[test]
    fn open_grid_path_length_is_manhattan_plus_one() {
        let grid = NavGrid::new(10, 10);
        let cases = [((0, 0), (9, 9)), ((5, 5), (5, 8)), ((7, 2), (1, 6)), ((3, 3), (3, 3))];
        for (start, goal) in cases {
            let start = TileCoord::from(start);
            let goal = TileCoord::from(goal);
            let path = find_path(grid, start, goal, |_| true).expect("open grid path");
            assert_eq!(path.len() as u32, start.manhattan_distance(goal) + 1);
            assert_eq!(path.first(), Some(&start));
            assert_eq!(path.last(), Some(&goal));
            assert_contiguous(&path);
        }
    }

    #[test]
    fn straight_line_path_is_exact() {
        let path = find_path(
            NavGrid::new(10, 10),
            TileCoord::new(5, 5),
            TileCoord::new(5, 8),
            |_| true,
        )
        .expect("path");
        assert_eq!(
            path,
            vec![
                TileCoord::new(5, 5),
                TileCoord::new(5, 6),
                TileCoord::new(5, 7),
                TileCoord::new(5, 8),
            ]
        );
    }

    #[test]
    fn enclosed_goal_has_no_path() {
        let walls = [(4, 5), (6, 5), (5, 4), (5, 6)];
        let path = find_path(
            NavGrid::new(10, 10),
            TileCoord::new(0, 0),
            TileCoord::new(5, 5),
            blocked_set(&walls),
        );
        assert_eq!(path, None);
    }

    #[test]
    fn out_of_bounds_endpoints_have_no_path() {
        let grid = NavGrid::new(4, 4);
        assert_eq!(find_path(grid, TileCoord::new(-1, 0), TileCoord::new(2, 2), |_| true), None);
        assert_eq!(find_path(grid, TileCoord::new(0, 0), TileCoord::new(4, 2), |_| true), None);
    }

    #[test]
    fn path_detours_around_wall_without_touching_it() {
        let walls: Vec<(i32, i32)> = (0..4).map(|y| (3, y)).collect();
        let path = find_path(
            NavGrid::new(7, 5),
            TileCoord::new(1, 1),
            TileCoord::new(5, 1),
            blocked_set(&walls),
        )
        .expect("detour");
        assert_contiguous(&path);
        assert!(path.iter().all(|tile| !walls.contains(&(tile.x, tile.y))));
        assert!(path.contains(&TileCoord::new(3, 4)));
    }

    #[test]
    fn repeated_search_is_deterministic() {
        let grid = NavGrid::new(6, 6);
        let first = find_path(grid, TileCoord::new(0, 0), TileCoord::new(4, 3), |_| true);
        let second = find_path(grid, TileCoord::new(0, 0), TileCoord::new(4, 3), |_| true);
        assert_eq!(first, second);
    }
}
