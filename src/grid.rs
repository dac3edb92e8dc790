//! Grids of streams and phase space bins.

pub mod cube_sphere;
pub mod phase_space;

use crate::config::GridConfig;
use std::fmt;

#[cfg(feature = "serialization")]
use serde::Serialize;

/// Coordinate of a stream on the cube-sphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serialization", derive(Serialize))]
pub struct StreamCoord {
    pub face: usize,
    pub row: usize,
    pub col: usize,
}

impl StreamCoord {
    pub fn new(face: usize, row: usize, col: usize) -> Self {
        Self { face, row, col }
    }
}

impl fmt::Display for StreamCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(face {}, row {}, col {})",
            self.face, self.row, self.col
        )
    }
}

/// Arrangement of streams on the six faces of a cube-sphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamGrid {
    num_rows: usize,
    num_cols: usize,
}

impl StreamGrid {
    /// Creates a new stream grid with the given number of rows and
    /// columns per face.
    pub fn new(num_rows: usize, num_cols: usize) -> Self {
        assert!(
            num_rows > 0 && num_cols > 0,
            "Stream grid must be non-empty"
        );
        Self { num_rows, num_cols }
    }

    /// Creates the stream grid described by the given grid configuration.
    pub fn from_config(config: &GridConfig) -> Self {
        Self::new(config.num_rows_per_face, config.num_columns_per_face)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    /// Total number of streams.
    pub fn num_streams(&self) -> usize {
        GridConfig::NUM_FACES * self.num_rows * self.num_cols
    }

    /// Computes the global index of the stream with the given coordinate.
    pub fn index_of(&self, coord: &StreamCoord) -> usize {
        (coord.face * self.num_rows + coord.row) * self.num_cols + coord.col
    }

    /// Computes the coordinate of the stream with the given global index.
    pub fn coord_of(&self, stream: usize) -> StreamCoord {
        debug_assert!(stream < self.num_streams());
        let col = stream % self.num_cols;
        let row = (stream / self.num_cols) % self.num_rows;
        let face = stream / (self.num_cols * self.num_rows);
        StreamCoord { face, row, col }
    }

    /// Returns the global indices of the streams adjacent to the given one
    /// on the same face, in the order row-1, row+1, col-1, col+1.
    pub fn in_face_neighbours(&self, stream: usize) -> Vec<usize> {
        let coord = self.coord_of(stream);
        let mut neighbours = Vec::with_capacity(4);
        if coord.row > 0 {
            neighbours.push(self.index_of(&StreamCoord::new(
                coord.face,
                coord.row - 1,
                coord.col,
            )));
        }
        if coord.row + 1 < self.num_rows {
            neighbours.push(self.index_of(&StreamCoord::new(
                coord.face,
                coord.row + 1,
                coord.col,
            )));
        }
        if coord.col > 0 {
            neighbours.push(self.index_of(&StreamCoord::new(
                coord.face,
                coord.row,
                coord.col - 1,
            )));
        }
        if coord.col + 1 < self.num_cols {
            neighbours.push(self.index_of(&StreamCoord::new(
                coord.face,
                coord.row,
                coord.col + 1,
            )));
        }
        neighbours
    }

    /// Rank of the worker owning the given stream.
    pub fn owner(&self, stream: usize, num_workers: usize) -> usize {
        stream % num_workers
    }

    /// Returns the global indices of all streams owned by the given worker, in
    /// increasing order.
    pub fn owned_streams(&self, rank: usize, num_workers: usize) -> Vec<usize> {
        (rank..self.num_streams()).step_by(num_workers).collect()
    }

    /// Number of gather iterations needed for every stream to be a work index once.
    pub fn num_work_iterations(&self, num_workers: usize) -> usize {
        (self.num_streams() + num_workers - 1) / num_workers
    }

    /// Work index handled by the given worker in the given iteration, if any.
    pub fn work_index(&self, rank: usize, num_workers: usize, iteration: usize) -> Option<usize> {
        let stream = rank + num_workers * iteration;
        if stream < self.num_streams() {
            Some(stream)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_index_conversion_is_consistent() {
        let grid = StreamGrid::new(3, 4);
        assert_eq!(grid.num_streams(), 72);
        for stream in 0..grid.num_streams() {
            assert_eq!(grid.index_of(&grid.coord_of(stream)), stream);
        }
        assert_eq!(
            grid.index_of(&StreamCoord::new(2, 1, 3)),
            (2 * 3 + 1) * 4 + 3
        );
    }

    #[test]
    fn neighbours_stay_on_face() {
        let grid = StreamGrid::new(2, 2);
        let corner = grid.index_of(&StreamCoord::new(1, 0, 0));
        let neighbours = grid.in_face_neighbours(corner);
        assert_eq!(
            neighbours,
            vec![
                grid.index_of(&StreamCoord::new(1, 1, 0)),
                grid.index_of(&StreamCoord::new(1, 0, 1))
            ]
        );
        assert!(StreamGrid::new(1, 1).in_face_neighbours(3).is_empty());
    }

    #[test]
    fn work_indices_cover_all_streams_once() {
        let grid = StreamGrid::new(1, 3);
        let num_workers = 4;
        let mut seen = Vec::new();
        for iteration in 0..grid.num_work_iterations(num_workers) {
            for rank in 0..num_workers {
                if let Some(stream) = grid.work_index(rank, num_workers, iteration) {
                    assert_eq!(grid.owner(stream, num_workers), rank);
                    seen.push(stream);
                }
            }
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..grid.num_streams()).collect::<Vec<_>>());
        assert_eq!(grid.owned_streams(1, num_workers), vec![1, 5, 9, 13, 17]);
    }
}
