//! Directions of streams through the faces of a cube-sphere.

use super::{StreamCoord, StreamGrid};
use crate::{geometry::Vec3, transport::fep};

impl StreamGrid {
    /// Computes the unit vector pointing through the centre of the cell
    /// of the given stream on the cube-sphere.
    ///
    /// Faces 0 to 3 wrap around the equator in order of increasing azimuth,
    /// face 4 is the northern and face 5 the southern cap.
    pub fn direction(&self, coord: &StreamCoord) -> Vec3<fep> {
        let u = -1.0 + (2 * coord.col + 1) as fep / self.num_cols as fep;
        let v = -1.0 + (2 * coord.row + 1) as fep / self.num_rows as fep;

        // Equiangular mapping gives cells of similar size
        let a = (0.25 * std::f64::consts::PI * u).tan();
        let b = (0.25 * std::f64::consts::PI * v).tan();

        let cube_point = match coord.face {
            0 => Vec3::new(1.0, a, b),
            1 => Vec3::new(-a, 1.0, b),
            2 => Vec3::new(-1.0, -a, b),
            3 => Vec3::new(a, -1.0, b),
            4 => Vec3::new(-b, a, 1.0),
            5 => Vec3::new(b, a, -1.0),
            face => panic!("Invalid cube-sphere face {}", face),
        };
        cube_point.normalized()
    }

    /// Computes the position at the given radius on the radial ray of the
    /// given stream.
    pub fn node_position(&self, stream: usize, radius: fep) -> Vec3<fep> {
        self.direction(&self.coord_of(stream)) * radius
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Dim3;
    use approx::assert_abs_diff_eq;

    #[test]
    fn face_centres_point_along_axes() {
        let grid = StreamGrid::new(1, 1);
        let east = grid.direction(&StreamCoord::new(0, 0, 0));
        let north = grid.direction(&StreamCoord::new(4, 0, 0));
        let south = grid.direction(&StreamCoord::new(5, 0, 0));
        assert_abs_diff_eq!(east[Dim3::X], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(north[Dim3::Z], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(south[Dim3::Z], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn directions_are_unit_and_distinct() {
        let grid = StreamGrid::new(2, 3);
        let directions: Vec<_> = (0..grid.num_streams())
            .map(|stream| grid.direction(&grid.coord_of(stream)))
            .collect();
        for (i, direction) in directions.iter().enumerate() {
            assert_abs_diff_eq!(direction.length(), 1.0, epsilon = 1e-12);
            for other in &directions[i + 1..] {
                assert!((*direction - *other).length() > 1e-3);
            }
        }
    }
}
