use crate::{
    curve::points::{ControlPoints, Points},
    surface::{Direction, SurfaceError},
    types::{homogeneous, MatD, Vec3},
};

/// Control net of a surface.
///
/// The net has one row per `v` basis function and one column per `u` basis function.
/// Points are stored in a `4 x (rows * cols)` matrix, row after row.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlNet {
    rows: usize,
    cols: usize,
    matrix: MatD,
}

impl Points for ControlNet {
    fn matrix(&self) -> &MatD {
        &self.matrix
    }

    fn matrix_mut(&mut self) -> &mut MatD {
        &mut self.matrix
    }
}

impl ControlNet {
    pub fn new(rows: &[Vec<Vec3>]) -> Result<Self, SurfaceError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, found)) = rows.iter().map(Vec::len).enumerate().find(|&(_, len)| len != cols) {
            return Err(SurfaceError::RaggedNet { row, expected: cols, found });
        }
        let matrix = MatD::from_fn(4, rows.len() * cols, |r, c| {
            if r < 3 {
                rows[c / cols][c % cols][r]
            } else {
                1.0
            }
        });
        Ok(ControlNet { rows: rows.len(), cols, matrix })
    }

    pub(crate) fn from_matrix(rows: usize, cols: usize, matrix: MatD) -> Self {
        ControlNet { rows, cols, matrix }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    pub fn at(&self, row: usize, col: usize) -> Vec3 {
        self.get(self.index(row, col))
    }

    pub(crate) fn set_at(&mut self, row: usize, col: usize, point: &Vec3) {
        let i = self.index(row, col);
        self.matrix.fixed_view_mut::<4, 1>(0, i).copy_from(&homogeneous(point));
    }

    /// Control polygon of row `row`, running along `u`.
    pub fn row(&self, row: usize) -> ControlPoints {
        ControlPoints::from_matrix(self.matrix.columns(row * self.cols, self.cols).into_owned())
    }

    /// Control polygon of column `col`, running along `v`.
    pub fn column(&self, col: usize) -> ControlPoints {
        let indices: Vec<usize> = (0..self.rows).map(|r| r * self.cols + col).collect();
        ControlPoints::from_matrix(self.matrix.select_columns(indices.iter()))
    }

    /// All control polygons running along `direction`: the rows for `U`, the columns for `V`.
    pub fn lines(&self, direction: Direction) -> Vec<ControlPoints> {
        match direction {
            Direction::U => (0..self.rows).map(|r| self.row(r)).collect(),
            Direction::V => (0..self.cols).map(|c| self.column(c)).collect(),
        }
    }

    /// Assembles a net from control polygons of equal length running along `direction`.
    pub fn from_lines(direction: Direction, lines: &[ControlPoints]) -> Self {
        let count = lines.len();
        let length = lines.first().map_or(0, |l| l.count());
        let (rows, cols) = match direction {
            Direction::U => (count, length),
            Direction::V => (length, count),
        };
        let matrix = MatD::from_fn(4, rows * cols, |r, c| {
            let (row, col) = (c / cols, c % cols);
            match direction {
                Direction::U => lines[row].matrix()[(r, col)],
                Direction::V => lines[col].matrix()[(r, row)],
            }
        });
        ControlNet { rows, cols, matrix }
    }
}
