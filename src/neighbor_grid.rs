use crate::math::toroidal_distance;

const INVALID_INDEX: usize = usize::MAX;
const MAX_CELLS_PER_AXIS: usize = 1024;

/// Every index whose toroidal distance to `origin` is strictly below `radius`,
/// in ascending order. A particle sitting exactly at `origin` is included.
pub fn neighbors(pos_x: &[f64], pos_y: &[f64], radius: f64, origin: (f64, f64)) -> Vec<usize> {
    let mut out = Vec::new();
    neighbors_into(pos_x, pos_y, radius, origin, &mut out);
    out
}

pub fn neighbors_into(
    pos_x: &[f64],
    pos_y: &[f64],
    radius: f64,
    origin: (f64, f64),
    out: &mut Vec<usize>,
) {
    assert_eq!(pos_x.len(), pos_y.len());
    out.clear();
    for (j, (&x, &y)) in pos_x.iter().zip(pos_y).enumerate() {
        if toroidal_distance(origin.0, origin.1, x, y) < radius {
            out.push(j);
        }
    }
}

/// Cell list over the unit torus.
///
/// Cells are always wider than the query radius, so a neighbor can only live
/// in the origin's cell or one of the eight around it. Candidates go through
/// the same distance test as [`neighbors`] and come back sorted, so callers see
/// exactly the brute-force result.
pub struct NeighborGrid {
    radius: f64,
    cells_per_axis: usize,
    particle_count: usize,
    head: Vec<usize>,
    next: Vec<usize>,
    cached_x: Vec<f64>,
    cached_y: Vec<f64>,
}

impl NeighborGrid {
    pub fn new(count: usize, radius: f64) -> Self {
        let mut grid = Self {
            radius,
            cells_per_axis: 1,
            particle_count: 0,
            head: Vec::new(),
            next: Vec::new(),
            cached_x: Vec::new(),
            cached_y: Vec::new(),
        };

        grid.ensure_layout(count);
        grid
    }

    pub fn cells_per_axis(&self) -> usize {
        self.cells_per_axis
    }

    pub fn rebuild(&mut self, positions_x: &[f64], positions_y: &[f64]) {
        assert_eq!(positions_x.len(), positions_y.len());

        let count = positions_x.len();
        self.ensure_layout(count);
        self.head.fill(INVALID_INDEX);

        if count == 0 {
            return;
        }

        self.cached_x.copy_from_slice(positions_x);
        self.cached_y.copy_from_slice(positions_y);

        // Pushing in reverse keeps each cell's chain in ascending index order.
        for i in (0..count).rev() {
            let cell = self.cell_index_for_position(positions_x[i], positions_y[i]);
            self.next[i] = self.head[cell];
            self.head[cell] = i;
        }
    }

    pub fn for_each_neighbor<F>(&self, origin: (f64, f64), mut callback: F)
    where
        F: FnMut(usize),
    {
        if self.particle_count == 0 {
            return;
        }

        let base_x = self.cell_coord(origin.0);
        let base_y = self.cell_coord(origin.1);
        let columns = self.candidate_axis_cells(base_x);
        let rows = self.candidate_axis_cells(base_y);

        for &cell_y in rows.as_slice() {
            for &cell_x in columns.as_slice() {
                self.scan_cell(cell_x, cell_y, origin, &mut callback);
            }
        }
    }

    /// Same result as [`neighbors_into`] over the positions of the last rebuild.
    pub fn neighbors_into(&self, origin: (f64, f64), out: &mut Vec<usize>) {
        out.clear();
        self.for_each_neighbor(origin, |j| out.push(j));
        out.sort_unstable();
    }

    fn ensure_layout(&mut self, count: usize) {
        self.particle_count = count;

        // One cell of slack keeps rounding in cell assignment from pushing a
        // boundary neighbor two cells away.
        let cells_per_axis = if self.radius.is_finite() && self.radius > 0.0 {
            ((1.0 / self.radius).floor() as usize)
                .saturating_sub(1)
                .clamp(1, MAX_CELLS_PER_AXIS)
        } else {
            1
        };
        let grid_size = cells_per_axis * cells_per_axis;

        if cells_per_axis != self.cells_per_axis || self.head.len() != grid_size {
            self.cells_per_axis = cells_per_axis;
            self.head.clear();
            self.head.resize(grid_size, INVALID_INDEX);
        }

        if self.next.len() != count {
            self.next.resize(count, INVALID_INDEX);
        }
        if self.cached_x.len() != count {
            self.cached_x.resize(count, 0.0);
            self.cached_y.resize(count, 0.0);
        }
    }

    fn cell_index_for_position(&self, x: f64, y: f64) -> usize {
        self.cell_coord(y) * self.cells_per_axis + self.cell_coord(x)
    }

    fn cell_coord(&self, value: f64) -> usize {
        let cells = self.cells_per_axis as f64;
        ((value * cells).floor().max(0.0) as usize).min(self.cells_per_axis - 1)
    }

    fn candidate_axis_cells(&self, base: usize) -> AxisCells {
        let n = self.cells_per_axis;
        if n <= 3 {
            let mut cells = AxisCells::default();
            for cell in 0..n {
                cells.push(cell);
            }
            return cells;
        }

        let mut cells = AxisCells::default();
        cells.push((base + n - 1) % n);
        cells.push(base);
        cells.push((base + 1) % n);
        cells
    }

    fn scan_cell<F>(&self, cell_x: usize, cell_y: usize, origin: (f64, f64), callback: &mut F)
    where
        F: FnMut(usize),
    {
        let cell_index = cell_y * self.cells_per_axis + cell_x;
        let mut candidate = self.head[cell_index];

        while candidate != INVALID_INDEX {
            let distance = toroidal_distance(
                origin.0,
                origin.1,
                self.cached_x[candidate],
                self.cached_y[candidate],
            );
            if distance < self.radius {
                callback(candidate);
            }

            candidate = self.next[candidate];
        }
    }
}

#[derive(Default)]
struct AxisCells {
    cells: [usize; 3],
    len: usize,
}

impl AxisCells {
    fn push(&mut self, cell: usize) {
        self.cells[self.len] = cell;
        self.len += 1;
    }

    fn as_slice(&self) -> &[usize] {
        &self.cells[..self.len]
    }
}
