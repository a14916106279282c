/// A 2D grid of cells addressed as (x, z).
///
/// Height fields (`Grid<i32>`) and feature masks (`Grid<bool>`) share this
/// storage. Unlike a full-planet tilemap there is no wrapping: a grid covers
/// exactly one chunk (or one padded chunk neighbourhood) and out-of-range
/// access is a caller bug.
#[derive(Clone, PartialEq)]
pub struct Grid<T> {
    pub width: usize,
    pub depth: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Grid<T> {
    pub fn new(width: usize, depth: usize) -> Self {
        Self {
            width,
            depth,
            data: vec![T::default(); width * depth],
        }
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_with(width: usize, depth: usize, value: T) -> Self {
        Self {
            width,
            depth,
            data: vec![value; width * depth],
        }
    }

    fn index(&self, x: usize, z: usize) -> usize {
        debug_assert!(x < self.width && z < self.depth);
        x * self.depth + z
    }

    pub fn get(&self, x: usize, z: usize) -> &T {
        &self.data[self.index(x, z)]
    }

    pub fn get_mut(&mut self, x: usize, z: usize) -> &mut T {
        let idx = self.index(x, z);
        &mut self.data[idx]
    }

    pub fn set(&mut self, x: usize, z: usize, value: T) {
        let idx = self.index(x, z);
        self.data[idx] = value;
    }

    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Iterate over all cells with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &T)> {
        self.data.iter().enumerate().map(move |(idx, val)| {
            let x = idx / self.depth;
            let z = idx % self.depth;
            (x, z, val)
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, usize, &mut T)> {
        let depth = self.depth;
        self.data.iter_mut().enumerate().map(move |(idx, val)| {
            let x = idx / depth;
            let z = idx % depth;
            (x, z, val)
        })
    }

    /// Overwrite a run of cells along z at row x, clipped to the grid.
    pub fn set_span(&mut self, x: usize, z_start: usize, z_end: usize, value: T) {
        if x >= self.width {
            return;
        }
        let end = z_end.min(self.depth);
        for z in z_start..end {
            self.set(x, z, value.clone());
        }
    }

}

impl Grid<bool> {
    /// Cell-wise union with another mask of the same shape.
    pub fn union(&mut self, other: &Grid<bool>) {
        for (x, z, v) in other.iter() {
            if *v {
                self.set(x, z, true);
            }
        }
    }

    /// Cell-wise intersection with another mask of the same shape.
    pub fn intersect(&mut self, other: &Grid<bool>) {
        for (x, z, v) in self.iter_mut() {
            *v = *v && *other.get(x, z);
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|v| *v)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Grid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Grid {}x{}", self.width, self.depth)?;
        for x in 0..self.width {
            for z in 0..self.depth {
                write!(f, "{:?} ", self.data[x * self.depth + z])?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set() {
        let mut g = Grid::new_with(4, 3, 0i32);
        g.set(3, 2, 7);
        assert_eq!(*g.get(3, 2), 7);
        assert_eq!(*g.get(0, 0), 0);
    }

    #[test]
    fn test_iter_coordinates() {
        let mut g = Grid::new_with(2, 3, 0i32);
        for (x, z, v) in g.iter_mut() {
            *v = (x * 10 + z) as i32;
        }
        assert_eq!(*g.get(1, 2), 12);
        let collected: Vec<_> = g.iter().map(|(x, z, &v)| (x, z, v)).collect();
        assert_eq!(collected.len(), 6);
        assert!(collected.contains(&(0, 1, 1)));
    }

    #[test]
    fn test_span_clips_to_depth() {
        let mut g = Grid::new_with(2, 4, false);
        g.set_span(1, 2, 10, true);
        assert_eq!(g.count(), 2);
        assert!(*g.get(1, 2) && *g.get(1, 3));
    }

    #[test]
    fn test_mask_union_intersect() {
        let mut a = Grid::new_with(2, 2, false);
        let mut b = Grid::new_with(2, 2, false);
        a.set(0, 0, true);
        b.set(0, 0, true);
        b.set(1, 1, true);
        let mut u = a.clone();
        u.union(&b);
        assert_eq!(u.count(), 2);
        a.intersect(&b);
        assert_eq!(a.count(), 1);
    }
}
