use crate::simulation::{Grid, BASE_STATE};

use super::palette::{Palette, Rgba};

/// CPU-side RGBA image of a grid, one pixel per cell.
///
/// Kept in sync incrementally: only cells the grid reports as changed get
/// repainted.
#[derive(Debug, Clone)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgba>,
}

impl Frame {
    /// Blank frame filled with `background`
    pub fn new(width: usize, height: usize, background: Rgba) -> Self {
        Self {
            width,
            height,
            pixels: vec![background; width * height],
        }
    }

    /// Fully painted frame for the grid's current cells.
    pub fn for_grid(grid: &mut Grid, palette: &Palette) -> Self {
        let mut frame = Self::new(grid.width(), grid.height(), palette.color(BASE_STATE));
        frame.redraw(grid, palette);
        frame
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<Rgba> {
        if x < self.width && y < self.height {
            Some(self.pixels[y * self.width + x])
        } else {
            None
        }
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Raw RGBA8 bytes, row-major
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    /// Repaint every cell and drop whatever the grid had queued.
    pub fn redraw(&mut self, grid: &mut Grid, palette: &Palette) {
        grid.take_pending_repaints();
        self.width = grid.width();
        self.height = grid.height();
        self.pixels.clear();
        self.pixels
            .extend(grid.states().iter().map(|&id| palette.color(id)));
    }

    /// Paint the cells that changed since the last repaint. Returns the
    /// number of pixels written.
    pub fn repaint(&mut self, grid: &mut Grid, palette: &Palette) -> usize {
        if self.width != grid.width() || self.height != grid.height() {
            self.redraw(grid, palette);
            return self.pixels.len();
        }

        let mut painted = 0;
        for (id, cells) in grid.take_pending_repaints().into_iter().enumerate() {
            let color = palette.color(id as u8);
            for (x, y) in cells {
                self.pixels[y * self.width + x] = color;
                painted += 1;
            }
        }
        painted
    }
}

/// Text snapshot of a grid: `.` for the base state, then `1`-`9`, `a`-`z`,
/// `A`-`Z`, and `#` for anything beyond.
pub fn ascii_snapshot(grid: &Grid) -> String {
    const GLYPHS: &[u8] = b".123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

    let mut out = String::with_capacity((grid.width() + 1) * grid.height());
    for row in grid.states().chunks(grid.width()) {
        out.extend(
            row.iter()
                .map(|&id| GLYPHS.get(id as usize).map_or('#', |&g| g as char)),
        );
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{RuleSet, StateId};

    fn stable_grid(width: usize, height: usize, states: usize) -> Grid {
        let rule_sets = (0..states)
            .map(|id| RuleSet::stable(id as StateId, states).unwrap())
            .collect();
        Grid::new(width, height, rule_sets).unwrap()
    }

    #[test]
    fn test_repaint_only_touches_changed_cells() {
        let mut grid = stable_grid(4, 3, 3);
        let palette = Palette::for_states(3);
        let mut frame = Frame::for_grid(&mut grid, &palette);
        assert!(frame.pixels().iter().all(|&p| p == palette.color(0)));

        grid.set_one_cell(2, 1, 1).unwrap();
        grid.set_one_cell(1, 3, 2).unwrap();
        assert_eq!(frame.repaint(&mut grid, &palette), 2);
        assert_eq!(frame.pixel(1, 1), Some(palette.color(2)));
        assert_eq!(frame.pixel(3, 2), Some(palette.color(1)));
        assert_eq!(frame.pixel(0, 0), Some(palette.color(0)));
        assert_eq!(frame.pixel(4, 0), None);

        assert_eq!(frame.repaint(&mut grid, &palette), 0, "queue was drained");
    }

    #[test]
    fn test_size_mismatch_forces_redraw() {
        let mut small = stable_grid(2, 2, 2);
        let palette = Palette::for_states(2);
        let mut frame = Frame::for_grid(&mut small, &palette);

        let mut large = stable_grid(3, 5, 2);
        large.set_one_cell(1, 2, 4).unwrap();
        assert_eq!(frame.repaint(&mut large, &palette), 15);
        assert_eq!((frame.width(), frame.height()), (3, 5));
        assert_eq!(frame.pixel(2, 4), Some(palette.color(1)));
    }

    #[test]
    fn test_bytes_are_rgba_rows() {
        let mut grid = stable_grid(3, 2, 2);
        grid.set_one_cell(1, 0, 0).unwrap();
        let palette = Palette::new(vec![Rgba::new(0, 0, 0, 255), Rgba::new(10, 20, 30, 40)]);
        let frame = Frame::for_grid(&mut grid, &palette);
        let bytes = frame.as_bytes();
        assert_eq!(bytes.len(), 3 * 2 * 4);
        assert_eq!(&bytes[..8], &[10, 20, 30, 40, 0, 0, 0, 255]);
    }

    #[test]
    fn test_ascii_snapshot() {
        let mut grid = stable_grid(3, 2, 3);
        grid.set_one_cell(1, 0, 0).unwrap();
        grid.set_one_cell(2, 2, 1).unwrap();
        assert_eq!(ascii_snapshot(&grid), "1..\n..2\n");
    }
}
