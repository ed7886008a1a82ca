use crate::config::{ACTIVE_COLORS, BASE_COLOR};
use crate::simulation::StateId;

/// One RGBA8 pixel.
///
/// Layout: 4 bytes, so a pixel slice casts straight to bytes for upload or
/// encoding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl From<[u8; 4]> for Rgba {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}

/// Display color per state id
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    colors: Vec<Rgba>,
}

impl Palette {
    /// Use the given colors; ids past the end wrap around. An empty list
    /// falls back to the base color.
    pub fn new(colors: Vec<Rgba>) -> Self {
        if colors.is_empty() {
            return Self {
                colors: vec![BASE_COLOR.into()],
            };
        }
        Self { colors }
    }

    /// White background followed by the fixed active colors, cycled.
    pub fn for_states(state_count: usize) -> Self {
        let colors = std::iter::once(BASE_COLOR.into())
            .chain(
                ACTIVE_COLORS
                    .iter()
                    .cycle()
                    .take(state_count.saturating_sub(1))
                    .map(|&c| Rgba::from(c)),
            )
            .collect();
        Self { colors }
    }

    pub fn color_count(&self) -> usize {
        self.colors.len()
    }

    pub fn color(&self, id: StateId) -> Rgba {
        self.colors[id as usize % self.colors.len()]
    }

    pub fn set_color(&mut self, id: StateId, color: Rgba) {
        if let Some(slot) = self.colors.get_mut(id as usize) {
            *slot = color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_size() {
        assert_eq!(std::mem::size_of::<Rgba>(), 4);
    }

    #[test]
    fn test_palette_for_states() {
        let palette = Palette::for_states(4);
        assert_eq!(palette.color_count(), 4);
        assert_eq!(palette.color(0), Rgba::from(BASE_COLOR));
        assert_eq!(palette.color(1), Rgba::from(ACTIVE_COLORS[0]));
        assert_eq!(palette.color(4), palette.color(0), "ids wrap around");

        let many = Palette::for_states(ACTIVE_COLORS.len() + 3);
        assert_eq!(many.color(ACTIVE_COLORS.len() as StateId + 1), many.color(1));
    }

    #[test]
    fn test_set_color() {
        let mut palette = Palette::new(Vec::new());
        assert_eq!(palette.color_count(), 1);
        palette.set_color(0, Rgba::new(1, 2, 3, 4));
        palette.set_color(9, Rgba::new(9, 9, 9, 9));
        assert_eq!(palette.color(0), Rgba::new(1, 2, 3, 4));
    }
}
