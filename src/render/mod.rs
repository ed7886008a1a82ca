mod frame;
mod palette;

pub use frame::{ascii_snapshot, Frame};
pub use palette::{Palette, Rgba};
