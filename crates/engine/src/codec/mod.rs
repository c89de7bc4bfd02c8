pub mod bit_array;
pub mod nbt;
pub mod palette;
pub mod snbt;

pub use bit_array::{BitPackedArray, PackingFormat};
pub use palette::{PaletteKind, PalettedContainer};
