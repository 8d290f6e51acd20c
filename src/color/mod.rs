//! Canvas colors: the native `#rrggbb` form, the compact 0–9 per-channel
//! form some reply dialects use, tolerant hex repair, and vivid palette
//! generation.

pub mod codec;
pub mod vivid;

pub use codec::{HexColor, colors_match, from_compact, normalize_hex, to_compact};
pub use vivid::{OVERUSED_HUES, vivid_color, vivid_palette};
