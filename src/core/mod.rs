pub mod types;

pub use types::{Point, Rect, Viewport};
