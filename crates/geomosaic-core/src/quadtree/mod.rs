//! Quad-tree tiling of a finished image into a target viewer's layout.
//!
//! # Tile Addressing
//!
//! - Level 0 is a single tile covering the whole tree
//! - Each level doubles the grid in both directions
//! - Quadrant digits: 0 top-left, 1 top-right, 2 bottom-left, 3 bottom-right
//! - A node's path is the string of quadrant digits from the root

mod generator;
mod layout;
mod mode;
mod node;

pub use generator::{max_level_for, GeneratorState, QuadTreeGenerator, TileSource};
pub use layout::{node_longlat, TreeFormat, TreeInfo};
pub use mode::{OutputMode, OutputModeConfig};
pub use node::{TileNode, QUADRANTS};
