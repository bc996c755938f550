//! Nodes of a generated tile tree.

use serde::Serialize;

use crate::bbox::PixelBox;

/// Quadrant digits in child order: top-left, top-right, bottom-left,
/// bottom-right.
pub const QUADRANTS: [char; 4] = ['0', '1', '2', '3'];

/// One tile of the tree.
///
/// `bbox` is in image pixels and may extend past the image; `x` and `y`
/// are the tile's grid position within its level. Children that would not
/// contain any data are omitted, so an interior node has 1 to 4 children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileNode {
    pub level: u32,
    pub path: String,
    pub x: u32,
    pub y: u32,
    pub bbox: PixelBox,
    pub children: Vec<TileNode>,
}

impl TileNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Number of nodes in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TileNode::count).sum::<usize>()
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(TileNode::leaf_count).sum()
        }
    }

    /// Deepest level below (or at) this node.
    pub fn max_level(&self) -> u32 {
        self.children
            .iter()
            .map(TileNode::max_level)
            .max()
            .unwrap_or(self.level)
    }

    /// Depth-first, parents before children.
    pub fn iter(&self) -> impl Iterator<Item = &TileNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }

    pub fn find(&self, path: &str) -> Option<&TileNode> {
        let rest = path.strip_prefix(self.path.as_str())?;
        let Some(digit) = rest.chars().next() else {
            return Some(self);
        };
        let child_path = format!("{}{digit}", self.path);
        self.children
            .iter()
            .find(|c| c.path == child_path)
            .and_then(|c| c.find(path))
    }
}

/// Grid position of the child in quadrant `digit` of a node at `(x, y)`.
pub(crate) fn child_position(x: u32, y: u32, quadrant: usize) -> (u32, u32) {
    (2 * x + (quadrant as u32 & 1), 2 * y + (quadrant as u32 >> 1))
}
