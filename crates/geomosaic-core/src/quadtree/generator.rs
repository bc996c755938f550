//! Quad-tree generation over a finished image.
//!
//! # Architecture
//!
//! The tree covers a square of side `tile_size << max_level` anchored at the
//! image origin. Leaves read their region of the source at full resolution;
//! every interior node assembles its children into a `2·tile` canvas and
//! box-filters it down to one tile. Subtrees are built in parallel and each
//! node's tile is written as soon as it exists.
//!
//! ## States
//! 1. Unconfigured: tile size, file type or format missing
//! 2. Configured: ready to generate
//! 3. Generating
//! 4. Complete: any setter returns to Configured

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::info;

use super::layout::{TreeFormat, TreeInfo};
use super::node::{child_position, TileNode, QUADRANTS};
use crate::bbox::PixelBox;
use crate::composite::ImageComposite;
use crate::error::{MosaicError, Result};
use crate::progress::{ProgressCallback, SubProgress};
use crate::raster::{ChannelType, Raster};
use crate::writer::TileWriter;

/// An image the generator can cut into tiles. Reads may come from several
/// threads at once.
pub trait TileSource: Sync {
    fn cols(&self) -> u32;
    fn rows(&self) -> u32;
    fn bands(&self) -> usize;
    fn channel(&self) -> ChannelType;
    /// Pixels of `region`; anything outside the image is transparent.
    fn read_region(&self, region: &PixelBox) -> Raster;
}

impl TileSource for Raster {
    fn cols(&self) -> u32 {
        self.width
    }

    fn rows(&self) -> u32 {
        self.height
    }

    fn bands(&self) -> usize {
        self.bands
    }

    fn channel(&self) -> ChannelType {
        self.channel
    }

    fn read_region(&self, region: &PixelBox) -> Raster {
        let mut out = Raster::new(
            region.width().max(0) as u32,
            region.height().max(0) as u32,
            self.bands,
            self.channel,
        );
        let image = PixelBox::new(0, 0, self.width as i64, self.height as i64);
        let Some(overlap) = region.intersection(&image) else {
            return out;
        };
        for y in overlap.min_y..overlap.max_y {
            for x in overlap.min_x..overlap.max_x {
                let src = self.pixel(x as u32, y as u32);
                out.pixel_mut((x - region.min_x) as u32, (y - region.min_y) as u32)
                    .copy_from_slice(src);
            }
        }
        out
    }
}

impl TileSource for ImageComposite {
    fn cols(&self) -> u32 {
        ImageComposite::cols(self)
    }

    fn rows(&self) -> u32 {
        ImageComposite::rows(self)
    }

    fn bands(&self) -> usize {
        ImageComposite::bands(self)
    }

    fn channel(&self) -> ChannelType {
        ImageComposite::channel(self)
    }

    fn read_region(&self, region: &PixelBox) -> Raster {
        ImageComposite::read_region(self, region)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorState {
    Unconfigured,
    Configured,
    Generating,
    Complete,
}

/// Smallest level at which `tile_size << level` covers `extent` pixels.
pub fn max_level_for(extent: u32, tile_size: u32) -> u32 {
    let mut level = 0;
    while (tile_size as u64) << level < extent as u64 {
        level += 1;
    }
    level
}

pub struct QuadTreeGenerator<'a> {
    source: &'a dyn TileSource,
    name: PathBuf,
    tile_size: Option<u32>,
    file_type: Option<String>,
    format: Option<TreeFormat>,
    crop_bbox: Option<PixelBox>,
    state: GeneratorState,
}

impl<'a> QuadTreeGenerator<'a> {
    /// Tiles are written below `name`.
    pub fn new(source: &'a dyn TileSource, name: impl Into<PathBuf>) -> Self {
        Self {
            source,
            name: name.into(),
            tile_size: None,
            file_type: None,
            format: None,
            crop_bbox: None,
            state: GeneratorState::Unconfigured,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GeneratorState {
        self.state
    }

    /// Tile naming and metadata layout, once set.
    pub fn format(&self) -> Option<&TreeFormat> {
        self.format.as_ref()
    }

    /// Tile edge in pixels, once set.
    pub fn tile_size(&self) -> Option<u32> {
        self.tile_size
    }

    /// Tile edge in pixels; zero leaves the generator unconfigured.
    pub fn set_tile_size(&mut self, tile_size: u32) {
        self.tile_size = (tile_size > 0).then_some(tile_size);
        self.refresh_state();
    }

    /// Tile encoding, as a file extension (`png`, `jpg`).
    pub fn set_file_type(&mut self, file_type: impl Into<String>) {
        let file_type = file_type.into();
        self.file_type = (!file_type.is_empty()).then_some(file_type);
        self.refresh_state();
    }

    /// Restrict generation to nodes intersecting `bbox` (image pixels).
    pub fn set_crop_bbox(&mut self, bbox: PixelBox) {
        self.crop_bbox = Some(bbox);
        self.refresh_state();
    }

    /// Naming and metadata; normally set by `OutputModeConfig::stamp`.
    pub fn set_format(&mut self, format: TreeFormat) {
        self.format = Some(format);
        self.refresh_state();
    }

    fn refresh_state(&mut self) {
        let ready = self.tile_size.is_some() && self.file_type.is_some() && self.format.is_some();
        self.state = if ready {
            GeneratorState::Configured
        } else {
            GeneratorState::Unconfigured
        };
    }

    /// Deepest level of the tree, once the tile size is known.
    pub fn max_level(&self) -> Option<u32> {
        let tile = self.tile_size?;
        Some(max_level_for(self.source.cols().max(self.source.rows()), tile))
    }

    /// Build and write every tile, then the format's metadata files.
    pub fn generate(
        &mut self,
        writer: &dyn TileWriter,
        progress: &dyn ProgressCallback,
    ) -> Result<TileNode> {
        if self.state != GeneratorState::Configured {
            return Err(MosaicError::config(format!(
                "quad-tree generator cannot start while {:?}",
                self.state
            )));
        }
        let (Some(tile_size), Some(file_type), Some(format)) =
            (self.tile_size, self.file_type.clone(), self.format.clone())
        else {
            return Err(MosaicError::config("quad-tree generator is not configured"));
        };

        let (cols, rows) = (self.source.cols(), self.source.rows());
        let image = PixelBox::new(0, 0, cols as i64, rows as i64);
        let crop = self.crop_bbox.map_or(image, |c| c.crop(&image));
        if image.is_empty() || crop.is_empty() {
            return Err(MosaicError::EmptyOutput);
        }

        let max_level = max_level_for(cols.max(rows), tile_size);
        let tree = TreeInfo {
            name: self.name.clone(),
            file_type,
            tile_size,
            max_level,
            cols,
            rows,
        };
        let tree_size = (tile_size as i64) << max_level;
        info!(
            name = %self.name.display(),
            mode = %format.mode,
            cols,
            rows,
            tile_size,
            max_level,
            "Generating quad-tree"
        );

        self.state = GeneratorState::Generating;
        let progress = SubProgress::new(progress, 0.0, 1.0);
        let builder = TreeBuilder {
            source: self.source,
            writer,
            format: &format,
            tree: &tree,
            crop,
            total_leaves: leaves_intersecting(&crop, tile_size as i64),
            leaves_done: AtomicUsize::new(0),
            progress: &progress,
        };

        let built = builder
            .build(0, String::new(), 0, 0, PixelBox::new(0, 0, tree_size, tree_size))
            .and_then(|root| root.ok_or(MosaicError::EmptyOutput))
            .and_then(|(root, _)| {
                format.write_metadata(&tree, &root, writer)?;
                Ok(root)
            });

        match built {
            Ok(root) => {
                progress.report(1.0);
                info!(tiles = root.count(), "Quad-tree complete");
                self.state = GeneratorState::Complete;
                Ok(root)
            }
            Err(e) => {
                self.state = GeneratorState::Configured;
                Err(e)
            }
        }
    }
}

fn leaves_intersecting(crop: &PixelBox, tile: i64) -> usize {
    let cols = (crop.max_x + tile - 1) / tile - crop.min_x / tile;
    let rows = (crop.max_y + tile - 1) / tile - crop.min_y / tile;
    (cols.max(0) * rows.max(0)) as usize
}

struct TreeBuilder<'b> {
    source: &'b dyn TileSource,
    writer: &'b dyn TileWriter,
    format: &'b TreeFormat,
    tree: &'b TreeInfo,
    crop: PixelBox,
    total_leaves: usize,
    leaves_done: AtomicUsize,
    progress: &'b dyn ProgressCallback,
}

impl TreeBuilder<'_> {
    fn build(
        &self,
        level: u32,
        path: String,
        x: u32,
        y: u32,
        bbox: PixelBox,
    ) -> Result<Option<(TileNode, Raster)>> {
        if bbox.intersection(&self.crop).is_none() {
            return Ok(None);
        }

        let (image, children) = if level == self.tree.max_level {
            let tile = self.source.read_region(&bbox);
            let done = self.leaves_done.fetch_add(1, Ordering::Relaxed) + 1;
            self.progress
                .report(done as f64 / self.total_leaves.max(1) as f64);
            (tile, Vec::new())
        } else {
            let half = bbox.width() / 2;
            let built = (0..4usize)
                .into_par_iter()
                .map(|q| {
                    let (cx, cy) = child_position(x, y, q);
                    let child = PixelBox::new(
                        bbox.min_x + (q & 1) as i64 * half,
                        bbox.min_y + (q >> 1) as i64 * half,
                        half,
                        half,
                    );
                    self.build(level + 1, format!("{path}{}", QUADRANTS[q]), cx, cy, child)
                })
                .collect::<Result<Vec<_>>>()?;

            let tile = self.tree.tile_size;
            let mut canvas =
                Raster::new(2 * tile, 2 * tile, self.source.bands(), self.source.channel());
            let mut children = Vec::new();
            for (q, child) in built.into_iter().enumerate() {
                if let Some((node, image)) = child {
                    blit(&mut canvas, &image, (q as u32 & 1) * tile, (q as u32 >> 1) * tile);
                    children.push(node);
                }
            }
            (downsample(&canvas), children)
        };

        let node = TileNode {
            level,
            path,
            x,
            y,
            bbox,
            children,
        };
        self.writer
            .write_tile(&self.format.tile_path(self.tree, &node), &image)?;
        Ok(Some((node, image)))
    }
}

fn blit(dst: &mut Raster, src: &Raster, x0: u32, y0: u32) {
    for y in 0..src.height {
        for x in 0..src.width {
            dst.pixel_mut(x0 + x, y0 + y).copy_from_slice(src.pixel(x, y));
        }
    }
}

/// Halve both dimensions with a 2x2 box filter on alpha-weighted colour.
pub(crate) fn downsample(src: &Raster) -> Raster {
    let (w, h) = (src.width / 2, src.height / 2);
    let bands = src.bands;
    let channel = src.channel;
    let mut out = Raster::new(w, h, bands, channel);
    let mut colour = vec![0.0f32; bands];
    for y in 0..h {
        for x in 0..w {
            colour.fill(0.0);
            let mut alpha = 0.0f32;
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let px = src.pixel(2 * x + dx, 2 * y + dy);
                let a = px[bands];
                for i in 0..bands {
                    colour[i] += px[i] * a;
                }
                alpha += a;
            }
            if alpha <= 0.0 {
                continue;
            }
            let dst = out.pixel_mut(x, y);
            for i in 0..bands {
                dst[i] = channel.clamp(colour[i] / alpha);
            }
            dst[bands] = channel.clamp(alpha / 4.0);
        }
    }
    out
}
