//! Composite of reprojected images on the shared output canvas.
//!
//! # Architecture
//!
//! The composite stores placements, not pixels. Reading a region walks the
//! layers in insertion order and samples each one that overlaps:
//!
//! - Draft mode: a later non-transparent pixel replaces what is below it
//! - Blend mode: colours are averaged weighted by alpha, alpha is the max
//!
//! [`ImageComposite::prepare`] fixes the view onto the canvas; after that
//! every coordinate the composite reports or accepts is view-relative.

use std::sync::Arc;

use tracing::debug;

use crate::bbox::PixelBox;
use crate::error::{MosaicError, Result};
use crate::progress::ProgressCallback;
use crate::raster::{ChannelType, Raster};
use crate::reproject::ReprojectedSource;

#[derive(Debug, Clone)]
struct Layer {
    source: Arc<ReprojectedSource>,
    x: i64,
    y: i64,
}

impl Layer {
    fn rect(&self) -> PixelBox {
        let bbox = self.source.bbox();
        PixelBox::new(self.x, self.y, bbox.width(), bbox.height())
    }
}

#[derive(Debug, Clone)]
pub struct ImageComposite {
    layers: Vec<Layer>,
    draft: bool,
    view: Option<PixelBox>,
    bands: usize,
    channel: ChannelType,
}

impl Default for ImageComposite {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageComposite {
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            draft: false,
            view: None,
            bands: 3,
            channel: ChannelType::U8,
        }
    }

    /// Place `source` with its local origin at canvas pixel `(x, y)`.
    ///
    /// The first insertion fixes the composite's band count and channel type.
    pub fn insert(&mut self, source: Arc<ReprojectedSource>, x: i64, y: i64) {
        if self.layers.is_empty() {
            self.bands = source.bands();
            self.channel = source.channel();
        }
        debug!(input = source.name(), x, y, "Composite insert");
        self.layers.push(Layer { source, x, y });
    }

    /// Insert `source` at its placement bbox, wrapping across the date line.
    ///
    /// A source reaching past `total_resolution` is also inserted one full
    /// turn to the left; a source starting inside the canvas is inserted at
    /// its own position. Returns the number of insertions (0, 1 or 2).
    pub fn insert_wrapped(
        &mut self,
        source: ReprojectedSource,
        total_resolution: i64,
        x_resolution: i64,
    ) -> usize {
        let bbox = source.bbox();
        let source = Arc::new(source);
        let mut count = 0;
        if bbox.max_x > total_resolution {
            self.insert(Arc::clone(&source), bbox.min_x - total_resolution, bbox.min_y);
            count += 1;
        }
        if bbox.min_x < x_resolution {
            self.insert(source, bbox.min_x, bbox.min_y);
            count += 1;
        }
        count
    }

    /// Number of placements, wrapped copies included.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True before the first insert.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Draft mode lets later layers overwrite earlier ones instead of blending.
    pub fn set_draft_mode(&mut self, draft: bool) {
        self.draft = draft;
    }

    /// Whether overlapping layers overwrite rather than blend.
    pub fn is_draft(&self) -> bool {
        self.draft
    }

    /// Colour bands of the rendered output.
    pub fn bands(&self) -> usize {
        self.bands
    }

    /// Sample type of the rendered output.
    pub fn channel(&self) -> ChannelType {
        self.channel
    }

    /// Union of every placement. Relative to the view once prepared.
    pub fn bbox(&self) -> PixelBox {
        let Some(first) = self.layers.first() else {
            return PixelBox::default();
        };
        let union = self
            .layers
            .iter()
            .skip(1)
            .fold(first.rect(), |acc, l| acc.union(&l.rect()));
        match self.view {
            Some(view) => union.translate(-view.min_x, -view.min_y),
            None => union,
        }
    }

    /// Fix the view onto the canvas.
    pub fn prepare(&mut self, bbox: PixelBox, progress: &dyn ProgressCallback) -> Result<()> {
        if bbox.is_empty() {
            return Err(MosaicError::EmptyOutput);
        }
        debug!(
            min_x = bbox.min_x,
            min_y = bbox.min_y,
            width = bbox.width(),
            height = bbox.height(),
            draft = self.draft,
            "Preparing composite"
        );
        self.view = Some(bbox);
        progress.report(1.0);
        Ok(())
    }

    pub fn cols(&self) -> u32 {
        match self.view {
            Some(view) => view.width() as u32,
            None => self.bbox().width().max(0) as u32,
        }
    }

    pub fn rows(&self) -> u32 {
        match self.view {
            Some(view) => view.height() as u32,
            None => self.bbox().height().max(0) as u32,
        }
    }

    /// Render `region` (view-relative once prepared). Pixels no layer
    /// covers are transparent.
    pub fn read_region(&self, region: &PixelBox) -> Raster {
        let width = region.width().max(0) as u32;
        let height = region.height().max(0) as u32;
        let mut out = Raster::new(width, height, self.bands, self.channel);
        if out.is_empty() {
            return out;
        }

        let (dx, dy) = self.view.map_or((0, 0), |v| (v.min_x, v.min_y));
        let canvas = region.translate(dx, dy);
        let bands = self.bands;
        let mut weights = if self.draft {
            Vec::new()
        } else {
            vec![0.0f32; width as usize * height as usize]
        };
        let mut sample = vec![0.0f32; bands + 1];

        for layer in &self.layers {
            let Some(overlap) = layer.rect().intersection(&canvas) else {
                continue;
            };
            for cy in overlap.min_y..overlap.max_y {
                for cx in overlap.min_x..overlap.max_x {
                    layer.source.sample_into(cx - layer.x, cy - layer.y, &mut sample);
                    let alpha = sample[bands];
                    if alpha <= 0.0 {
                        continue;
                    }
                    let (ox, oy) = ((cx - canvas.min_x) as u32, (cy - canvas.min_y) as u32);
                    let px = out.pixel_mut(ox, oy);
                    if self.draft {
                        px.copy_from_slice(&sample);
                    } else {
                        for i in 0..bands {
                            px[i] += sample[i] * alpha;
                        }
                        px[bands] = px[bands].max(alpha);
                        weights[oy as usize * width as usize + ox as usize] += alpha;
                    }
                }
            }
        }

        if !self.draft {
            for (px, &w) in out.pixels_mut().zip(&weights) {
                if w > 0.0 {
                    for v in px[..bands].iter_mut() {
                        *v /= w;
                    }
                }
            }
        }
        out
    }
}
