//! Tile naming and metadata files for each output format.
//!
//! # Naming
//!
//! | Mode            | Tile path                                 |
//! |-----------------|-------------------------------------------|
//! | None, KML, Gigapan | `<name>/<path>.<ext>` (root: `root`)   |
//! | TMS             | `<name>/<level>/<x>/<flipped y>.<ext>`    |
//! | GMap            | `<name>/<level>/<x>/<y>.<ext>`            |
//! | Uniview         | `<name>/<level>/<y>/<x>.<ext>`            |
//! | Celestia        | `<name>/level<level>/tx_<x>_<y>.<ext>`    |

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use super::mode::OutputMode;
use super::node::TileNode;
use crate::bbox::{LonLatBox, PixelBox};
use crate::error::{MosaicError, Result};
use crate::writer::TileWriter;

/// File stem of the root tile in path-named layouts.
const ROOT_STEM: &str = "root";

/// Naming scheme and metadata stamped onto a generator by an output mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TreeFormat {
    pub mode: OutputMode,
    /// Extent of the tiled image in degrees.
    pub longlat_bbox: Option<LonLatBox>,
    pub max_lod_pixels: Option<i32>,
    pub draw_order_offset: u32,
    pub terrain: bool,
    pub module: Option<String>,
}

/// Geometry of one generated tree.
#[derive(Debug, Clone)]
pub struct TreeInfo {
    pub name: PathBuf,
    pub file_type: String,
    pub tile_size: u32,
    pub max_level: u32,
    /// Size of the tiled image in pixels.
    pub cols: u32,
    pub rows: u32,
}

impl TreeInfo {
    /// Last component of the output name.
    fn stem(&self) -> String {
        self.name
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| ROOT_STEM.to_string())
    }

    /// A file next to the output directory.
    fn sibling(&self, file_name: String) -> PathBuf {
        self.name.with_file_name(file_name)
    }
}

fn node_stem(node: &TileNode) -> &str {
    if node.path.is_empty() {
        ROOT_STEM
    } else {
        &node.path
    }
}

impl TreeFormat {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn tile_path(&self, tree: &TreeInfo, node: &TileNode) -> PathBuf {
        let ext = &tree.file_type;
        let (level, x, y) = (node.level, node.x, node.y);
        match self.mode {
            OutputMode::None | OutputMode::Kml | OutputMode::Gigapan => {
                tree.name.join(format!("{}.{ext}", node_stem(node)))
            }
            OutputMode::Tms => {
                let flipped = (1u32 << level) - 1 - y;
                tree.name
                    .join(level.to_string())
                    .join(x.to_string())
                    .join(format!("{flipped}.{ext}"))
            }
            OutputMode::GMap => tree
                .name
                .join(level.to_string())
                .join(x.to_string())
                .join(format!("{y}.{ext}")),
            OutputMode::Uniview => tree
                .name
                .join(level.to_string())
                .join(y.to_string())
                .join(format!("{x}.{ext}")),
            OutputMode::Celestia => tree
                .name
                .join(format!("level{level}"))
                .join(format!("tx_{x}_{y}.{ext}")),
        }
    }

    /// Write the format's side files for a finished tree.
    pub fn write_metadata(
        &self,
        tree: &TreeInfo,
        root: &TileNode,
        writer: &dyn TileWriter,
    ) -> Result<()> {
        match self.mode {
            OutputMode::None | OutputMode::GMap => Ok(()),
            OutputMode::Kml => self.write_kml(tree, root, writer),
            OutputMode::Tms => writer.write_metadata(
                &tree.name.join("tilemapresource.xml"),
                &tile_map_resource(tree),
            ),
            OutputMode::Uniview => {
                let module = self.require_module()?;
                writer.write_metadata(
                    &tree.sibling(format!("{module}.conf")),
                    &uniview_conf(tree, module, self.terrain),
                )
            }
            OutputMode::Celestia => {
                let module = self.require_module()?;
                writer.write_metadata(
                    &tree.sibling(format!("{module}.ctx")),
                    &celestia_ctx(tree),
                )
            }
            OutputMode::Gigapan => {
                let bbox = self.require_bbox()?;
                writer.write_metadata(
                    &tree.sibling(format!("{}.json", tree.stem())),
                    &gigapan_json(tree, bbox)?,
                )
            }
        }
    }

    fn require_module(&self) -> Result<&str> {
        self.module.as_deref().ok_or_else(|| {
            MosaicError::config(format!("{} output requires a module name", self.mode))
        })
    }

    fn require_bbox(&self) -> Result<LonLatBox> {
        self.longlat_bbox.ok_or_else(|| {
            MosaicError::config(format!("{} output requires a lon/lat bbox", self.mode))
        })
    }

    fn write_kml(&self, tree: &TreeInfo, root: &TileNode, writer: &dyn TileWriter) -> Result<()> {
        let bbox = self.require_bbox()?;
        let max_lod = self.max_lod_pixels.unwrap_or(-1);
        for node in root.iter() {
            let doc = kml_node(tree, node, bbox, max_lod, self.draw_order_offset);
            writer.write_metadata(&tree.name.join(format!("{}.kml", node_stem(node))), &doc)?;
        }
        writer.write_metadata(
            &tree.sibling(format!("{}.kml", tree.stem())),
            &kml_root(tree, root, bbox),
        )
    }
}

/// Degrees covered by a node, mapped linearly from image pixels.
pub fn node_longlat(bbox: &LonLatBox, node: &PixelBox, cols: u32, rows: u32) -> LonLatBox {
    let (cols, rows) = (cols as f64, rows as f64);
    LonLatBox {
        west: bbox.west + bbox.width() * node.min_x as f64 / cols,
        east: bbox.west + bbox.width() * node.max_x as f64 / cols,
        north: bbox.north - bbox.height() * node.min_y as f64 / rows,
        south: bbox.north - bbox.height() * node.max_y as f64 / rows,
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn kml_box(tag: &str, b: &LonLatBox, indent: &str) -> String {
    format!(
        "{indent}<{tag}><north>{}</north><south>{}</south><east>{}</east><west>{}</west></{tag}>\n",
        b.north, b.south, b.east, b.west
    )
}

fn kml_region(b: &LonLatBox, min_lod: i64, max_lod: i64, indent: &str) -> String {
    let mut s = format!("{indent}<Region>\n");
    s += &kml_box("LatLonAltBox", b, &format!("{indent}  "));
    let _ = writeln!(
        s,
        "{indent}  <Lod><minLodPixels>{min_lod}</minLodPixels><maxLodPixels>{max_lod}</maxLodPixels></Lod>"
    );
    let _ = writeln!(s, "{indent}</Region>");
    s
}

fn kml_node(
    tree: &TreeInfo,
    node: &TileNode,
    bbox: LonLatBox,
    max_lod: i32,
    draw_order_offset: u32,
) -> String {
    let min_lod = (tree.tile_size / 2) as i64;
    let own_max = if node.is_leaf() { -1 } else { max_lod as i64 };
    let ll = node_longlat(&bbox, &node.bbox, tree.cols, tree.rows);

    let mut s = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    s += "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n";
    s += &kml_region(&ll, min_lod, own_max, "  ");
    for child in &node.children {
        let child_ll = node_longlat(&bbox, &child.bbox, tree.cols, tree.rows);
        s += "  <NetworkLink>\n";
        let _ = writeln!(s, "    <name>{}</name>", child.path);
        s += &kml_region(&child_ll, min_lod, -1, "    ");
        let _ = writeln!(
            s,
            "    <Link><href>{}.kml</href><viewRefreshMode>onRegion</viewRefreshMode></Link>",
            node_stem(child)
        );
        s += "  </NetworkLink>\n";
    }
    s += "  <GroundOverlay>\n";
    let _ = writeln!(
        s,
        "    <drawOrder>{}</drawOrder>",
        node.level + draw_order_offset
    );
    let _ = writeln!(
        s,
        "    <Icon><href>{}.{}</href></Icon>",
        node_stem(node),
        tree.file_type
    );
    s += &kml_box("LatLonBox", &ll, "    ");
    s += "  </GroundOverlay>\n</Document>\n</kml>\n";
    s
}

fn kml_root(tree: &TreeInfo, root: &TileNode, bbox: LonLatBox) -> String {
    let stem = xml_escape(&tree.stem());
    let ll = node_longlat(&bbox, &root.bbox, tree.cols, tree.rows);
    let mut s = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    s += "<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n";
    let _ = writeln!(s, "  <name>{stem}</name>");
    s += "  <NetworkLink>\n";
    let _ = writeln!(s, "    <name>{stem}</name>");
    s += &kml_region(&ll, 1, -1, "    ");
    let _ = writeln!(
        s,
        "    <Link><href>{stem}/{ROOT_STEM}.kml</href><viewRefreshMode>onRegion</viewRefreshMode></Link>"
    );
    s += "  </NetworkLink>\n</Document>\n</kml>\n";
    s
}

fn mime_type(file_type: &str) -> &'static str {
    match file_type.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        _ => "image/png",
    }
}

fn tile_map_resource(tree: &TreeInfo) -> String {
    let mut s = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    s += "<TileMap version=\"1.0.0\" tilemapservice=\"http://tms.osgeo.org/1.0.0\">\n";
    let _ = writeln!(s, "  <Title>{}</Title>", xml_escape(&tree.stem()));
    s += "  <SRS>EPSG:4326</SRS>\n";
    let _ = writeln!(
        s,
        "  <TileFormat width=\"{0}\" height=\"{0}\" mime-type=\"{1}\" extension=\"{2}\"/>",
        tree.tile_size,
        mime_type(&tree.file_type),
        xml_escape(&tree.file_type)
    );
    s += "  <TileSets>\n";
    for level in 0..=tree.max_level {
        // Image pixels per tile pixel at this level.
        let units = 1u64 << (tree.max_level - level);
        let _ = writeln!(
            s,
            "    <TileSet href=\"{level}\" units-per-pixel=\"{units}\" order=\"{level}\"/>"
        );
    }
    s += "  </TileSets>\n</TileMap>\n";
    s
}

fn uniview_conf(tree: &TreeInfo, module: &str, terrain: bool) -> String {
    format!(
        "[Module]\nname = {module}\ntexture = {}\nlevels = {}\ntile_size = {}\nfile_type = {}\nterrain = {terrain}\n",
        tree.stem(),
        tree.max_level + 1,
        tree.tile_size,
        tree.file_type,
    )
}

fn celestia_ctx(tree: &TreeInfo) -> String {
    format!(
        "VirtualTexture\n{{\n        ImageDirectory \"{}\"\n        BaseSplit 0\n        TileSize {}\n        TileType \"{}\"\n}}\n",
        tree.stem(),
        tree.tile_size,
        tree.file_type
    )
}

#[derive(Serialize)]
struct GigapanDescriptor<'a> {
    name: String,
    width: u32,
    height: u32,
    tile_size: u32,
    levels: u32,
    file_type: &'a str,
    bbox: LonLatBox,
}

fn gigapan_json(tree: &TreeInfo, bbox: LonLatBox) -> Result<String> {
    let descriptor = GigapanDescriptor {
        name: tree.stem(),
        width: tree.cols,
        height: tree.rows,
        tile_size: tree.tile_size,
        levels: tree.max_level + 1,
        file_type: &tree.file_type,
        bbox,
    };
    serde_json::to_string_pretty(&descriptor)
        .map_err(|e| MosaicError::Codec(format!("gigapan descriptor: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::MemoryTileWriter;

    fn tree() -> TreeInfo {
        TreeInfo {
            name: PathBuf::from("out/world"),
            file_type: "png".to_string(),
            tile_size: 256,
            max_level: 2,
            cols: 1024,
            rows: 1024,
        }
    }

    fn node(level: u32, path: &str, x: u32, y: u32) -> TileNode {
        let side = 1024 >> level;
        TileNode {
            level,
            path: path.to_string(),
            x,
            y,
            bbox: PixelBox::new(x as i64 * side, y as i64 * side, side, side),
            children: vec![],
        }
    }

    fn path_of(mode: OutputMode, n: &TileNode) -> String {
        TreeFormat::new(mode)
            .tile_path(&tree(), n)
            .to_string_lossy()
            .replace('\\', "/")
    }

    #[test]
    fn test_tile_paths_per_mode() {
        let n = node(2, "12", 3, 0);
        assert_eq!(path_of(OutputMode::None, &n), "out/world/12.png");
        assert_eq!(path_of(OutputMode::Kml, &n), "out/world/12.png");
        assert_eq!(path_of(OutputMode::Tms, &n), "out/world/2/3/3.png");
        assert_eq!(path_of(OutputMode::GMap, &n), "out/world/2/3/0.png");
        assert_eq!(path_of(OutputMode::Uniview, &n), "out/world/2/0/3.png");
        assert_eq!(path_of(OutputMode::Celestia, &n), "out/world/level2/tx_3_0.png");
    }

    #[test]
    fn test_root_tile_name() {
        let root = node(0, "", 0, 0);
        assert_eq!(path_of(OutputMode::Gigapan, &root), "out/world/root.png");
        assert_eq!(path_of(OutputMode::Tms, &root), "out/world/0/0/0.png");
    }

    #[test]
    fn test_node_longlat() {
        let bbox = LonLatBox::new(-180.0, -180.0, 180.0, 180.0);
        let ll = node_longlat(&bbox, &PixelBox::new(0, 256, 512, 256), 1024, 1024);
        assert_eq!(ll, LonLatBox::new(-180.0, 0.0, 0.0, 90.0));
    }

    #[test]
    fn test_kml_metadata() {
        let mut root = node(0, "", 0, 0);
        let mut child = node(1, "1", 1, 0);
        child.children = vec![node(2, "13", 3, 1)];
        root.children = vec![child];

        let format = TreeFormat {
            longlat_bbox: Some(LonLatBox::new(-180.0, -180.0, 180.0, 180.0)),
            max_lod_pixels: Some(1024),
            draw_order_offset: 10,
            ..TreeFormat::new(OutputMode::Kml)
        };
        let writer = MemoryTileWriter::new();
        format.write_metadata(&tree(), &root, &writer).unwrap();

        let paths: Vec<String> = writer
            .metadata_paths()
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            paths,
            vec!["out/world/1.kml", "out/world/13.kml", "out/world/root.kml", "out/world.kml"]
        );

        let top = writer.metadata("out/world/root.kml").unwrap();
        assert!(top.contains("<drawOrder>10</drawOrder>"));
        assert!(top.contains("<href>1.kml</href>"));
        assert!(top.contains("<href>root.png</href>"));
        assert!(top.contains("<maxLodPixels>1024</maxLodPixels>"));

        let leaf = writer.metadata("out/world/13.kml").unwrap();
        assert!(leaf.contains("<drawOrder>12</drawOrder>"));
        assert!(leaf.contains("<maxLodPixels>-1</maxLodPixels>"));
        assert!(!leaf.contains("<NetworkLink>"));

        let entry = writer.metadata("out/world.kml").unwrap();
        assert!(entry.contains("<href>world/root.kml</href>"));
    }

    #[test]
    fn test_kml_without_bbox_fails() {
        let writer = MemoryTileWriter::new();
        let err = TreeFormat::new(OutputMode::Kml)
            .write_metadata(&tree(), &node(0, "", 0, 0), &writer)
            .unwrap_err();
        assert!(matches!(err, MosaicError::Configuration(_)));
    }

    #[test]
    fn test_side_files() {
        let root = node(0, "", 0, 0);
        let writer = MemoryTileWriter::new();

        TreeFormat::new(OutputMode::Tms)
            .write_metadata(&tree(), &root, &writer)
            .unwrap();
        let xml = writer.metadata("out/world/tilemapresource.xml").unwrap();
        assert!(xml.contains("<TileSet href=\"2\" units-per-pixel=\"1\" order=\"2\"/>"));
        assert!(xml.contains("units-per-pixel=\"4\""));

        let uniview = TreeFormat {
            terrain: true,
            module: Some("earth".to_string()),
            ..TreeFormat::new(OutputMode::Uniview)
        };
        uniview.write_metadata(&tree(), &root, &writer).unwrap();
        let conf = writer.metadata("out/earth.conf").unwrap();
        assert!(conf.contains("terrain = true"));
        assert!(conf.contains("levels = 3"));

        let celestia = TreeFormat {
            module: Some("moon".to_string()),
            ..TreeFormat::new(OutputMode::Celestia)
        };
        celestia.write_metadata(&tree(), &root, &writer).unwrap();
        assert!(writer
            .metadata("out/moon.ctx")
            .unwrap()
            .contains("ImageDirectory \"world\""));

        let gigapan = TreeFormat {
            longlat_bbox: Some(LonLatBox::new(-10.0, -5.0, 10.0, 5.0)),
            ..TreeFormat::new(OutputMode::Gigapan)
        };
        gigapan.write_metadata(&tree(), &root, &writer).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&writer.metadata("out/world.json").unwrap()).unwrap();
        assert_eq!(json["levels"], 3);
        assert_eq!(json["bbox"]["west"], -10.0);
    }

    #[test]
    fn test_gmap_and_none_write_nothing() {
        let writer = MemoryTileWriter::new();
        for mode in [OutputMode::None, OutputMode::GMap] {
            TreeFormat::new(mode)
                .write_metadata(&tree(), &node(0, "", 0, 0), &writer)
                .unwrap();
        }
        assert!(writer.metadata_paths().is_empty());
    }
}
