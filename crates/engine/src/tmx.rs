//! Reader for Tiled `.tmx` maps.
//!
//! Only the layers the simulation needs are extracted: tile layers whose name
//! contains `collision` or `house` become solid tiles, and layers whose name
//! contains `bush` become the wild-encounter layer. Everything else (render
//! layers, tilesets, objects) is ignored. Hidden layers are skipped.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::tilemap::{Tilemap, TilemapError};

const COLLISION_LAYER_MARKERS: [&str; 2] = ["collision", "house"];
const ENCOUNTER_LAYER_MARKER: &str = "bush";

#[derive(Debug, Error)]
pub enum TmxError {
    #[error("failed to read map '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("map xml is malformed: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("root element is <{0}>, expected <map>")]
    NotAMap(String),
    #[error("<{element}> is missing attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    #[error("<{element}> attribute '{attribute}' is not a number: '{value}'")]
    InvalidNumber {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    #[error("layer '{layer}' uses unsupported encoding '{encoding}' (only csv is supported)")]
    UnsupportedEncoding { layer: String, encoding: String },
    #[error("layer '{layer}' has an invalid tile id '{value}'")]
    InvalidTileId { layer: String, value: String },
    #[error("layer '{layer}' has {actual} tiles, expected {expected}")]
    LayerSize {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Tilemap(#[from] TilemapError),
}

pub fn load_tmx_file(path: &Path) -> Result<Tilemap, TmxError> {
    let raw = fs::read_to_string(path).map_err(|source| TmxError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tmx(&raw)
}

pub fn parse_tmx(raw: &str) -> Result<Tilemap, TmxError> {
    let document = roxmltree::Document::parse(raw)?;
    let root = document.root_element();
    if !root.has_tag_name("map") {
        return Err(TmxError::NotAMap(root.tag_name().name().to_string()));
    }
    let width = parse_u32_attribute(root, "map", "width")?;
    let height = parse_u32_attribute(root, "map", "height")?;
    let tile_count = width as usize * height as usize;

    let mut solid = vec![false; tile_count];
    let mut encounter = vec![false; tile_count];

    for layer in root.descendants().filter(|node| node.has_tag_name("layer")) {
        if layer.attribute("visible") == Some("0") {
            continue;
        }
        let name = layer.attribute("name").unwrap_or_default();
        let lowered = name.to_ascii_lowercase();
        let target = if COLLISION_LAYER_MARKERS
            .iter()
            .any(|marker| lowered.contains(marker))
        {
            &mut solid
        } else if lowered.contains(ENCOUNTER_LAYER_MARKER) {
            &mut encounter
        } else {
            continue;
        };

        let gids = read_layer_gids(layer, name)?;
        if gids.len() != tile_count {
            return Err(TmxError::LayerSize {
                layer: name.to_string(),
                expected: tile_count,
                actual: gids.len(),
            });
        }
        for (cell, gid) in target.iter_mut().zip(gids) {
            *cell |= gid != 0;
        }
        debug!(layer = name, "tmx_layer_loaded");
    }

    Ok(Tilemap::new(width, height, solid)?.with_encounter_layer(encounter)?)
}

fn read_layer_gids(layer: roxmltree::Node<'_, '_>, name: &str) -> Result<Vec<u32>, TmxError> {
    let Some(data) = layer.children().find(|node| node.has_tag_name("data")) else {
        return Ok(Vec::new());
    };
    let encoding = data.attribute("encoding").unwrap_or("xml");
    if encoding != "csv" {
        return Err(TmxError::UnsupportedEncoding {
            layer: name.to_string(),
            encoding: encoding.to_string(),
        });
    }
    data.text()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<u32>().map_err(|_| TmxError::InvalidTileId {
                layer: name.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

fn parse_u32_attribute(
    node: roxmltree::Node<'_, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<u32, TmxError> {
    let value = node
        .attribute(attribute)
        .ok_or(TmxError::MissingAttribute { element, attribute })?;
    value.parse::<u32>().map_err(|_| TmxError::InvalidNumber {
        element,
        attribute,
        value: value.to_string(),
    })
}
