//! ASCII terrain preview for quick terminal review.
//!
//! Each character cell covers a block of tiles. The highest-priority feature
//! in the block wins, then a resource marker, then the center tile's biome.

use rts_terrain::engine::TerrainEngine;
use rts_terrain::tile::{TerrainFeature, Tile, TilePos};

/// Marker drawn over active anomaly centers.
pub const ANOMALY_GLYPH: char = '@';
/// Marker drawn for resource tiles without a feature.
pub const RESOURCE_GLYPH: char = '$';

/// ASCII preview configuration.
#[derive(Debug, Clone, Copy)]
pub struct PreviewConfig {
    /// Maximum columns.
    pub width: usize,
    /// Maximum rows.
    pub height: usize,
    /// Append a glyph legend.
    pub show_legend: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            width: 80,
            height: 40,
            show_legend: true,
        }
    }
}

/// Render a row-major tile grid.
#[must_use]
pub fn render_tiles(tiles: &[Tile], map_width: u32, map_height: u32, config: &PreviewConfig) -> String {
    let grid = glyph_grid(tiles, map_width, map_height, config);
    finish(grid, config)
}

/// Render a live engine, marking active anomalies.
#[must_use]
pub fn render_engine(engine: &TerrainEngine, config: &PreviewConfig) -> String {
    let (w, h) = (engine.width(), engine.height());
    let mut grid = glyph_grid(engine.tiles(), w, h, config);
    let (cols, rows) = (grid.first().map_or(0, Vec::len), grid.len());

    for anomaly in engine.active_anomalies() {
        let (col, row) = cell_of(anomaly.center, w, h, cols, rows);
        if let Some(cell) = grid.get_mut(row).and_then(|r| r.get_mut(col)) {
            *cell = ANOMALY_GLYPH;
        }
    }
    finish(grid, config)
}

fn cell_of(pos: TilePos, w: u32, h: u32, cols: usize, rows: usize) -> (usize, usize) {
    let col = (pos.x.max(0) as usize * cols) / w.max(1) as usize;
    let row = (pos.y.max(0) as usize * rows) / h.max(1) as usize;
    (col.min(cols.saturating_sub(1)), row.min(rows.saturating_sub(1)))
}

fn glyph_grid(tiles: &[Tile], map_width: u32, map_height: u32, config: &PreviewConfig) -> Vec<Vec<char>> {
    let (w, h) = (map_width.max(1) as usize, map_height.max(1) as usize);
    let cols = config.width.clamp(1, w);
    let rows = config.height.clamp(1, h);

    (0..rows)
        .map(|row| {
            let (y0, y1) = (row * h / rows, ((row + 1) * h / rows).max(row * h / rows + 1));
            (0..cols)
                .map(|col| {
                    let (x0, x1) = (col * w / cols, ((col + 1) * w / cols).max(col * w / cols + 1));
                    block_glyph(tiles, w, (x0, x1), (y0, y1))
                })
                .collect()
        })
        .collect()
}

fn block_glyph(tiles: &[Tile], w: usize, xs: (usize, usize), ys: (usize, usize)) -> char {
    let mut feature = None;
    let mut has_resource = false;
    for y in ys.0..ys.1 {
        for x in xs.0..xs.1 {
            let Some(tile) = tiles.get(y * w + x) else {
                continue;
            };
            if let Some(f) = tile.feature {
                if feature.map_or(true, |cur: TerrainFeature| f.priority() > cur.priority()) {
                    feature = Some(f);
                }
            }
            has_resource |= tile.resource.is_some();
        }
    }

    if let Some(f) = feature {
        return f.glyph();
    }
    if has_resource {
        return RESOURCE_GLYPH;
    }
    let center = ((ys.0 + ys.1) / 2) * w + (xs.0 + xs.1) / 2;
    tiles.get(center).map_or(' ', |t| t.biome.glyph())
}

fn finish(grid: Vec<Vec<char>>, config: &PreviewConfig) -> String {
    let mut out: String = grid
        .into_iter()
        .map(|row| row.into_iter().collect::<String>() + "\n")
        .collect();
    if config.show_legend {
        out.push_str(
            ". plains  f forest  : desert  - tundra  % swamp  o crater  ~ lava  * crystal  w water\n\
             C choke  ^ high  O objective  = bridge  U caldera  T tower  V vault  # canyon  \
             _ corridor  r vein  Q fracture  $ resource  @ anomaly\n",
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_legend(width: usize, height: usize) -> PreviewConfig {
        PreviewConfig {
            width,
            height,
            show_legend: false,
        }
    }

    #[test]
    fn test_blank_map_is_all_plains() {
        let engine = TerrainEngine::blank(10, 5);
        let out = render_engine(&engine, &no_legend(80, 40));
        assert_eq!(out, "..........\n".repeat(5));
    }

    #[test]
    fn test_downsampling_keeps_features() {
        let mut engine = TerrainEngine::blank(100, 100);
        if let Some(tile) = engine.tile_at_mut(TilePos::new(51, 51)) {
            tile.feature = Some(TerrainFeature::Objective);
        }
        let out = render_engine(&engine, &no_legend(10, 10));
        assert_eq!(out.lines().count(), 10);
        assert!(out.lines().all(|l| l.chars().count() == 10));
        assert_eq!(out.matches('O').count(), 1);
    }

    #[test]
    fn test_legend_appended() {
        let engine = TerrainEngine::blank(4, 4);
        let out = render_engine(&engine, &PreviewConfig::default());
        assert!(out.contains("@ anomaly"));
    }
}
