//! Spatial tiling of the common raster extent.

use crate::types::{CorrectError, CorrectResult, Tile};

/// Partition a (rows, cols) extent into `tile_rows` x `tile_cols`
/// rectangular tiles. Tiles in the last row/column absorb the remainder
/// so the extent is covered exactly. Computed once per run and shared
/// read-only thereafter.
pub fn get_tiles(
    shape: (usize, usize),
    tile_rows: usize,
    tile_cols: usize,
) -> CorrectResult<Vec<Tile>> {
    let (rows, cols) = shape;
    if rows == 0 || cols == 0 {
        return Err(CorrectError::Data("raster extent is empty".into()));
    }
    if tile_rows == 0 || tile_cols == 0 || tile_rows > rows || tile_cols > cols {
        return Err(CorrectError::Config(format!(
            "cannot split a {}x{} raster into {}x{} tiles",
            rows, cols, tile_rows, tile_cols
        )));
    }

    let row_step = rows / tile_rows;
    let col_step = cols / tile_cols;
    let mut tiles = Vec::with_capacity(tile_rows * tile_cols);
    for tr in 0..tile_rows {
        let top = tr * row_step;
        let bottom = if tr == tile_rows - 1 { rows } else { top + row_step };
        for tc in 0..tile_cols {
            let left = tc * col_step;
            let right = if tc == tile_cols - 1 { cols } else { left + col_step };
            tiles.push(Tile {
                index: tr * tile_cols + tc,
                top_left: (top, left),
                bottom_right: (bottom, right),
            });
        }
    }
    log::debug!("split {}x{} raster into {} tiles", rows, cols, tiles.len());
    Ok(tiles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tile_covers_extent() {
        let tiles = get_tiles((10, 20), 1, 1).unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].top_left, (0, 0));
        assert_eq!(tiles[0].bottom_right, (10, 20));
    }

    #[test]
    fn test_remainder_goes_to_last_tiles() {
        let tiles = get_tiles((10, 10), 3, 3).unwrap();
        assert_eq!(tiles.len(), 9);
        // last row/col tiles absorb the remainder
        let last = tiles.last().unwrap();
        assert_eq!(last.top_left, (6, 6));
        assert_eq!(last.bottom_right, (10, 10));
        let covered: usize = tiles.iter().map(|t| t.nrows() * t.ncols()).sum();
        assert_eq!(covered, 100);
    }

    #[test]
    fn test_too_many_tiles_rejected() {
        assert!(get_tiles((4, 4), 5, 1).is_err());
    }
}
