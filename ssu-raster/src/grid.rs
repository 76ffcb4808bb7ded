use std::fmt;

/// Six-coefficient affine transform: origin x, pixel width, row rotation,
/// origin y, column rotation, pixel height (negative for north-up grids).
pub type GeoTransform = [f64; 6];

/// Shape and georeferencing of a raster.
#[derive(Debug, Clone, PartialEq)]
pub struct GridInfo {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub geo_transform: GeoTransform,
    pub projection: String,
}

impl GridInfo {
    /// Pixel containing a map coordinate, or `None` when outside the grid.
    /// Rotation terms are ignored.
    pub fn pixel_of(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let gt = &self.geo_transform;
        if gt[1] == 0.0 || gt[5] == 0.0 {
            return None;
        }
        let col = ((x - gt[0]) / gt[1]).floor();
        let row = ((y - gt[3]) / gt[5]).floor();
        if col < 0.0 || row < 0.0 || col >= self.width as f64 || row >= self.height as f64 {
            return None;
        }
        Some((col as usize, row as usize))
    }

    /// Blocks covering the grid in row-major order.
    pub fn tiles(&self, tile_size: usize) -> Vec<Window> {
        Window::tiles(self.width, self.height, tile_size)
    }
}

/// Rectangular block of pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Window {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Window { x, y, width, height }
    }

    /// Split a `width` x `height` grid into blocks of at most
    /// `tile_size` x `tile_size`; edge blocks are truncated.
    pub fn tiles(width: usize, height: usize, tile_size: usize) -> Vec<Window> {
        let tile_size = tile_size.max(1);
        let mut windows = Vec::new();
        let mut y = 0;
        while y < height {
            let h = tile_size.min(height - y);
            let mut x = 0;
            while x < width {
                let w = tile_size.min(width - x);
                windows.push(Window::new(x, y, w, h));
                x += tile_size;
            }
            y += tile_size;
        }
        windows
    }

    /// Whether the block fits inside a grid of the given size.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// Pixel types written by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelType {
    Float32,
    Byte,
}

impl PixelType {
    pub fn as_gdal_str(&self) -> &'static str {
        match self {
            PixelType::Float32 => "Float32",
            PixelType::Byte => "Byte",
        }
    }

    /// Round a value to what the pixel type can store.
    pub fn quantize(&self, value: f64) -> f64 {
        match self {
            PixelType::Float32 => value as f32 as f64,
            PixelType::Byte => value.round().clamp(0.0, 255.0),
        }
    }
}
