//! PNG export of the classified map and the elevation field.

use image::{ImageBuffer, Rgb, RgbImage};

use crate::ascii::class_color;
use crate::elevation::ElevationField;
use crate::trees::TreeKind;
use crate::world::Core;

/// Export the classified region (terrain, water, trees, deer) as a PNG.
pub fn export_terrain_map(core: &Core, path: &str) -> Result<(), image::ImageError> {
    render_terrain_map(core).save(path)
}

/// Export an elevation field using the spectral colormap.
pub fn export_elevation_map(elevation: &ElevationField, path: &str) -> Result<(), image::ImageError> {
    render_elevation_map(elevation).save(path)
}

/// One pixel per cell, coloured by render class.
pub fn render_terrain_map(core: &Core) -> RgbImage {
    let bounds = core.bounds();
    let mut img: RgbImage = ImageBuffer::new(bounds.width() as u32, bounds.height() as u32);
    for (p, tag) in core.classified().tags().iter() {
        let class = match core.feature_at(p.x, p.y).map(|f| f.kind) {
            Some(TreeKind::Trunk) => "trunk",
            Some(TreeKind::Canopy) => "canopy",
            None => tag.class_name(),
        };
        let class = if core.deer().deer_at(p).is_some() { "deer" } else { class };
        let (r, g, b) = class_color(class);
        let px = (p.x - bounds.min_x) as u32;
        let py = (p.y - bounds.min_y) as u32;
        img.put_pixel(px, py, Rgb([r, g, b]));
    }
    let player = core.player();
    if bounds.contains_point(player) {
        let (r, g, b) = class_color("player");
        img.put_pixel(
            (player.x - bounds.min_x) as u32,
            (player.y - bounds.min_y) as u32,
            Rgb([r, g, b]),
        );
    }
    img
}

/// Elevation normalised to its own range; flat fields render grey.
pub fn render_elevation_map(elevation: &ElevationField) -> RgbImage {
    let heights = &elevation.heights;
    let bounds = heights.bounds;
    let mut img: RgbImage = ImageBuffer::new(heights.width as u32, heights.height as u32);

    let (min_val, max_val) = heights.min_max();
    let range = max_val - min_val;
    for (p, &val) in heights.iter() {
        let color = if range < 0.001 {
            [128, 128, 128]
        } else {
            spectral_colormap((val - min_val) / range)
        };
        img.put_pixel((p.x - bounds.min_x) as u32, (p.y - bounds.min_y) as u32, Rgb(color));
    }
    img
}

/// Spectral colormap (matplotlib style): dark blue -> cyan -> green -> yellow -> orange -> red
fn spectral_colormap(t: f32) -> [u8; 3] {
    let colors: [[f32; 3]; 11] = [
        [0.37, 0.31, 0.64],
        [0.20, 0.53, 0.74],
        [0.40, 0.76, 0.65],
        [0.67, 0.87, 0.64],
        [0.90, 0.96, 0.60],
        [1.00, 1.00, 0.75],
        [1.00, 0.88, 0.55],
        [0.99, 0.68, 0.38],
        [0.96, 0.43, 0.26],
        [0.84, 0.24, 0.31],
        [0.62, 0.00, 0.26],
    ];

    let t_scaled = t.clamp(0.0, 1.0) * 10.0;
    let idx = (t_scaled as usize).min(9);
    let frac = t_scaled - idx as f32;

    let c1 = colors[idx];
    let c2 = colors[idx + 1];

    [
        ((c1[0] + (c2[0] - c1[0]) * frac) * 255.0) as u8,
        ((c1[1] + (c2[1] - c1[1]) * frac) * 255.0) as u8,
        ((c1[2] + (c2[2] - c1[2]) * frac) * 255.0) as u8,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;

    #[test]
    fn test_images_cover_region() {
        let mut config = GameConfig::with_seed(5);
        config.world.region_size = 40;
        let core = Core::new(config).unwrap();
        let img = render_terrain_map(&core);
        assert_eq!(img.dimensions(), (40, 40));

        let elevation = core.context().artifacts().elevation.as_ref().unwrap();
        let img = render_elevation_map(elevation);
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(spectral_colormap(0.0), [94, 79, 163]);
        assert_eq!(spectral_colormap(2.0), spectral_colormap(1.0));
    }
}
