// src/render.rs
//! Освещение и превью-рендеры.
//!
//! Затенение рельефа — классическая модель с источником на северо-западе
//! (азимут 315°, высота 45°). Превью пишутся через `image`/`imageproc`
//! и предназначены для глаза, а не для отпечатка карты.

use image::{ImageBuffer, Luma, Rgba};
use imageproc::drawing::draw_filled_circle_mut;
use rayon::prelude::*;

use crate::biome::Biome;
use crate::climate::local_slope;
use crate::heightfield::Heightfield;

/// Азимут источника света, градусы по часовой от севера
const LIGHT_AZIMUTH_DEG: f32 = 315.0;
/// Высота источника света над горизонтом, градусы
const LIGHT_ALTITUDE_DEG: f32 = 45.0;
/// Вертикальное преувеличение: elevation01 живёт в [0, 1] на сотни ячеек
const Z_FACTOR: f32 = 80.0;

/// Модуль градиента высоты для каждой ячейки
#[must_use]
pub fn slope_field(field: &Heightfield) -> Vec<f32> {
    let w = field.width;
    let h = field.height;
    let mut slope = vec![0.0; w * h];
    for y in 0..h {
        for x in 0..w {
            slope[y * w + x] = local_slope(field, x, y);
        }
    }
    slope
}

/// Карта освещённости [0, 1]
#[must_use]
pub fn hillshade(field: &Heightfield) -> Vec<f32> {
    let w = field.width;
    let h = field.height;
    // Перевод компасного азимута в математический угол (отсчёт от оси X)
    let azimuth = (360.0 - LIGHT_AZIMUTH_DEG + 90.0).to_radians();
    let zenith = (90.0 - LIGHT_ALTITUDE_DEG).to_radians();
    let (sin_z, cos_z) = zenith.sin_cos();

    let mut light = vec![0.0; w * h];
    for y in 0..h {
        let y0 = y.saturating_sub(1);
        let y1 = (y + 1).min(h - 1);
        for x in 0..w {
            let x0 = x.saturating_sub(1);
            let x1 = (x + 1).min(w - 1);
            let dzdx =
                (field.elevation01[y * w + x1] - field.elevation01[y * w + x0]) * 0.5 * Z_FACTOR;
            let dzdy =
                (field.elevation01[y1 * w + x] - field.elevation01[y0 * w + x]) * 0.5 * Z_FACTOR;

            let slope = (dzdx * dzdx + dzdy * dzdy).sqrt().atan();
            let aspect = dzdy.atan2(-dzdx);
            let shade = cos_z * slope.cos() + sin_z * slope.sin() * (azimuth - aspect).cos();
            light[y * w + x] = shade.clamp(0.0, 1.0);
        }
    }
    light
}

/// Превью высот: elevation01 в оттенках серого
#[must_use]
pub fn height_image(elevation01: &[f32]) -> Vec<u8> {
    elevation01.par_iter().map(|&e| (e * 255.0) as u8).collect()
}

/// Превью биомов: палитра, затемнённая картой освещённости
#[must_use]
pub fn biome_image(biomes: &[Biome], light: &[f32]) -> Vec<u8> {
    biomes
        .par_iter()
        .zip(light.par_iter())
        .flat_map_iter(|(&biome, &l)| {
            let [r, g, b] = biome.to_rgb();
            // 0.55..1.0 — тени не должны заливать палитру в чёрный
            let shade = 0.55 + l * 0.45;
            [
                (r as f32 * shade) as u8,
                (g as f32 * shade) as u8,
                (b as f32 * shade) as u8,
                255,
            ]
        })
        .collect()
}

/// Превью рек: белые русла на чёрном, толщина растёт с дренажом
#[must_use]
pub fn river_image(river: &[bool], flow: &[f32], width: usize, height: usize) -> Vec<u8> {
    let mut img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_pixel(width as u32, height as u32, Luma([0]));
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if !river[idx] {
                continue;
            }
            // Толщина: от 0 до 2 пикселей по логарифмическому дренажу
            let thickness = (flow[idx] * 2.5).min(2.0);
            draw_filled_circle_mut(
                &mut img,
                (x as i32, y as i32),
                thickness.round() as i32,
                Luma([255u8]),
            );
        }
    }
    img.into_raw()
}

pub fn save_grayscale_png(
    data: &[u8],
    width: usize,
    height: usize,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let img: ImageBuffer<Luma<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width as u32, height as u32, data.to_vec())
            .ok_or("Failed to create image buffer")?;
    img.save(path)?;
    Ok(())
}

pub fn save_rgba_png(
    data: &[u8],
    width: usize,
    height: usize,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width as u32, height as u32, data.to_vec())
            .ok_or("Failed to create image buffer")?;
    img.save(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Наклонная плоскость с запада на восток
    fn ramp(w: usize, h: usize) -> Heightfield {
        let data: Vec<f32> = (0..w * h)
            .map(|i| (i % w) as f32 / (w - 1) as f32 * 2.0 - 1.0)
            .collect();
        Heightfield::from_signed(w, h, data)
    }

    #[test]
    fn hillshade_stays_in_unit_range() {
        let field = ramp(24, 16);
        let light = hillshade(&field);
        for &l in &light {
            assert!((0.0..=1.0).contains(&l));
        }
    }

    #[test]
    fn northwest_slopes_are_brighter_than_southeast() {
        // Пирамида: северо-западный скат смотрит на источник света
        let w = 33;
        let h = 33;
        let data: Vec<f32> = (0..w * h)
            .map(|i| {
                let x = (i % w) as f32;
                let y = (i / w) as f32;
                let d = (x - 16.0).abs().max((y - 16.0).abs());
                1.0 - d / 16.0
            })
            .collect();
        let field = Heightfield::from_signed(w, h, data);
        let light = hillshade(&field);
        let nw = light[8 * w + 8];
        let se = light[24 * w + 24];
        assert!(nw > se);
    }

    #[test]
    fn preview_encoders_preserve_cell_order() {
        let values: Vec<f32> = (0..64).map(|i| i as f32 / 63.0).collect();
        let img = height_image(&values);
        assert_eq!(img.len(), 64);
        assert!(img.windows(2).all(|p| p[0] <= p[1]));
        assert_eq!(img[0], 0);
        assert_eq!(img[63], 255);

        let biomes = vec![Biome::Ocean, Biome::Desert];
        let light = vec![1.0, 1.0];
        let rgba = biome_image(&biomes, &light);
        assert_eq!(&rgba[0..3], &Biome::Ocean.to_rgb());
        assert_eq!(&rgba[4..7], &Biome::Desert.to_rgb());
    }

    #[test]
    fn biome_image_has_four_channels_per_cell() {
        let biomes = vec![Biome::Ocean, Biome::Grassland, Biome::Rock, Biome::Desert];
        let light = vec![0.5; 4];
        let img = biome_image(&biomes, &light);
        assert_eq!(img.len(), 16);
        assert_eq!(img[3], 255);
    }

    #[test]
    fn river_overlay_marks_channels() {
        let w = 8;
        let h = 8;
        let mut river = vec![false; w * h];
        river[3 * w + 3] = true;
        let flow = vec![0.4; w * h];
        let img = river_image(&river, &flow, w, h);
        assert_eq!(img[3 * w + 3], 255);
        assert_eq!(img[0], 0);
    }
}
