// src/climate.rs
//! Климатические поля: температура и влажность в [0, 1].
//!
//! Температура — широта + высота + шум. Влажность — близость океана,
//! шум, климатический сдвиг и дождевая тень: наветренный сосед с высоким
//! гребнем отбирает влагу у подветренной стороны.

use crate::config::Controls;
use crate::heightfield::Heightfield;
use crate::identity::stage_seed;
use crate::mask::WaterLayers;
use crate::noise::{fbm, value_noise};

#[derive(Debug, Clone)]
pub struct ClimateLayers {
    pub temperature: Vec<f32>,
    pub moisture: Vec<f32>,
}

/// Широта строки y, линейная интерполяция от центра и охвата карты
#[must_use]
pub fn latitude_of_row(controls: &Controls, y: usize, height: usize) -> f32 {
    let t = if height > 1 {
        0.5 - y as f32 / (height - 1) as f32
    } else {
        0.0
    };
    (controls.latitude_center + t * controls.latitude_span).clamp(-90.0, 90.0)
}

/// Генерирует карты температуры и влажности
#[must_use]
pub fn generate_climate(
    controls: &Controls,
    field: &Heightfield,
    water: &WaterLayers,
    ridge: &[f32],
    sea_level: f32,
) -> ClimateLayers {
    let w = field.width;
    let h = field.height;
    let seed = controls.seed_hash();
    let s_temp = stage_seed(seed, "temperature");
    let s_moist = stage_seed(seed, "moisture");
    let aspect = w as f32 / h as f32;
    let climate_bias = controls.climate_bias / 5.0;

    let mut temperature = vec![0.0; w * h];
    let mut moisture = vec![0.0; w * h];

    for y in 0..h {
        let lat = latitude_of_row(controls, y, h);
        let lat_temp = 1.0 - lat.abs() / 90.0;
        // Наветренная сторона: пассатная модель по знаку широты
        let upwind_dx: i32 = if lat >= 0.0 { -1 } else { 1 };

        for x in 0..w {
            let idx = y * w + x;
            let px = x as f32 / (w - 1) as f32 * aspect;
            let py = y as f32 / (h - 1) as f32;
            let elev_above = (field.elevation[idx] - sea_level).max(0.0);
            let is_water = !water.land[idx];

            // === Температура ===
            let t_noise = (fbm(s_temp, px * 5.0, py * 5.0, 3, 0.5, 2.0) - 0.5) * 0.12;
            let water_warmth = if is_water { 0.05 } else { 0.0 };
            temperature[idx] =
                (lat_temp - elev_above * 0.5 + t_noise + water_warmth).clamp(0.0, 1.0);

            // === Влажность ===
            let d_ocean = water.distance_to_ocean[idx] as f32;
            let ocean_proximity = (-d_ocean / 14.0).exp() * 0.3;
            let coastal_humidity = (-d_ocean / 4.0).exp() * 0.08;
            let m_noise = (fbm(s_moist, px * 6.0, py * 6.0, 4, 0.5, 2.0) - 0.5) * 0.18;

            // Дождевая тень: градиент от наветренного соседа, взвешенный его гребнем
            let ux = (x as i32 + upwind_dx).clamp(0, w as i32 - 1) as usize;
            let uidx = y * w + ux;
            let upslope = (field.elevation[idx] - field.elevation[uidx]).max(0.0);
            let rain_shadow = upslope * ridge[uidx] * 2.5;

            let water_bonus = if is_water { 0.1 } else { 0.0 };
            moisture[idx] = (0.35 + ocean_proximity + coastal_humidity + m_noise
                + climate_bias * 0.2
                - elev_above * 0.3
                - rain_shadow
                + water_bonus)
                .clamp(0.0, 1.0);
        }
    }

    ClimateLayers {
        temperature,
        moisture,
    }
}

/// Прибрежная вариация влажности после гидрологии.
///
/// Чисто климатическая косметика: возмущает влажность у берега локальным
/// уклоном, дренажом и шумом, экспоненциально затухая вглубь суши.
/// Масок не трогает.
pub fn coastal_moisture_variation(
    moisture: &mut [f32],
    field: &Heightfield,
    water: &WaterLayers,
    flow: &[f32],
    seed_hash: u64,
) {
    let w = field.width;
    let h = field.height;
    let s_var = stage_seed(seed_hash, "coastal-variation");

    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if !water.land[idx] {
                continue;
            }
            let d = water.distance_to_ocean[idx] as f32;
            if d > 24.0 {
                continue;
            }

            let slope = local_slope(field, x, y);
            let n = value_noise(s_var, x as f32 * 0.11, y as f32 * 0.11) - 0.5;
            let perturb = (flow[idx] * 0.4 + slope * 1.5 + n * 0.5) * (-d / 6.0).exp() * 0.25;
            moisture[idx] = (moisture[idx] + perturb).clamp(0.0, 1.0);
        }
    }
}

/// Модуль градиента по 4 соседям (зеркало [0, 1])
#[must_use]
pub fn local_slope(field: &Heightfield, x: usize, y: usize) -> f32 {
    let w = field.width;
    let h = field.height;
    let x0 = x.saturating_sub(1);
    let x1 = (x + 1).min(w - 1);
    let y0 = y.saturating_sub(1);
    let y1 = (y + 1).min(h - 1);
    let dx = (field.elevation01[y * w + x1] - field.elevation01[y * w + x0]) * 0.5;
    let dy = (field.elevation01[y1 * w + x] - field.elevation01[y0 * w + x]) * 0.5;
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::derive_water_layers;

    fn flat_island(w: usize, h: usize) -> (Heightfield, WaterLayers) {
        let mut data = vec![-0.4; w * h];
        for y in 3..h - 3 {
            for x in 3..w - 3 {
                data[y * w + x] = 0.3;
            }
        }
        let field = Heightfield::from_signed(w, h, data);
        let water = derive_water_layers(&field, 0.0);
        (field, water)
    }

    #[test]
    fn fields_stay_in_unit_range() {
        let (field, water) = flat_island(32, 32);
        let ridge = vec![0.2; 32 * 32];
        let climate = generate_climate(&Controls::default(), &field, &water, &ridge, 0.0);
        for i in 0..32 * 32 {
            assert!((0.0..=1.0).contains(&climate.temperature[i]));
            assert!((0.0..=1.0).contains(&climate.moisture[i]));
        }
    }

    #[test]
    fn higher_latitude_is_colder() {
        let (field, water) = flat_island(32, 64);
        let ridge = vec![0.0; 32 * 64];
        let polar = Controls {
            latitude_center: 75.0,
            ..Controls::default()
        };
        let tropical = Controls {
            latitude_center: 5.0,
            ..Controls::default()
        };
        let cold = generate_climate(&polar, &field, &water, &ridge, 0.0);
        let warm = generate_climate(&tropical, &field, &water, &ridge, 0.0);
        let mid = 32 * 32 + 16;
        assert!(cold.temperature[mid] < warm.temperature[mid]);
    }

    #[test]
    fn coast_is_wetter_than_deep_interior() {
        let (field, water) = flat_island(48, 48);
        let ridge = vec![0.0; 48 * 48];
        let climate = generate_climate(&Controls::default(), &field, &water, &ridge, 0.0);

        let mut coast_sum = 0.0;
        let mut coast_n = 0.0;
        let mut inland_sum = 0.0;
        let mut inland_n = 0.0;
        for i in 0..48 * 48 {
            if !water.land[i] {
                continue;
            }
            if water.distance_to_ocean[i] <= 2 {
                coast_sum += climate.moisture[i];
                coast_n += 1.0;
            } else if water.distance_to_ocean[i] >= 12 {
                inland_sum += climate.moisture[i];
                inland_n += 1.0;
            }
        }
        assert!(coast_n > 0.0 && inland_n > 0.0);
        assert!(coast_sum / coast_n > inland_sum / inland_n);
    }
}
