// src/biome.rs
//! Классификация биомов.
//!
//! Вода (океан/озеро) и река всегда приоритетнее наземного скоринга.
//! Наземные биомы выбираются по максимуму из пяти баллов-кандидатов —
//! произведений близости температуры/влажности и пользовательского веса
//! смеси. Ничьи разрешаются порядком перечисления (grassland первым).
//! Ординалы фиксированы: их стабильность использует отпечаток карты.

use serde::{Deserialize, Serialize};

use crate::config::Controls;
use crate::heightfield::Heightfield;
use crate::mask::WaterLayers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Biome {
    Ocean = 0,
    Lake = 1,
    Beach = 2,
    River = 3,
    Grassland = 4,
    TemperateForest = 5,
    Rainforest = 6,
    Desert = 7,
    Tundra = 8,
    Mountain = 9,
    Rock = 10,
}

impl Biome {
    #[must_use]
    pub fn to_rgb(self) -> [u8; 3] {
        match self {
            Biome::Ocean => [30, 72, 119],
            Biome::Lake => [62, 120, 160],
            Biome::Beach => [214, 200, 150],
            Biome::River => [70, 130, 180],
            Biome::Grassland => [150, 200, 100],
            Biome::TemperateForest => [60, 120, 60],
            Biome::Rainforest => [17, 64, 31],
            Biome::Desert => [209, 130, 62],
            Biome::Tundra => [142, 155, 168],
            Biome::Mountain => [150, 150, 150],
            Biome::Rock => [110, 105, 100],
        }
    }
}

fn affinity(value: f32, center: f32, width: f32) -> f32 {
    (1.0 - (value - center).abs() / width).max(0.0)
}

/// Полная классификация биомов по текущим слоям
#[must_use]
pub fn classify_biomes(
    field: &Heightfield,
    water: &WaterLayers,
    river: &[bool],
    temperature: &[f32],
    moisture: &[f32],
    ridge: &[f32],
    controls: &Controls,
    sea_level: f32,
) -> Vec<Biome> {
    let mix = controls.biome_mix;
    let peak01 = controls.peakiness / 10.0;
    let relief01 = controls.relief / 10.0;

    // Пороги гор/скал из рельефа, остроты пиков и веса гор в смеси
    let scale = 1.1 - relief01 * 0.2;
    let mountain_threshold = (0.42 - peak01 * 0.08 - mix.mountains * 0.12) * scale;
    let rock_threshold = (0.62 - peak01 * 0.12 - mix.mountains * 0.10) * scale;

    (0..field.elevation.len())
        .map(|i| {
            if water.ocean[i] {
                return Biome::Ocean;
            }
            if water.lake[i] {
                return Biome::Lake;
            }
            if river[i] {
                return Biome::River;
            }
            if !water.land[i] {
                // Вода за пределами океанской заливки уже учтена как озеро
                return Biome::Ocean;
            }

            let elev_above = (field.elevation[i] - sea_level).max(0.0);
            if water.distance_to_ocean[i] <= 1 && elev_above < 0.08 {
                return Biome::Beach;
            }

            let orogenic = elev_above + ridge[i] * 0.25;
            if orogenic > rock_threshold {
                return Biome::Rock;
            }
            if orogenic > mountain_threshold {
                return Biome::Mountain;
            }

            let t = temperature[i];
            let m = moisture[i];
            let candidates = [
                (
                    Biome::Grassland,
                    affinity(t, 0.55, 0.40) * affinity(m, 0.40, 0.40) * mix.grassland,
                ),
                (
                    Biome::TemperateForest,
                    affinity(t, 0.50, 0.35) * affinity(m, 0.65, 0.35) * mix.forest,
                ),
                (
                    Biome::Rainforest,
                    affinity(t, 0.80, 0.30) * affinity(m, 0.85, 0.35) * mix.rainforest,
                ),
                (
                    Biome::Desert,
                    affinity(t, 0.75, 0.35) * affinity(m, 0.12, 0.30) * mix.desert,
                ),
                (
                    Biome::Tundra,
                    affinity(t, 0.10, 0.30) * affinity(m, 0.45, 0.45) * mix.tundra,
                ),
            ];

            // Строгое «больше»: при ничьих побеждает более ранний кандидат
            let mut best = candidates[0];
            for &c in &candidates[1..] {
                if c.1 > best.1 {
                    best = c;
                }
            }
            best.0
        })
        .collect()
}

/// Сглаживание границ биомов: внутренние ячейки с ≥3 инаковыми соседями
/// подтягиваются по влажности и высоте к среднему окружения. Береговые линии
/// не размываются — они выводятся из масок, а не из меток биомов.
pub fn edge_consistency_pass(
    field: &mut Heightfield,
    moisture: &mut [f32],
    biomes: &[Biome],
    water: &WaterLayers,
    sea_level: f32,
) {
    let w = field.width;
    let h = field.height;
    let elevation_snapshot = field.elevation.clone();
    let moisture_snapshot = moisture.to_vec();

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let idx = y * w + x;
            if !water.land[idx] {
                continue;
            }

            let mut differing = 0;
            let mut moisture_sum = 0.0;
            let mut elevation_sum = 0.0;
            for dy in -1_i32..=1 {
                for dx in -1_i32..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nidx = ((y as i32 + dy) as usize) * w + (x as i32 + dx) as usize;
                    if biomes[nidx] != biomes[idx] {
                        differing += 1;
                    }
                    moisture_sum += moisture_snapshot[nidx];
                    elevation_sum += elevation_snapshot[nidx];
                }
            }
            if differing < 3 {
                continue;
            }

            let moisture_avg = moisture_sum / 8.0;
            let elevation_avg = elevation_sum / 8.0;
            moisture[idx] =
                (moisture_snapshot[idx] + (moisture_avg - moisture_snapshot[idx]) * 0.5)
                    .clamp(0.0, 1.0);
            // Суша остаётся сушей: не опускаем ниже уровня моря
            let nudged =
                elevation_snapshot[idx] + (elevation_avg - elevation_snapshot[idx]) * 0.25;
            field.elevation[idx] = nudged.max(sea_level + 1e-4);
        }
    }
    field.sync_unsigned();
}

/// Идентификаторы биомов для отпечатка и экспорта
#[must_use]
pub fn biome_ids(biomes: &[Biome]) -> Vec<u8> {
    biomes.iter().map(|&b| b as u8).collect()
}
