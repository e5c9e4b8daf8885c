// src/generator.rs
//! Оркестрация полного конвейера генерации.
//!
//! Единственная точка входа — [`generate`]: нормализованные контролы на
//! входе, полный набор согласованных слоёв на выходе. Инвариант конвейера:
//! после каждой стадии, мутирующей высоты, водные маски и дренаж
//! пересчитываются — ни один потребитель не видит устаревших слоёв.

use crate::biome::{self, Biome};
use crate::climate::{coastal_moisture_variation, generate_climate};
use crate::config::Controls;
use crate::heightfield::Heightfield;
use crate::hydrology::{
    FlowLayers, compute_flow, extract_rivers, incise_rivers, slope_feedback, valley_feedback,
};
use crate::identity::{controls_hash, identity_hash};
use crate::mask::{WaterLayers, coast_perimeter, derive_water_layers, land_area};
use crate::render::{hillshade, slope_field};
use crate::tectonics::{imprint_ridges, synthesize_base};


/// Итог генерации: все слои согласованы с финальным полем высот
#[derive(Debug, Clone)]
pub struct GeneratedMap {
    pub width: usize,
    pub height: usize,
    pub controls: Controls,
    pub sea_level: f32,

    pub elevation01: Vec<f32>,
    pub ridge: Vec<f32>,
    pub slope: Vec<f32>,
    pub light: Vec<f32>,

    pub temperature: Vec<f32>,
    pub moisture: Vec<f32>,
    pub flow: Vec<f32>,

    pub land: Vec<bool>,
    pub ocean: Vec<bool>,
    pub lake: Vec<bool>,
    pub river: Vec<bool>,
    pub distance_to_ocean: Vec<u32>,
    pub distance_to_land: Vec<u32>,

    pub biomes: Vec<Biome>,

    pub land_area: usize,
    pub coast_perimeter: usize,
    pub controls_hash: u64,
    pub identity: String,
}

impl GeneratedMap {
    /// Доля суши от всей сетки
    #[must_use]
    pub fn land_fraction(&self) -> f32 {
        self.land_area as f32 / (self.width * self.height) as f32
    }

    /// Идентификаторы биомов для отпечатка и сериализации
    #[must_use]
    pub fn biome_ids(&self) -> Vec<u8> {
        biome::biome_ids(&self.biomes)
    }
}

/// Пересчёт производных слоёв после мутации высот
fn refresh_derived(field: &Heightfield, sea_level: f32, seed: u64) -> (WaterLayers, FlowLayers) {
    let water = derive_water_layers(field, sea_level);
    let flow = compute_flow(field, &water, seed);
    (water, flow)
}

/// Полный конвейер: seed + слайдеры → детерминированная карта
#[must_use]
pub fn generate(raw_controls: &Controls) -> GeneratedMap {
    let controls = raw_controls.normalized();
    let seed = controls.seed_hash();
    let (w, h) = controls.grid_dimensions();
    let (w, h) = (w as usize, h as usize);

    // === 1. Тектоническая основа и хребты ===
    let mut layers = synthesize_base(&controls, w, h);
    let mut field = Heightfield::from_signed(w, h, layers.elevation.clone());
    imprint_ridges(&mut field, &mut layers, &controls);

    // === 2. Уровень моря: квантиль гистограммы под целевую долю суши ===
    let sea_level = field.histogram_threshold_signed(controls.target_land_fraction());

    // === 3. Береговое сглаживание: 1–6 проходов, полоса растёт со слайдером ===
    let smooth01 = controls.coastal_smoothing / 10.0;
    let smoothing_passes = 1 + (smooth01 * 5.0).round() as usize;
    let band = 0.04 + smooth01 * 0.08;
    field.coastal_smoothing(sea_level, smoothing_passes, band);
    let (water, flow) = refresh_derived(&field, sea_level, seed);

    // === 4. Климат до гидрологии: реки зависят от влажности ===
    let mut climate = generate_climate(&controls, &field, &water, &layers.ridge, sea_level);

    // === 5. Речная сеть и врезание русел (два прохода разной силы) ===
    let river = extract_rivers(&field, &water, &flow, &climate.moisture, &controls, sea_level);
    let relief01 = controls.relief / 10.0;
    let incision = 0.015 + relief01 * 0.02;
    incise_rivers(&mut field, &river, &flow.flow, sea_level, incision);
    let (_, flow) = refresh_derived(&field, sea_level, seed);
    incise_rivers(&mut field, &river, &flow.flow, sea_level, incision * 0.5);
    let (mut water, mut flow) = refresh_derived(&field, sea_level, seed);

    // === 6. Эрозионные раунды: склоны и долины ===
    for _ in 0..controls.size.erosion_rounds() {
        slope_feedback(&mut field, &water.land, 0.05, 4.0);
        valley_feedback(&mut field, &water.land, &flow.flow, 0.35);
        let refreshed = refresh_derived(&field, sea_level, seed);
        water = refreshed.0;
        flow = refreshed.1;
    }

    // === 7. Прибрежная вариация влажности по итоговому дренажу ===
    coastal_moisture_variation(&mut climate.moisture, &field, &water, &flow.flow, seed);

    // === 8. Биомы: классификация, сглаживание границ, одна переклассификация ===
    let mut river = river;
    for (cell, &is_land) in river.iter_mut().zip(water.land.iter()) {
        *cell = *cell && is_land;
    }
    let first_pass = biome::classify_biomes(
        &field,
        &water,
        &river,
        &climate.temperature,
        &climate.moisture,
        &layers.ridge,
        &controls,
        sea_level,
    );
    biome::edge_consistency_pass(
        &mut field,
        &mut climate.moisture,
        &first_pass,
        &water,
        sea_level,
    );
    let refreshed = refresh_derived(&field, sea_level, seed);
    water = refreshed.0;
    flow = refreshed.1;
    for (cell, &is_land) in river.iter_mut().zip(water.land.iter()) {
        *cell = *cell && is_land;
    }
    let biomes = biome::classify_biomes(
        &field,
        &water,
        &river,
        &climate.temperature,
        &climate.moisture,
        &layers.ridge,
        &controls,
        sea_level,
    );

    // === 9. Освещение и агрегаты ===
    let slope = slope_field(&field);
    let light = hillshade(&field);
    let area = land_area(&water.land);
    let perimeter = coast_perimeter(&water.land, w, h);

    // === 10. Отпечаток ===
    let chash = controls_hash(&controls);
    let identity = identity_hash(
        chash,
        &field.elevation01,
        &water.land,
        &river,
        &biome::biome_ids(&biomes),
    );

    GeneratedMap {
        width: w,
        height: h,
        controls,
        sea_level,
        elevation01: field.elevation01,
        ridge: layers.ridge,
        slope,
        light,
        temperature: climate.temperature,
        moisture: climate.moisture,
        flow: flow.flow,
        land: water.land,
        ocean: water.ocean,
        lake: water.lake,
        river,
        distance_to_ocean: water.distance_to_ocean,
        distance_to_land: water.distance_to_land,
        biomes,
        land_area: area,
        coast_perimeter: perimeter,
        controls_hash: chash,
        identity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeClass;

    fn isle_controls(seed: &str) -> Controls {
        Controls {
            seed: seed.to_string(),
            size: SizeClass::Isle,
            ..Controls::default()
        }
    }

    #[test]
    fn layers_share_grid_dimensions() {
        let map = generate(&isle_controls("layer-check"));
        let n = map.width * map.height;
        assert_eq!(map.elevation01.len(), n);
        assert_eq!(map.temperature.len(), n);
        assert_eq!(map.moisture.len(), n);
        assert_eq!(map.flow.len(), n);
        assert_eq!(map.land.len(), n);
        assert_eq!(map.river.len(), n);
        assert_eq!(map.biomes.len(), n);
        assert_eq!(map.light.len(), n);
    }

    #[test]
    fn rivers_are_strictly_on_land() {
        let map = generate(&isle_controls("river-check"));
        for i in 0..map.river.len() {
            if map.river[i] {
                assert!(map.land[i]);
            }
        }
    }

    #[test]
    fn different_seeds_give_different_identities() {
        let a = generate(&isle_controls("alpha"));
        let b = generate(&isle_controls("beta"));
        assert_ne!(a.identity, b.identity);
    }
}
