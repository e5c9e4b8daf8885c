// src/config.rs
//! Конфигурация генерации континента
//!
//! Этот модуль определяет входную запись `Controls`, управляющую всем конвейером:
//! - Сид (текстовая строка, нормализуется до хеширования)
//! - Класс размера и соотношение сторон (определяют сетку и число плит)
//! - Числовые слайдеры, каждый жёстко ограничен своим диапазоном
//! - Весовой вектор смеси биомов
//!
//! Все структуры поддерживают сериализацию в TOML/JSON для настройки через
//! конфигурационные файлы. Значения вне диапазона — не ошибка: они молча
//! ограничиваются при нормализации.

use serde::{Deserialize, Serialize};
use std::fs;

use crate::identity::fnv1a64;

/// Сид по умолчанию для пустой строки
pub const DEFAULT_SEED: &str = "atlas";

/// Фиксированный множитель выходного разрешения
pub const RESOLUTION_MULTIPLIER: f32 = 1.25;

/// Минимальная длина стороны сетки в ячейках
pub const MIN_GRID_EDGE: u32 = 96;

/// Класс размера карты
///
/// Фиксирует базовую длину стороны сетки и базовое число синтетических плит.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SizeClass {
    /// Небольшой остров (быстрая регенерация)
    Isle,
    /// Регион: один крупный массив суши
    #[default]
    Region,
    /// Субконтинент с развитой речной сетью
    Subcontinent,
    /// Суперконтинент, до ~1500×1000 ячеек
    Supercontinent,
}

impl SizeClass {
    /// Базовая длина стороны сетки до множителя разрешения
    #[must_use]
    pub fn base_edge(self) -> u32 {
        match self {
            SizeClass::Isle => 144,
            SizeClass::Region => 360,
            SizeClass::Subcontinent => 720,
            SizeClass::Supercontinent => 1200,
        }
    }

    /// Базовое число плит (до поправки слайдером)
    #[must_use]
    pub fn base_plate_count(self) -> i32 {
        match self {
            SizeClass::Isle => 5,
            SizeClass::Region => 9,
            SizeClass::Subcontinent => 14,
            SizeClass::Supercontinent => 22,
        }
    }

    /// Коэффициент суперсемплинга дорогого тектонического поля
    #[must_use]
    pub fn supersample(self) -> usize {
        match self {
            SizeClass::Isle => 2,
            SizeClass::Region => 3,
            SizeClass::Subcontinent | SizeClass::Supercontinent => 4,
        }
    }

    /// Число раундов эрозионной обратной связи (ограничено для интерактивности)
    #[must_use]
    pub fn erosion_rounds(self) -> usize {
        match self {
            SizeClass::Isle => 1,
            _ => 2,
        }
    }
}

/// Соотношение сторон карты
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AspectRatio {
    Square,
    #[default]
    Standard,
    Wide,
    Tall,
}

impl AspectRatio {
    /// Пропорции ширина:высота
    #[must_use]
    pub fn ratio(self) -> (f32, f32) {
        match self {
            AspectRatio::Square => (1.0, 1.0),
            AspectRatio::Standard => (3.0, 2.0),
            AspectRatio::Wide => (16.0, 9.0),
            AspectRatio::Tall => (2.0, 3.0),
        }
    }
}

/// Весовой вектор смеси биомов, каждая компонента в [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiomeMix {
    #[serde(default = "default_mix_weight")]
    pub grassland: f32,
    #[serde(default = "default_mix_weight")]
    pub forest: f32,
    #[serde(default = "default_mix_weight")]
    pub rainforest: f32,
    #[serde(default = "default_mix_weight")]
    pub desert: f32,
    #[serde(default = "default_mix_weight")]
    pub tundra: f32,
    #[serde(default = "default_mix_weight")]
    pub mountains: f32,
    #[serde(default = "default_mix_weight")]
    pub rivers: f32,
}

fn default_mix_weight() -> f32 {
    0.5
}

impl Default for BiomeMix {
    fn default() -> Self {
        Self {
            grassland: 0.5,
            forest: 0.5,
            rainforest: 0.5,
            desert: 0.5,
            tundra: 0.5,
            mountains: 0.5,
            rivers: 0.5,
        }
    }
}

impl BiomeMix {
    fn clamped(self) -> Self {
        Self {
            grassland: self.grassland.clamp(0.0, 1.0),
            forest: self.forest.clamp(0.0, 1.0),
            rainforest: self.rainforest.clamp(0.0, 1.0),
            desert: self.desert.clamp(0.0, 1.0),
            tundra: self.tundra.clamp(0.0, 1.0),
            mountains: self.mountains.clamp(0.0, 1.0),
            rivers: self.rivers.clamp(0.0, 1.0),
        }
    }
}

/// Полный набор входных параметров генерации
///
/// Перед использованием запись глубоко копируется и нормализуется
/// (`normalized`), чтобы исключить алиасинг-мутации у вызывающей стороны.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controls {
    /// Текстовый сид (trim + lowercase; пустой заменяется на "atlas")
    #[serde(default = "default_seed")]
    pub seed: String,

    /// Класс размера карты
    #[serde(default)]
    pub size: SizeClass,

    /// Соотношение сторон
    #[serde(default)]
    pub aspect: AspectRatio,

    /// Доля суши, 0..=10 (0 ≈ 8% суши, 10 ≈ 70%)
    #[serde(default = "default_mid_slider")]
    pub land_fraction: f32,

    /// Рельефность, 0..=10
    #[serde(default = "default_mid_slider")]
    pub relief: f32,

    /// Фрагментация береговой линии, 0..=10
    #[serde(default = "default_mid_slider")]
    pub fragmentation: f32,

    /// Сглаживание побережья, 0..=10 (→ 1–6 проходов)
    #[serde(default = "default_mid_slider")]
    pub coastal_smoothing: f32,

    /// Центральная широта карты в градусах, -90..=90
    #[serde(default = "default_latitude_center")]
    pub latitude_center: f32,

    /// Широтный охват карты в градусах, 10..=180
    #[serde(default = "default_latitude_span")]
    pub latitude_span: f32,

    /// Острота горных пиков, 0..=10
    #[serde(default = "default_mid_slider")]
    pub peakiness: f32,

    /// Плотность прибрежных островов, 0..=10
    #[serde(default = "default_mid_slider")]
    pub island_density: f32,

    /// Климатический сдвиг влажности, -5..=5
    #[serde(default = "default_zero_slider")]
    pub climate_bias: f32,

    /// Поправка числа плит, -5..=5 (±2 плиты на шаг)
    #[serde(default = "default_zero_slider")]
    pub plate_bias: f32,

    /// Весовая смесь биомов
    #[serde(default)]
    pub biome_mix: BiomeMix,
}

fn default_seed() -> String {
    DEFAULT_SEED.to_string()
}
fn default_mid_slider() -> f32 {
    5.0
}
fn default_zero_slider() -> f32 {
    0.0
}
fn default_latitude_center() -> f32 {
    30.0
}
fn default_latitude_span() -> f32 {
    60.0
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            size: SizeClass::default(),
            aspect: AspectRatio::default(),
            land_fraction: 5.0,
            relief: 5.0,
            fragmentation: 5.0,
            coastal_smoothing: 5.0,
            latitude_center: 30.0,
            latitude_span: 60.0,
            peakiness: 5.0,
            island_density: 5.0,
            climate_bias: 0.0,
            plate_bias: 0.0,
            biome_mix: BiomeMix::default(),
        }
    }
}

impl Controls {
    /// Возвращает глубокую копию с нормализованным сидом и зажатыми слайдерами
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut copy = self.clone();
        copy.seed = normalize_seed(&copy.seed);
        copy.land_fraction = copy.land_fraction.clamp(0.0, 10.0);
        copy.relief = copy.relief.clamp(0.0, 10.0);
        copy.fragmentation = copy.fragmentation.clamp(0.0, 10.0);
        copy.coastal_smoothing = copy.coastal_smoothing.clamp(0.0, 10.0);
        copy.latitude_center = copy.latitude_center.clamp(-90.0, 90.0);
        copy.latitude_span = copy.latitude_span.clamp(10.0, 180.0);
        copy.peakiness = copy.peakiness.clamp(0.0, 10.0);
        copy.island_density = copy.island_density.clamp(0.0, 10.0);
        copy.climate_bias = copy.climate_bias.clamp(-5.0, 5.0);
        copy.plate_bias = copy.plate_bias.clamp(-5.0, 5.0);
        copy.biome_mix = copy.biome_mix.clamped();
        copy
    }

    /// 64-битный хеш нормализованного сида
    #[must_use]
    pub fn seed_hash(&self) -> u64 {
        fnv1a64(normalize_seed(&self.seed).as_bytes())
    }

    /// Размеры сетки, выведенные из (size, aspect) и множителя разрешения
    #[must_use]
    pub fn grid_dimensions(&self) -> (u32, u32) {
        let base = self.size.base_edge() as f32 * RESOLUTION_MULTIPLIER;
        let (aw, ah) = self.aspect.ratio();
        let longest = aw.max(ah);
        let width = (base * aw / longest).round() as u32;
        let height = (base * ah / longest).round() as u32;
        (width.max(MIN_GRID_EDGE), height.max(MIN_GRID_EDGE))
    }

    /// Итоговое число плит: база класса размера плюс слайдер, зажато в 4..=36
    #[must_use]
    pub fn plate_count(&self) -> usize {
        let biased = self.size.base_plate_count() + (self.plate_bias.round() as i32) * 2;
        biased.clamp(4, 36) as usize
    }

    /// Целевая доля суши в [0.08, 0.70]
    #[must_use]
    pub fn target_land_fraction(&self) -> f32 {
        0.08 + self.land_fraction.clamp(0.0, 10.0) / 10.0 * 0.62
    }

    /// Загружает параметры из TOML-файла
    pub fn from_toml_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let controls: Self = toml::from_str(&contents)?;
        Ok(controls)
    }
}

/// Нормализация сида: trim + lowercase, пустая строка → фиксированный литерал
#[must_use]
pub fn normalize_seed(seed: &str) -> String {
    let trimmed = seed.trim().to_lowercase();
    if trimmed.is_empty() {
        DEFAULT_SEED.to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_is_trimmed_lowercased_and_defaulted() {
        assert_eq!(normalize_seed("  Misty Forge "), "misty forge");
        assert_eq!(normalize_seed("   "), DEFAULT_SEED);

        let a = Controls {
            seed: "DEMO".into(),
            ..Controls::default()
        };
        let b = Controls {
            seed: " demo ".into(),
            ..Controls::default()
        };
        assert_eq!(a.seed_hash(), b.seed_hash());
    }

    #[test]
    fn sliders_clamp_instead_of_erroring() {
        let wild = Controls {
            land_fraction: 99.0,
            climate_bias: -50.0,
            latitude_span: 1.0,
            biome_mix: BiomeMix {
                rivers: 7.0,
                ..BiomeMix::default()
            },
            ..Controls::default()
        };
        let norm = wild.normalized();
        assert_eq!(norm.land_fraction, 10.0);
        assert_eq!(norm.climate_bias, -5.0);
        assert_eq!(norm.latitude_span, 10.0);
        assert_eq!(norm.biome_mix.rivers, 1.0);
    }

    #[test]
    fn grid_dimensions_respect_minimum_edge() {
        let c = Controls {
            size: SizeClass::Isle,
            aspect: AspectRatio::Wide,
            ..Controls::default()
        };
        let (w, h) = c.grid_dimensions();
        assert!(w >= MIN_GRID_EDGE && h >= MIN_GRID_EDGE);
    }

    #[test]
    fn supercontinent_standard_is_1500_by_1000() {
        let c = Controls {
            size: SizeClass::Supercontinent,
            aspect: AspectRatio::Standard,
            ..Controls::default()
        };
        assert_eq!(c.grid_dimensions(), (1500, 1000));
    }

    #[test]
    fn plate_count_stays_in_bounds() {
        let low = Controls {
            size: SizeClass::Isle,
            plate_bias: -5.0,
            ..Controls::default()
        };
        assert!(low.plate_count() >= 4);

        let high = Controls {
            size: SizeClass::Supercontinent,
            plate_bias: 5.0,
            ..Controls::default()
        };
        assert!(high.plate_count() <= 36);
    }

    #[test]
    fn toml_defaults_fill_missing_fields() {
        let c: Controls = toml::from_str("seed = \"Demo\"").unwrap();
        assert_eq!(c.land_fraction, 5.0);
        assert_eq!(c.biome_mix.rivers, 0.5);
    }
}
