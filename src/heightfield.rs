// src/heightfield.rs
//! Хранилище высот: знаковое поле и его зеркало [0, 1].
//!
//! Инвариант: `elevation01 = clamp01((elevation + 1) / 2)` обязан выполняться
//! после каждой мутации знакового поля, прежде чем последующая стадия прочтёт
//! любой из двух массивов. Все мутирующие методы синхронизируют зеркало сами.

/// Число корзин гистограммы для решения уровня моря
const SEA_LEVEL_BINS: usize = 2048;

/// Двумерное поле высот: знаковые значения, номинально в [-1, 1]
#[derive(Debug, Clone)]
pub struct Heightfield {
    pub width: usize,
    pub height: usize,
    pub elevation: Vec<f32>,
    pub elevation01: Vec<f32>,
}

impl Heightfield {
    #[must_use]
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            elevation: vec![0.0; width * height],
            elevation01: vec![0.5; width * height],
        }
    }

    /// Создаёт поле из готового знакового массива и сразу синхронизирует зеркало
    #[must_use]
    pub fn from_signed(width: usize, height: usize, elevation: Vec<f32>) -> Self {
        debug_assert_eq!(elevation.len(), width * height);
        let mut field = Self {
            width,
            height,
            elevation,
            elevation01: Vec::new(),
        };
        field.elevation01 = vec![0.0; field.elevation.len()];
        field.sync_unsigned();
        field
    }

    #[inline]
    #[must_use]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.elevation[y * self.width + x]
    }

    /// Пересчитывает зеркало [0, 1] из знакового поля
    pub fn sync_unsigned(&mut self) {
        for (dst, &e) in self.elevation01.iter_mut().zip(self.elevation.iter()) {
            *dst = ((e + 1.0) * 0.5).clamp(0.0, 1.0);
        }
    }

    /// Перенормировка знакового поля в [-1, 1] (после стадий, раздувающих диапазон)
    pub fn normalize_signed(&mut self) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &e in &self.elevation {
            min = min.min(e);
            max = max.max(e);
        }
        let range = max - min;
        if range > f32::EPSILON {
            for e in &mut self.elevation {
                *e = (*e - min) / range * 2.0 - 1.0;
            }
        }
        self.sync_unsigned();
    }

    /// Квантильный порог по гистограмме: уровень моря под целевую долю суши.
    ///
    /// Строит 2048 корзин по диапазону высот и идёт от верхней вниз, пока
    /// накопленное число ячеек не достигнет целевого. O(n), точность до корзины.
    #[must_use]
    pub fn histogram_threshold_signed(&self, target_land_fraction: f32) -> f32 {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for &e in &self.elevation {
            min = min.min(e);
            max = max.max(e);
        }
        let range = max - min;
        if range <= f32::EPSILON {
            return min;
        }

        let mut bins = [0_u32; SEA_LEVEL_BINS];
        let scale = (SEA_LEVEL_BINS - 1) as f32 / range;
        for &e in &self.elevation {
            let bin = ((e - min) * scale) as usize;
            bins[bin.min(SEA_LEVEL_BINS - 1)] += 1;
        }

        let target_cells =
            (target_land_fraction.clamp(0.0, 1.0) * self.elevation.len() as f32) as u32;
        let mut cumulative = 0_u32;
        for bin in (0..SEA_LEVEL_BINS).rev() {
            cumulative += bins[bin];
            if cumulative >= target_cells {
                return min + bin as f32 / scale;
            }
        }
        min
    }

    /// Анизотропное сглаживание побережья в полосе вокруг уровня моря.
    ///
    /// Ортогональные соседи весят 65%, диагональные — 35%; сила затухает
    /// smoothstep-ом по удалению от центра полосы. Внутренний рельеф не трогаем.
    pub fn coastal_smoothing(&mut self, sea_level: f32, passes: usize, band: f32) {
        if passes == 0 || band <= f32::EPSILON {
            return;
        }
        let w = self.width;
        let h = self.height;
        let mut scratch = self.elevation.clone();

        for _ in 0..passes {
            for y in 0..h {
                for x in 0..w {
                    let idx = y * w + x;
                    let e = self.elevation[idx];
                    let offset = (e - sea_level).abs();
                    if offset >= band {
                        scratch[idx] = e;
                        continue;
                    }

                    let mut sum = 0.0;
                    let mut weight = 0.0;
                    for (dx, dy, wgt) in NEIGHBOR_WEIGHTS {
                        let nx = x as i32 + dx;
                        let ny = y as i32 + dy;
                        if nx >= 0 && nx < w as i32 && ny >= 0 && ny < h as i32 {
                            sum += self.elevation[(ny as usize) * w + nx as usize] * wgt;
                            weight += wgt;
                        }
                    }
                    if weight <= f32::EPSILON {
                        scratch[idx] = e;
                        continue;
                    }

                    let t = offset / band;
                    let strength = 1.0 - t * t * (3.0 - 2.0 * t);
                    scratch[idx] = e + (sum / weight - e) * strength * 0.8;
                }
            }
            self.elevation.copy_from_slice(&scratch);
        }
        self.sync_unsigned();
    }
}

/// Веса соседей: ортогональные 0.65, диагональные 0.35
const NEIGHBOR_WEIGHTS: [(i32, i32, f32); 8] = [
    (0, -1, 0.65),
    (-1, 0, 0.65),
    (1, 0, 0.65),
    (0, 1, 0.65),
    (-1, -1, 0.35),
    (1, -1, 0.35),
    (-1, 1, 0.35),
    (1, 1, 0.35),
];

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_field() -> Heightfield {
        let data: Vec<f32> = (0..96 * 96)
            .map(|i| (i % 96) as f32 / 95.0 * 2.0 - 1.0)
            .collect();
        Heightfield::from_signed(96, 96, data)
    }

    #[test]
    fn mirror_invariant_holds_after_mutations() {
        let mut field = ramp_field();
        field.elevation[500] = 3.5;
        field.normalize_signed();
        for (&e, &e01) in field.elevation.iter().zip(field.elevation01.iter()) {
            assert!((e01 - ((e + 1.0) * 0.5).clamp(0.0, 1.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn histogram_threshold_hits_requested_fraction() {
        let field = ramp_field();
        let sea = field.histogram_threshold_signed(0.3);
        let land = field.elevation.iter().filter(|&&e| e > sea).count();
        let ratio = land as f32 / field.elevation.len() as f32;
        assert!((ratio - 0.3).abs() < 0.02, "доля суши {ratio}");
    }

    #[test]
    fn histogram_threshold_is_monotone_in_target() {
        let field = ramp_field();
        let sea_low = field.histogram_threshold_signed(0.2);
        let sea_high = field.histogram_threshold_signed(0.6);
        // Больше суши — ниже уровень моря
        assert!(sea_high <= sea_low);
    }

    #[test]
    fn uniform_field_does_not_crash_threshold() {
        let field = Heightfield::from_signed(96, 96, vec![0.25; 96 * 96]);
        let sea = field.histogram_threshold_signed(0.5);
        assert_eq!(sea, 0.25);
    }

    #[test]
    fn coastal_smoothing_leaves_interior_untouched() {
        let mut field = ramp_field();
        let before = field.elevation.clone();
        let sea = 0.0;
        field.coastal_smoothing(sea, 2, 0.05);
        for (i, (&b, &a)) in before.iter().zip(field.elevation.iter()).enumerate() {
            if (b - sea).abs() > 0.2 {
                assert_eq!(b.to_bits(), a.to_bits(), "внутренняя ячейка {i} изменилась");
            }
        }
    }
}
