// src/noise.rs
//! Детерминированный шумовой слой: решётчатый value-noise, fbm и ridged-fbm.
//!
//! Все функции чистые: результат зависит только от (seed, x, y), без скрытого
//! состояния. Это фундамент воспроизводимости для всех последующих стадий.

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Целочисленный хеш узла решётки (финализатор в стиле splitmix64)
fn hash_lattice(seed: u64, x: i64, y: i64) -> u64 {
    let mut h = seed
        ^ (x as u64).wrapping_mul(0x8CB9_2BA7_2F3D_8DD7)
        ^ (y as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93);
    h = h.wrapping_add(GOLDEN_GAMMA);
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

/// Значение узла решётки в [0, 1)
#[must_use]
pub fn lattice_value(seed: u64, x: i64, y: i64) -> f32 {
    // Старшие 24 бита хеша → мантисса f32 без потери равномерности
    ((hash_lattice(seed, x, y) >> 40) as f32) / 16_777_216.0
}

/// Хеш ячейки с дополнительной солью (детерминированные тай-брейки)
#[must_use]
pub fn cell_salt(seed: u64, index: usize, salt: u32) -> u64 {
    hash_lattice(seed.wrapping_add(u64::from(salt).wrapping_mul(GOLDEN_GAMMA)), index as i64, 0x5157)
}

fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

/// Value-noise: билинейная интерполяция четырёх узлов решётки через smoothstep
#[must_use]
pub fn value_noise(seed: u64, x: f32, y: f32) -> f32 {
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = smoothstep(x - x0);
    let ty = smoothstep(y - y0);
    let xi = x0 as i64;
    let yi = y0 as i64;

    let g00 = lattice_value(seed, xi, yi);
    let g10 = lattice_value(seed, xi + 1, yi);
    let g01 = lattice_value(seed, xi, yi + 1);
    let g11 = lattice_value(seed, xi + 1, yi + 1);

    let top = g00 + (g10 - g00) * tx;
    let bottom = g01 + (g11 - g01) * tx;
    top + (bottom - top) * ty
}

/// Фрактальный броуновский шум: сумма октав value-noise, нормированная по весу
#[must_use]
pub fn fbm(seed: u64, x: f32, y: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut weight = 0.0;

    for octave in 0..octaves {
        let octave_seed = seed.wrapping_add(u64::from(octave).wrapping_mul(GOLDEN_GAMMA));
        total += value_noise(octave_seed, x * frequency, y * frequency) * amplitude;
        weight += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if weight <= f32::EPSILON {
        return 0.0;
    }
    total / weight
}

/// Ridged-fbm: (1 - |2v - 1|)² на октаву — острые гребни вместо мягких холмов
#[must_use]
pub fn ridged_fbm(seed: u64, x: f32, y: f32, octaves: u32, persistence: f32, lacunarity: f32) -> f32 {
    let mut total = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = 1.0;
    let mut weight = 0.0;

    for octave in 0..octaves {
        let octave_seed = seed.wrapping_add(u64::from(octave).wrapping_mul(GOLDEN_GAMMA));
        let v = value_noise(octave_seed, x * frequency, y * frequency);
        let ridge = 1.0 - (2.0 * v - 1.0).abs();
        total += ridge * ridge * amplitude;
        weight += amplitude;
        amplitude *= persistence;
        frequency *= lacunarity;
    }

    if weight <= f32::EPSILON {
        return 0.0;
    }
    total / weight
}

/// Билинейный апсемплинг грубого поля до полного размера сетки
#[must_use]
pub fn upsample_bilinear(
    coarse: &[f32],
    coarse_width: usize,
    coarse_height: usize,
    width: usize,
    height: usize,
) -> Vec<f32> {
    let mut out = vec![0.0; width * height];
    let sx = (coarse_width.max(2) - 1) as f32 / (width.max(2) - 1) as f32;
    let sy = (coarse_height.max(2) - 1) as f32 / (height.max(2) - 1) as f32;

    for y in 0..height {
        let fy = y as f32 * sy;
        let y0 = (fy.floor() as usize).min(coarse_height - 1);
        let y1 = (y0 + 1).min(coarse_height - 1);
        let ty = fy - y0 as f32;

        for x in 0..width {
            let fx = x as f32 * sx;
            let x0 = (fx.floor() as usize).min(coarse_width - 1);
            let x1 = (x0 + 1).min(coarse_width - 1);
            let tx = fx - x0 as f32;

            let g00 = coarse[y0 * coarse_width + x0];
            let g10 = coarse[y0 * coarse_width + x1];
            let g01 = coarse[y1 * coarse_width + x0];
            let g11 = coarse[y1 * coarse_width + x1];

            let top = g00 + (g10 - g00) * tx;
            let bottom = g01 + (g11 - g01) * tx;
            out[y * width + x] = top + (bottom - top) * ty;
        }
    }
    out
}
