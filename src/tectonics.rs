// src/tectonics.rs
//! Тектонический каркас: синтетические плиты, базовое поле высот,
//! силуэт континента и ориентированные по стрессу хребты.
//!
//! Плиты — не физика, а прокси: позиция, единичный вектор дрейфа и скалярный
//! аплифт. Непрерывное поле получается взвешиванием обратным квадратом
//! расстояния по всем плитам сразу, без жёстких границ Вороного.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::config::Controls;
use crate::heightfield::Heightfield;
use crate::identity::stage_seed;
use crate::noise::{fbm, ridged_fbm, upsample_bilinear};

/// Синтетическая плита
#[derive(Debug, Clone, Copy)]
pub struct Plate {
    pub x: f32,
    pub y: f32,
    pub drift_x: f32,
    pub drift_y: f32,
    pub uplift: f32,
}

/// Непрерывное поле плит
#[derive(Debug, Clone)]
pub struct PlateField {
    plates: Vec<Plate>,
}

impl PlateField {
    /// Генерирует плиты из сидированного потока ChaCha8
    #[must_use]
    pub fn generate(seed_hash: u64, count: usize) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(stage_seed(seed_hash, "plates"));
        let plates = (0..count)
            .map(|_| {
                let x = rng.gen_range(0.0..1.0);
                let y = rng.gen_range(0.0..1.0);
                let angle = rng.gen_range(0.0..std::f32::consts::TAU);
                let uplift: f32 = rng.gen_range(-1.0..1.0);
                Plate {
                    x,
                    y,
                    drift_x: angle.cos(),
                    drift_y: angle.sin(),
                    // лёгкий сдвиг вверх, чтобы поле не было чисто океаническим
                    uplift: uplift * 0.9 + 0.1,
                }
            })
            .collect();
        Self { plates }
    }

    #[must_use]
    pub fn plates(&self) -> &[Plate] {
        &self.plates
    }

    /// Взвешенное обратным квадратом расстояния среднее (аплифт, дрейф)
    #[must_use]
    pub fn sample(&self, nx: f32, ny: f32, aspect: f32) -> (f32, f32, f32) {
        let mut uplift = 0.0;
        let mut drift_x = 0.0;
        let mut drift_y = 0.0;
        let mut total = 0.0;
        for p in &self.plates {
            let ex = (nx - p.x) * aspect;
            let ey = ny - p.y;
            let d2 = ex * ex + ey * ey;
            let w = 1.0 / (d2 + 0.004);
            uplift += p.uplift * w;
            drift_x += p.drift_x * w;
            drift_y += p.drift_y * w;
            total += w;
        }
        (uplift / total, drift_x / total, drift_y / total)
    }
}

/// Слои тектонической стадии в полном разрешении
#[derive(Debug, Clone)]
pub struct TectonicLayers {
    pub elevation: Vec<f32>,
    pub ridge: Vec<f32>,
    pub stress_x: Vec<f32>,
    pub stress_y: Vec<f32>,
    pub stress: Vec<f32>,
}

fn smoothstep01(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Базовое поле высот: плиты + шум на грубой сетке, апсемплинг, силуэт.
///
/// Дорогие вычисления идут на уменьшенной сетке (коэффициент суперсемплинга
/// класса размера), что снижает стоимость в квадрат коэффициента и сохраняет
/// гладкую макроформу.
#[must_use]
pub fn synthesize_base(controls: &Controls, width: usize, height: usize) -> TectonicLayers {
    let seed = controls.seed_hash();
    let aspect = width as f32 / height as f32;
    let field = PlateField::generate(seed, controls.plate_count());

    let ss = controls.size.supersample();
    let cw = (width + ss - 1) / ss + 1;
    let ch = (height + ss - 1) / ss + 1;

    let relief = 0.4 + controls.relief / 10.0 * 1.2;
    let frag = controls.fragmentation / 10.0;
    let islands = controls.island_density / 10.0;

    let s_cont = stage_seed(seed, "continental");
    let s_detail = stage_seed(seed, "detail");
    let s_ridge = stage_seed(seed, "ridge");
    let s_basin = stage_seed(seed, "basin");
    let s_frag = stage_seed(seed, "fragment");
    let s_isle = stage_seed(seed, "islands");
    let s_dir = stage_seed(seed, "stress-dir");

    // === 1. Грубая сетка: плиты + многочастотный шум ===
    let coarse: Vec<[f32; 5]> = (0..cw * ch)
        .into_par_iter()
        .map(|i| {
            let cx = i % cw;
            let cy = i / cw;
            let nx = cx as f32 / (cw - 1) as f32;
            let ny = cy as f32 / (ch - 1) as f32;
            let px = nx * aspect;
            let py = ny;

            let (uplift, dx, dy) = field.sample(nx, ny, aspect);

            // Сходимость дрейфа: аплифт чуть дальше по дрейфу минус локальный
            let (ahead, _, _) = field.sample(nx + dx * 0.06, ny + dy * 0.06, aspect);
            let band = (ahead - uplift) * 1.2;

            let cont = fbm(s_cont, px * 2.6, py * 2.6, 4, 0.55, 2.0) * 2.0 - 1.0;
            let detail = fbm(s_detail, px * 7.0, py * 7.0, 5, 0.5, 2.0) * 2.0 - 1.0;
            let ridge = ridged_fbm(s_ridge, px * 4.5, py * 4.5, 4, 0.5, 2.0);
            let basin = fbm(s_basin, px * 1.4, py * 1.4, 3, 0.6, 2.0) * 2.0 - 1.0;
            let fragment = fbm(s_frag, px * 5.2, py * 5.2, 4, 0.5, 2.0) * 2.0 - 1.0;
            let isle = fbm(s_isle, px * 10.0, py * 10.0, 3, 0.5, 2.0);

            let mut elev = uplift * 0.62
                + cont * 0.5
                + band * 0.35
                + detail * 0.22 * relief
                + (ridge - 0.45) * 0.38 * relief
                - basin.max(0.0) * 0.3
                + fragment * frag * 0.35
                + isle * isle * islands * 0.45;
            elev = elev.clamp(-2.0, 2.0);

            // Когерентность дрейфа: единичные дрейфы гасят друг друга на стыках
            let drift_mag = (dx * dx + dy * dy).sqrt();
            let stress = (1.0 - drift_mag).clamp(0.0, 1.0);
            let angle = dy.atan2(dx) + (fbm(s_dir, px * 2.0, py * 2.0, 3, 0.5, 2.0) - 0.5) * 1.2;

            [elev, ridge, angle.cos(), angle.sin(), stress]
        })
        .collect();

    let mut c_elev = vec![0.0; cw * ch];
    let mut c_ridge = vec![0.0; cw * ch];
    let mut c_sx = vec![0.0; cw * ch];
    let mut c_sy = vec![0.0; cw * ch];
    let mut c_stress = vec![0.0; cw * ch];
    for (i, cell) in coarse.iter().enumerate() {
        c_elev[i] = cell[0];
        c_ridge[i] = cell[1];
        c_sx[i] = cell[2];
        c_sy[i] = cell[3];
        c_stress[i] = cell[4];
    }

    // === 2. Сглаживание поля стресса (2 box-прохода) ===
    for _ in 0..2 {
        c_stress = box_blur(&c_stress, cw, ch);
    }

    // === 3. Апсемплинг до полной сетки ===
    let mut elevation = upsample_bilinear(&c_elev, cw, ch, width, height);
    let ridge = upsample_bilinear(&c_ridge, cw, ch, width, height);
    let stress_x = upsample_bilinear(&c_sx, cw, ch, width, height);
    let stress_y = upsample_bilinear(&c_sy, cw, ch, width, height);
    let stress = upsample_bilinear(&c_stress, cw, ch, width, height);

    // === 4. Силуэт: виньетка по краю + искажённый суперэллипс ===
    apply_boundary_falloff(&mut elevation, width, height, seed, aspect);

    TectonicLayers {
        elevation,
        ridge,
        stress_x,
        stress_y,
        stress,
    }
}

/// Комбинированный спад к границе: защита от прямоугольных и идеально
/// круглых береговых линий сразу
fn apply_boundary_falloff(elevation: &mut [f32], width: usize, height: usize, seed: u64, aspect: f32) {
    let s_edge = stage_seed(seed, "edge-warp");
    let s_power = stage_seed(seed, "contour-power");
    let s_contour = stage_seed(seed, "contour-radius");

    elevation
        .par_iter_mut()
        .enumerate()
        .for_each(|(i, e)| {
            let x = i % width;
            let y = i / width;
            let nx = x as f32 / (width - 1) as f32;
            let ny = y as f32 / (height - 1) as f32;
            let px = nx * aspect;
            let py = ny;

            // (а) мягкая виньетка по расстоянию до края с шумовым искажением
            let edge = nx.min(1.0 - nx).min(ny.min(1.0 - ny)) * 2.0;
            let warped_edge =
                edge + (fbm(s_edge, px * 6.0, py * 6.0, 3, 0.5, 2.0) * 2.0 - 1.0) * 0.08;
            let vignette = 1.0 - smoothstep01(warped_edge / 0.28);

            // (б) искажённый суперэллипс — некруглый и непрямоугольный контур
            let cx = (nx * 2.0 - 1.0) / 0.95;
            let cy = (ny * 2.0 - 1.0) / 0.95;
            let power = 2.7 + (fbm(s_power, px * 2.2, py * 2.2, 3, 0.5, 2.0) - 0.5) * 1.4;
            let contour = 0.78 + (fbm(s_contour, px * 3.1, py * 3.1, 3, 0.5, 2.0) - 0.5) * 0.35;
            let radius = (cx.abs().powf(power) + cy.abs().powf(power)).powf(1.0 / power);
            let radial = smoothstep01((radius - contour) / 0.33);

            *e -= vignette.max(radial) * 1.45;
        });
}

/// Впечатывает хребты и долины, ориентированные по полю стресса.
///
/// Для ячеек выше рельефозависимого порога строится локальный повёрнутый
/// базис по направлению стресса; ridged-fbm в нём вытягивает гребни вдоль
/// синтетических тектонических осей, а не по фиксированной мировой частоте.
pub fn imprint_ridges(
    field: &mut Heightfield,
    layers: &mut TectonicLayers,
    controls: &Controls,
) {
    let seed = controls.seed_hash();
    let s_crest = stage_seed(seed, "crest");
    let s_spine = stage_seed(seed, "spine");
    let width = field.width;
    let height = field.height;
    let aspect = width as f32 / height as f32;

    let relief01 = controls.relief / 10.0;
    let peak01 = controls.peakiness / 10.0;
    let threshold = 0.05 + (1.0 - relief01) * 0.25;
    let strength = 0.35 + peak01 * 0.5;

    let deltas: Vec<(f32, f32)> = (0..width * height)
        .into_par_iter()
        .map(|i| {
            let e = field.elevation[i];
            if e <= threshold {
                return (0.0, 0.0);
            }
            let x = i % width;
            let y = i / width;
            let px = x as f32 / (width - 1) as f32 * aspect;
            let py = y as f32 / (height - 1) as f32;

            let s = layers.stress[i];
            let ux = layers.stress_x[i];
            let uy = layers.stress_y[i];

            // Повёрнутые координаты: u вдоль стресса, v поперёк
            let u = px * ux + py * uy;
            let v = -px * uy + py * ux;
            let freq = 6.0 + s * 14.0;

            let crest = ridged_fbm(s_crest, u * freq * 0.4, v * freq, 4, 0.5, 2.0);
            let spine = ridged_fbm(s_spine, u * 2.2, v * 5.0, 3, 0.5, 2.0);

            let gate = smoothstep01((e - threshold) / 0.25);
            let delta = (crest * 0.65 + spine * 0.5 - 0.5) * gate * strength * (0.4 + s * 0.9);
            (delta, crest * gate)
        })
        .collect();

    for (i, &(delta, crest)) in deltas.iter().enumerate() {
        field.elevation[i] += delta;
        if crest > layers.ridge[i] {
            layers.ridge[i] = crest;
        }
    }
    field.normalize_signed();
}

fn box_blur(values: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for y in 0..height {
        for x in 0..width {
            let mut sum = 0.0;
            let mut count = 0.0;
            for dy in -1_i32..=1 {
                for dx in -1_i32..=1 {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx >= 0 && nx < width as i32 && ny >= 0 && ny < height as i32 {
                        sum += values[(ny as usize) * width + nx as usize];
                        count += 1.0;
                    }
                }
            }
            out[y * width + x] = sum / count;
        }
    }
    out
}
