// src/hydrology.rs
//! Дренаж и речная сеть.
//!
//! Поток: наискорейший спуск по 8 соседям + топологическое накопление по
//! корзинам высот (без рекурсии и без очереди с приоритетами — порядок
//! дренажа требует только упорядоченности по высоте). Реки растут ярусами:
//! магистральные истоки → трассировка → притоки → добор покрытия →
//! принудительная магистраль. Все тай-брейки — хешированные, а не по
//! порядку обхода массива.

use crate::config::{Controls, SizeClass};
use crate::heightfield::Heightfield;
use crate::identity::stage_seed;
use crate::mask::{WaterLayers, land_area};
use crate::noise::cell_salt;

const DIRECTIONS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Число корзин высот для топологического накопления
const FLOW_BINS: usize = 256;

/// Слои дренажа
#[derive(Debug, Clone)]
pub struct FlowLayers {
    /// Индекс наискорейшего нижнего соседа или -1
    pub downstream: Vec<i32>,
    /// Сырое накопление: число ячеек суши, дренирующих через ячейку (включая её саму)
    pub accumulation: Vec<f32>,
    /// Лог-нормированное накопление в [0, 1]
    pub flow: Vec<f32>,
}

/// Направление стока и накопление потока для текущего поля высот
#[must_use]
pub fn compute_flow(field: &Heightfield, water: &WaterLayers, seed_hash: u64) -> FlowLayers {
    let w = field.width;
    let h = field.height;
    let n = w * h;
    let s_tie = stage_seed(seed_hash, "flow-tiebreak");

    // === 1. Наискорейший спуск с хешированным тай-брейком ===
    let mut downstream = vec![-1_i32; n];
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if !water.land[idx] {
                continue;
            }
            let e = field.elevation[idx];
            let mut best_drop = 0.0_f32;
            let mut best_salt = 0_u64;
            let mut best = -1_i32;
            for (dir, &(dx, dy)) in DIRECTIONS.iter().enumerate() {
                let nx = x as i32 + dx;
                let ny = y as i32 + dy;
                if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
                    continue;
                }
                let nidx = (ny as usize) * w + nx as usize;
                let drop = e - field.elevation[nidx];
                if drop <= 0.0 {
                    continue;
                }
                let salt = cell_salt(s_tie, idx, dir as u32);
                if drop > best_drop || (drop == best_drop && salt > best_salt) {
                    best_drop = drop;
                    best_salt = salt;
                    best = nidx as i32;
                }
            }
            downstream[idx] = best;
        }
    }

    // === 2. Корзины по высоте, обход сверху вниз ===
    let mut min_e = f32::INFINITY;
    let mut max_e = f32::NEG_INFINITY;
    for i in 0..n {
        if water.land[i] {
            min_e = min_e.min(field.elevation[i]);
            max_e = max_e.max(field.elevation[i]);
        }
    }

    let mut accumulation = vec![0.0_f32; n];
    let mut flow = vec![0.0_f32; n];
    if !min_e.is_finite() {
        // Суши нет вовсе
        return FlowLayers {
            downstream,
            accumulation,
            flow,
        };
    }

    let range = (max_e - min_e).max(f32::EPSILON);
    let scale = (FLOW_BINS - 1) as f32 / range;
    let mut bins: Vec<Vec<u32>> = vec![Vec::new(); FLOW_BINS];
    for i in 0..n {
        if water.land[i] {
            accumulation[i] = 1.0;
            let bin = ((field.elevation[i] - min_e) * scale) as usize;
            bins[bin.min(FLOW_BINS - 1)].push(i as u32);
        }
    }

    let mut max_acc = 1.0_f32;
    for bin in bins.iter_mut().rev() {
        // Внутри корзины — тоже по убыванию высоты, чтобы сток внутри одной
        // корзины не обгонял собственный источник
        bin.sort_unstable_by(|&a, &b| {
            field.elevation[b as usize]
                .partial_cmp(&field.elevation[a as usize])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        for &idx in bin.iter() {
            let idx = idx as usize;
            let target = downstream[idx];
            if target >= 0 {
                accumulation[target as usize] += accumulation[idx];
                if water.land[target as usize] {
                    max_acc = max_acc.max(accumulation[target as usize]);
                }
            }
        }
    }

    // === 3. Лог-нормировка ===
    let log_max = (1.0 + max_acc).ln();
    for i in 0..n {
        if water.land[i] {
            flow[i] = (1.0 + accumulation[i]).ln() / log_max;
        }
    }

    FlowLayers {
        downstream,
        accumulation,
        flow,
    }
}

// --- Параметры речной сети (эмпирика; контракт — качественное поведение) ---

const TRUNK_FLOW_THRESHOLD: f32 = 0.52;
const TRUNK_MIN_ELEVATION: f32 = 0.10;
const TRIBUTARY_FLOW_THRESHOLD: f32 = 0.34;
const FALLBACK_FLOW_THRESHOLD: f32 = 0.20;
const TRUNK_MIN_LENGTH: usize = 6;
const TRIBUTARY_MIN_LENGTH: usize = 4;
const TRUNK_MIN_DROP: f32 = 0.04;
const TRIBUTARY_MIN_DROP: f32 = 0.015;
const COVERAGE_FRACTION: f32 = 0.0035;
const FORCING_FLOW_THRESHOLD: f32 = 0.30;

#[derive(Clone, Copy)]
struct Candidate {
    idx: usize,
    score: f32,
}

enum TraceOutcome {
    Ocean,
    Merged,
    Dead,
}

/// Извлечение речной сети по ярусам. Реки ⊆ суша, всегда.
#[must_use]
pub fn extract_rivers(
    field: &Heightfield,
    water: &WaterLayers,
    flow: &FlowLayers,
    moisture: &[f32],
    controls: &Controls,
    sea_level: f32,
) -> Vec<bool> {
    let w = field.width;
    let h = field.height;
    let n = w * h;
    let rivers_weight = controls.biome_mix.rivers;

    // Нулевой вес рек гарантирует ровно ноль речных ячеек
    if rivers_weight < 0.01 {
        return vec![false; n];
    }

    let mut river = vec![false; n];
    let mut sources: Vec<(i32, i32)> = Vec::new();
    let mut visited = vec![false; n];

    let spacing = (w.min(h) / 20).max(6) as i32;
    let spacing2 = spacing * spacing;
    let max_steps = w + h;
    let max_dist = water
        .distance_to_ocean
        .iter()
        .zip(water.land.iter())
        .filter(|&(_, &l)| l)
        .map(|(&d, _)| d)
        .max()
        .unwrap_or(0)
        .max(1) as f32;

    let score_of = |idx: usize| {
        let inland = water.distance_to_ocean[idx] as f32 / max_dist;
        flow.flow[idx] * (1.0 + inland) + field.elevation01[idx] * 0.3 + moisture[idx] * 0.2
    };

    // === Ярус 1: магистральные истоки ===
    let trunk_pool = collect_candidates(
        field,
        water,
        flow,
        sea_level,
        TRUNK_FLOW_THRESHOLD,
        TRUNK_MIN_ELEVATION,
        score_of,
    );
    let source_budget = ((land_area(&water.land) as f32).sqrt() * 0.35).max(3.0) as usize;
    let inland_cut = (max_dist * 0.45) as u32;
    let inland_quota = source_budget / 3;

    let mut accepted = 0;
    // Сначала внутренняя субквота: истоки глубоко на суше
    for pass in 0..2 {
        for cand in &trunk_pool {
            if accepted >= source_budget {
                break;
            }
            let inland_enough = water.distance_to_ocean[cand.idx] >= inland_cut;
            if pass == 0 && (!inland_enough || accepted >= inland_quota) {
                continue;
            }
            if !spaced_enough(cand.idx, w, &sources, spacing2) {
                continue;
            }
            let outcome = trace_river(
                field,
                water,
                flow,
                &mut river,
                &mut visited,
                cand.idx,
                max_steps,
                TRUNK_MIN_LENGTH,
                TRUNK_MIN_DROP,
                false,
            );
            if outcome.is_some() {
                sources.push(((cand.idx % w) as i32, (cand.idx / w) as i32));
                accepted += 1;
            }
        }
    }

    // === Ярус 3: притоки — обязаны влиться в существующую реку ===
    let tributary_pool = collect_candidates(
        field,
        water,
        flow,
        sea_level,
        TRIBUTARY_FLOW_THRESHOLD,
        TRUNK_MIN_ELEVATION * 0.6,
        score_of,
    );
    let tributary_spacing2 = (spacing / 2).max(3).pow(2);
    for cand in &tributary_pool {
        if river[cand.idx] || !spaced_enough(cand.idx, w, &sources, tributary_spacing2) {
            continue;
        }
        let outcome = trace_river(
            field,
            water,
            flow,
            &mut river,
            &mut visited,
            cand.idx,
            max_steps,
            TRIBUTARY_MIN_LENGTH,
            TRIBUTARY_MIN_DROP,
            true,
        );
        if outcome.is_some() {
            sources.push(((cand.idx % w) as i32, (cand.idx / w) as i32));
        }
    }

    // === Ярус 4: добор покрытия при нехватке речных ячеек ===
    let coverage_target = (n as f32 * COVERAGE_FRACTION * rivers_weight * 2.0) as usize;
    if river.iter().filter(|&&r| r).count() < coverage_target {
        let fallback_pool = collect_candidates(
            field,
            water,
            flow,
            sea_level,
            FALLBACK_FLOW_THRESHOLD,
            0.02,
            score_of,
        );
        for cand in &fallback_pool {
            if river.iter().filter(|&&r| r).count() >= coverage_target {
                break;
            }
            if river[cand.idx] || !spaced_enough(cand.idx, w, &sources, tributary_spacing2) {
                continue;
            }
            let outcome = trace_river(
                field,
                water,
                flow,
                &mut river,
                &mut visited,
                cand.idx,
                max_steps,
                TRIBUTARY_MIN_LENGTH,
                TRIBUTARY_MIN_DROP,
                false,
            );
            if outcome.is_some() {
                sources.push(((cand.idx % w) as i32, (cand.idx / w) as i32));
            }
        }
    }

    // === Ярус 5: принудительная магистраль на крупных картах ===
    let area = n;
    let landmass = land_area(&water.land);
    if controls.size != SizeClass::Isle && landmass * 4 > area {
        let target_len = ((area as f32).sqrt() * 0.3) as usize;
        if largest_component(&river, w, h) < target_len {
            let forcing_cut = (max_dist * 0.6) as u32;
            let mut forcing_pool = collect_candidates(
                field,
                water,
                flow,
                sea_level,
                FORCING_FLOW_THRESHOLD,
                0.04,
                score_of,
            );
            forcing_pool.retain(|c| water.distance_to_ocean[c.idx] >= forcing_cut);
            for cand in &forcing_pool {
                if river[cand.idx] {
                    continue;
                }
                let outcome = trace_river(
                    field,
                    water,
                    flow,
                    &mut river,
                    &mut visited,
                    cand.idx,
                    max_steps * 2,
                    TRUNK_MIN_LENGTH,
                    TRUNK_MIN_DROP * 0.5,
                    false,
                );
                if outcome.is_some() && largest_component(&river, w, h) >= target_len {
                    break;
                }
            }
        }
    }

    river
}

fn collect_candidates(
    field: &Heightfield,
    water: &WaterLayers,
    flow: &FlowLayers,
    sea_level: f32,
    flow_threshold: f32,
    min_elevation: f32,
    score_of: impl Fn(usize) -> f32,
) -> Vec<Candidate> {
    let mut pool: Vec<Candidate> = (0..field.elevation.len())
        .filter(|&i| {
            water.land[i]
                && flow.flow[i] >= flow_threshold
                && field.elevation[i] - sea_level >= min_elevation
        })
        .map(|idx| Candidate {
            idx,
            score: score_of(idx),
        })
        .collect();
    // Сортировка по убыванию балла, тай-брейк по индексу — порядок воспроизводим
    pool.sort_unstable_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.idx.cmp(&b.idx))
    });
    pool
}

fn spaced_enough(idx: usize, w: usize, sources: &[(i32, i32)], spacing2: i32) -> bool {
    let x = (idx % w) as i32;
    let y = (idx / w) as i32;
    sources
        .iter()
        .all(|&(sx, sy)| (sx - x).pow(2) + (sy - y).pow(2) >= spacing2)
}

/// Трассировка от истока вниз по стоку; фиксация только при приёмке.
#[allow(clippy::too_many_arguments)]
fn trace_river(
    field: &Heightfield,
    water: &WaterLayers,
    flow: &FlowLayers,
    river: &mut [bool],
    visited: &mut [bool],
    start: usize,
    max_steps: usize,
    min_length: usize,
    min_drop: f32,
    require_merge: bool,
) -> Option<TraceOutcome> {
    let w = field.width;
    let h = field.height;
    let mut path: Vec<usize> = Vec::with_capacity(max_steps.min(1024));
    let mut cur = start;
    let mut outcome = TraceOutcome::Dead;

    for _ in 0..max_steps {
        if !water.land[cur] {
            outcome = TraceOutcome::Ocean;
            break;
        }
        if river[cur] {
            outcome = TraceOutcome::Merged;
            break;
        }
        visited[cur] = true;
        path.push(cur);

        let mut next = flow.downstream[cur];
        if next >= 0 && visited[next as usize] {
            next = -1;
        }
        if next < 0 {
            // Нет направления стока — берём низшего непосещённого соседа
            next = lowest_unvisited_neighbor(field, visited, cur, w, h);
        }
        if next < 0 {
            break;
        }
        cur = next as usize;
    }

    for &p in &path {
        visited[p] = false;
    }

    let accepted = match outcome {
        TraceOutcome::Dead => false,
        TraceOutcome::Ocean => !require_merge,
        TraceOutcome::Merged => true,
    } && path.len() >= min_length
        && field.elevation[start] - field.elevation[*path.last()?] >= min_drop;

    if !accepted {
        return None;
    }
    for &p in &path {
        river[p] = true;
    }
    Some(outcome)
}

fn lowest_unvisited_neighbor(
    field: &Heightfield,
    visited: &[bool],
    idx: usize,
    w: usize,
    h: usize,
) -> i32 {
    let x = (idx % w) as i32;
    let y = (idx / w) as i32;
    let mut best = -1_i32;
    let mut best_e = f32::INFINITY;
    for &(dx, dy) in &DIRECTIONS {
        let nx = x + dx;
        let ny = y + dy;
        if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
            continue;
        }
        let nidx = (ny as usize) * w + nx as usize;
        if visited[nidx] {
            continue;
        }
        let e = field.elevation[nidx];
        if e < best_e {
            best_e = e;
            best = nidx as i32;
        }
    }
    best
}

/// Размер крупнейшей 8-связной речной компоненты
#[must_use]
pub fn largest_component(river: &[bool], w: usize, h: usize) -> usize {
    let mut seen = vec![false; river.len()];
    let mut stack: Vec<u32> = Vec::new();
    let mut largest = 0;

    for start in 0..river.len() {
        if !river[start] || seen[start] {
            continue;
        }
        let mut size = 0;
        seen[start] = true;
        stack.push(start as u32);
        while let Some(idx) = stack.pop() {
            let idx = idx as usize;
            size += 1;
            let x = (idx % w) as i32;
            let y = (idx / w) as i32;
            for &(dx, dy) in &DIRECTIONS {
                let nx = x + dx;
                let ny = y + dy;
                if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
                    continue;
                }
                let nidx = (ny as usize) * w + nx as usize;
                if river[nidx] && !seen[nidx] {
                    seen[nidx] = true;
                    stack.push(nidx as u32);
                }
            }
        }
        largest = largest.max(size);
    }
    largest
}

/// Врезание русел: радиально затухающая, взвешенная потоком глубина вокруг
/// каждой речной ячейки. Речные ячейки не опускаются ниже уровня моря.
pub fn incise_rivers(
    field: &mut Heightfield,
    river: &[bool],
    flow: &[f32],
    sea_level: f32,
    strength: f32,
) {
    let w = field.width;
    let h = field.height;
    const RADIUS: i32 = 2;

    let mut carve = vec![0.0_f32; field.elevation.len()];
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            if !river[idx] {
                continue;
            }
            let depth = strength * (0.4 + 0.6 * flow[idx]);
            for dy in -RADIUS..=RADIUS {
                for dx in -RADIUS..=RADIUS {
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || nx >= w as i32 || ny < 0 || ny >= h as i32 {
                        continue;
                    }
                    let dist = ((dx * dx + dy * dy) as f32).sqrt();
                    let taper = (1.0 - dist / 2.5).max(0.0);
                    carve[(ny as usize) * w + nx as usize] += depth * taper;
                }
            }
        }
    }

    for i in 0..field.elevation.len() {
        if carve[i] > 0.0 {
            field.elevation[i] = (field.elevation[i] - carve[i]).max(-1.0);
        }
        // Русло остаётся сушей: зажим чуть выше уровня моря
        if river[i] && field.elevation[i] <= sea_level {
            field.elevation[i] = sea_level + 1e-4;
        }
    }
    field.sync_unsigned();
}

/// Релаксация крутых склонов к среднему 4 соседей, пропорционально превышению
pub fn slope_feedback(field: &mut Heightfield, land: &[bool], threshold: f32, strength: f32) {
    let w = field.width;
    let h = field.height;
    let snapshot = field.elevation.clone();

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let idx = y * w + x;
            if !land[idx] {
                continue;
            }
            let avg = (snapshot[idx - 1]
                + snapshot[idx + 1]
                + snapshot[idx - w]
                + snapshot[idx + w])
                * 0.25;
            let excess = (snapshot[idx] - avg).abs() - threshold;
            if excess > 0.0 {
                let pull = (excess * strength).min(1.0);
                field.elevation[idx] += (avg - snapshot[idx]) * pull;
            }
        }
    }
    field.sync_unsigned();
}

/// Долинная обратная связь: резка пропорционально потоку и локальному уклону
pub fn valley_feedback(field: &mut Heightfield, land: &[bool], flow: &[f32], strength: f32) {
    let w = field.width;
    let h = field.height;
    let snapshot = field.elevation.clone();

    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let idx = y * w + x;
            if !land[idx] {
                continue;
            }
            let avg = (snapshot[idx - 1]
                + snapshot[idx + 1]
                + snapshot[idx - w]
                + snapshot[idx + w])
                * 0.25;
            let slope = (snapshot[idx] - avg).max(0.0);
            field.elevation[idx] -= flow[idx] * slope * strength;
        }
    }
    field.sync_unsigned();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::derive_water_layers;

    /// 3×3, вся сетка — суша, высоты воронкой к углу (0,0)
    fn funnel_3x3() -> (Heightfield, WaterLayers) {
        let data: Vec<f32> = (0..9)
            .map(|i| {
                let x = i % 3;
                let y = i / 3;
                0.1 * x.max(y) as f32 + 0.01 * x.min(y) as f32
            })
            .collect();
        let field = Heightfield::from_signed(3, 3, data);
        let n = 9;
        let water = WaterLayers {
            land: vec![true; n],
            ocean: vec![false; n],
            lake: vec![false; n],
            distance_to_ocean: vec![1; n],
            distance_to_land: vec![0; n],
        };
        (field, water)
    }

    /// 5×5: кольцо океана вокруг блока суши 3×3
    fn islet_5x5() -> (Heightfield, WaterLayers) {
        let w = 5;
        let mut data = vec![-0.5_f32; w * w];
        for y in 1..4 {
            for x in 1..4 {
                data[y * w + x] = 0.1 + 0.05 * (x + y) as f32;
            }
        }
        let field = Heightfield::from_signed(w, w, data);
        let water = derive_water_layers(&field, 0.0);
        (field, water)
    }

    #[test]
    fn flow_is_conserved_at_the_outlet() {
        let (field, water) = funnel_3x3();
        assert_eq!(land_area(&water.land), 9);

        let flow = compute_flow(&field, &water, 42);
        // Единственный сток: низшая ячейка без нижнего соседа
        assert_eq!(flow.downstream[0], -1);
        // Каждая ячейка суши вносит единицу собственного стока
        assert_eq!(flow.accumulation[0] as u32, 9);
    }

    #[test]
    fn downstream_is_strictly_descending() {
        let (field, water) = funnel_3x3();
        let flow = compute_flow(&field, &water, 42);
        for i in 0..9 {
            if flow.downstream[i] >= 0 {
                assert!(field.elevation[flow.downstream[i] as usize] < field.elevation[i]);
            }
        }
    }

    #[test]
    fn flow_tiebreaks_are_seed_stable() {
        let (field, water) = islet_5x5();
        let a = compute_flow(&field, &water, 7);
        let b = compute_flow(&field, &water, 7);
        assert_eq!(a.downstream, b.downstream);
        assert_eq!(a.flow, b.flow);
    }

    #[test]
    fn zero_river_weight_yields_no_rivers() {
        let (field, water) = islet_5x5();
        let flow = compute_flow(&field, &water, 42);
        let mut controls = Controls::default();
        controls.biome_mix.rivers = 0.0;
        let moisture = vec![0.5; 25];
        let river = extract_rivers(&field, &water, &flow, &moisture, &controls, 0.0);
        assert!(river.iter().all(|&r| !r));
    }

    #[test]
    fn incision_never_drowns_river_cells() {
        let (mut field, _water) = islet_5x5();
        let mut river = vec![false; 25];
        river[2 * 5 + 2] = true;
        let flow = vec![1.0; 25];
        incise_rivers(&mut field, &river, &flow, 0.0, 0.5);
        assert!(field.elevation[2 * 5 + 2] > 0.0);
    }

    #[test]
    fn largest_component_counts_eight_connected() {
        let mut river = vec![false; 25];
        river[6] = true;
        river[12] = true; // диагональный сосед 6 при w=5
        river[18] = true;
        river[4] = true; // вне диагональной досягаемости цепочки
        assert_eq!(largest_component(&river, 5, 5), 3);
    }
}
