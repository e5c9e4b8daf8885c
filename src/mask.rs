// src/mask.rs
//! Маски воды и дистанционные поля.
//!
//! Взаимные ограничения: ocean ⊆ ¬land, lake ⊆ ¬land, ocean ∩ lake = ∅.
//! Внешнее кольцо сетки всегда принудительно не-суша — это гарантирует
//! замкнутую океанскую заливку от границы. Все четыре слоя обязаны
//! пересчитываться после любой стадии, мутирующей высоты.

use crate::heightfield::Heightfield;

/// Значение «не достигнуто» в дистанционных полях
pub const UNREACHED: u32 = u32::MAX;

/// Производные водные слои, согласованные с текущим полем высот
#[derive(Debug, Clone)]
pub struct WaterLayers {
    pub land: Vec<bool>,
    pub ocean: Vec<bool>,
    pub lake: Vec<bool>,
    pub distance_to_ocean: Vec<u32>,
    pub distance_to_land: Vec<u32>,
}

/// Полный вывод водных слоёв из (высоты, уровень моря)
#[must_use]
pub fn derive_water_layers(field: &Heightfield, sea_level: f32) -> WaterLayers {
    let w = field.width;
    let h = field.height;
    let n = w * h;

    // === 1. Маска суши; внешнее кольцо всегда вода ===
    let mut land = vec![false; n];
    for y in 0..h {
        for x in 0..w {
            let idx = y * w + x;
            let border = x == 0 || y == 0 || x == w - 1 || y == h - 1;
            land[idx] = !border && field.elevation[idx] > sea_level;
        }
    }

    // === 2. Океан: многоисточниковая заливка от граничных водных ячеек ===
    let mut ocean = vec![false; n];
    let mut queue: Vec<u32> = Vec::with_capacity(n);
    for x in 0..w {
        push_seed(&mut ocean, &land, &mut queue, x);
        push_seed(&mut ocean, &land, &mut queue, (h - 1) * w + x);
    }
    for y in 0..h {
        push_seed(&mut ocean, &land, &mut queue, y * w);
        push_seed(&mut ocean, &land, &mut queue, y * w + w - 1);
    }
    let mut head = 0;
    while head < queue.len() {
        let idx = queue[head] as usize;
        head += 1;
        let x = idx % w;
        let y = idx / w;
        for (nx, ny) in ortho_neighbors(x, y, w, h) {
            let nidx = ny * w + nx;
            if !land[nidx] && !ocean[nidx] {
                ocean[nidx] = true;
                queue.push(nidx as u32);
            }
        }
    }

    // === 3. Озёра: вода, не достигнутая океанской заливкой ===
    let lake: Vec<bool> = (0..n).map(|i| !land[i] && !ocean[i]).collect();

    // === 4. BFS-дистанции от океана и от суши ===
    let distance_to_ocean = bfs_distance(&ocean, w, h);
    let distance_to_land = bfs_distance(&land, w, h);

    WaterLayers {
        land,
        ocean,
        lake,
        distance_to_ocean,
        distance_to_land,
    }
}

fn push_seed(ocean: &mut [bool], land: &[bool], queue: &mut Vec<u32>, idx: usize) {
    if !land[idx] && !ocean[idx] {
        ocean[idx] = true;
        queue.push(idx as u32);
    }
}

fn ortho_neighbors(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    const OFFSETS: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];
    OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        let nx = x as i32 + dx;
        let ny = y as i32 + dy;
        if nx >= 0 && nx < w as i32 && ny >= 0 && ny < h as i32 {
            Some((nx as usize, ny as usize))
        } else {
            None
        }
    })
}

/// Многоисточниковая BFS-дистанция от всех истинных ячеек маски
#[must_use]
pub fn bfs_distance(sources: &[bool], w: usize, h: usize) -> Vec<u32> {
    let n = w * h;
    let mut dist = vec![UNREACHED; n];
    let mut queue: Vec<u32> = Vec::with_capacity(n);
    for (i, &src) in sources.iter().enumerate() {
        if src {
            dist[i] = 0;
            queue.push(i as u32);
        }
    }
    // Нет источников — поле нулевое, чтобы потребители не делили на бесконечность
    if queue.is_empty() {
        dist.fill(0);
        return dist;
    }

    let mut head = 0;
    while head < queue.len() {
        let idx = queue[head] as usize;
        head += 1;
        let x = idx % w;
        let y = idx / w;
        let next = dist[idx] + 1;
        for (nx, ny) in ortho_neighbors(x, y, w, h) {
            let nidx = ny * w + nx;
            if dist[nidx] > next {
                dist[nidx] = next;
                queue.push(nidx as u32);
            }
        }
    }
    dist
}

/// Число ячеек суши
#[must_use]
pub fn land_area(land: &[bool]) -> usize {
    land.iter().filter(|&&l| l).count()
}

/// Периметр побережья: ячейки суши хотя бы с одним водным ортососедом
#[must_use]
pub fn coast_perimeter(land: &[bool], w: usize, h: usize) -> usize {
    let mut count = 0;
    for y in 0..h {
        for x in 0..w {
            if !land[y * w + x] {
                continue;
            }
            let coastal = ortho_neighbors(x, y, w, h).any(|(nx, ny)| !land[ny * w + nx]);
            if coastal {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Поле 12×12: плато суши с внутренней впадиной
    fn plateau_with_pit() -> Heightfield {
        let w = 12;
        let h = 12;
        let mut data = vec![-0.5; w * h];
        for y in 2..10 {
            for x in 2..10 {
                data[y * w + x] = 0.5;
            }
        }
        data[5 * w + 5] = -0.5; // впадина внутри суши
        Heightfield::from_signed(w, h, data)
    }

    #[test]
    fn masks_are_disjoint_and_border_is_water() {
        let field = plateau_with_pit();
        let layers = derive_water_layers(&field, 0.0);
        for i in 0..field.elevation.len() {
            assert!(!(layers.land[i] && layers.ocean[i]));
            assert!(!(layers.land[i] && layers.lake[i]));
            assert!(!(layers.ocean[i] && layers.lake[i]));
        }
        let w = field.width;
        for x in 0..w {
            assert!(!layers.land[x]);
            assert!(!layers.land[(field.height - 1) * w + x]);
        }
    }

    #[test]
    fn interior_depression_is_a_lake_not_ocean() {
        let field = plateau_with_pit();
        let layers = derive_water_layers(&field, 0.0);
        let pit = 5 * field.width + 5;
        assert!(layers.lake[pit]);
        assert!(!layers.ocean[pit]);
    }

    #[test]
    fn distances_grow_inland() {
        let field = plateau_with_pit();
        let layers = derive_water_layers(&field, 0.0);
        let w = field.width;
        // Центр плато дальше от океана, чем его кромка
        assert!(layers.distance_to_ocean[6 * w + 6] > layers.distance_to_ocean[2 * w + 2]);
        // Ячейки океана на нулевой дистанции
        assert_eq!(layers.distance_to_ocean[0], 0);
        assert_eq!(layers.distance_to_land[6 * w + 6], 0);
    }

    #[test]
    fn perimeter_counts_coastal_cells() {
        let field = plateau_with_pit();
        let layers = derive_water_layers(&field, 0.0);
        let p = coast_perimeter(&layers.land, field.width, field.height);
        assert!(p > 0 && p < land_area(&layers.land));
    }
}
