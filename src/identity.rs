// src/identity.rs
//! Отпечаток детерминизма: хеш контролов + контрольные суммы итоговых слоёв.
//!
//! Два вызова генерации с одинаковыми (нормализованными) контролами обязаны
//! дать одинаковую строку отпечатка; любое расхождение в любом массиве с
//! высокой вероятностью её меняет.

use crate::config::Controls;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64 по байтам
#[must_use]
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    fnv1a64_with(FNV_OFFSET, bytes)
}

/// Продолжение FNV-1a от заданного состояния (цепочки хешей)
#[must_use]
pub fn fnv1a64_with(state: u64, bytes: &[u8]) -> u64 {
    let mut h = state;
    for &b in bytes {
        h ^= u64::from(b);
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Дочерний сид стадии: хеш сида, продолженный меткой стадии
#[must_use]
pub fn stage_seed(seed_hash: u64, label: &str) -> u64 {
    fnv1a64_with(seed_hash, label.as_bytes())
}

/// Контрольная сумма массива f32 по битовым представлениям
#[must_use]
pub fn checksum_f32(values: &[f32]) -> u64 {
    let mut h = FNV_OFFSET;
    for v in values {
        h = fnv1a64_with(h, &v.to_bits().to_le_bytes());
    }
    h
}

/// Контрольная сумма битовой маски
#[must_use]
pub fn checksum_mask(mask: &[bool]) -> u64 {
    let mut h = FNV_OFFSET;
    for &m in mask {
        h ^= u64::from(u8::from(m));
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Контрольная сумма байтового массива (идентификаторы биомов)
#[must_use]
pub fn checksum_bytes(values: &[u8]) -> u64 {
    fnv1a64(values)
}

/// Каноническая key=value строка контролов (фиксированный порядок ключей)
#[must_use]
pub fn controls_key(controls: &Controls) -> String {
    let c = controls.normalized();
    let m = c.biome_mix;
    format!(
        "v1;seed={};size={:?};aspect={:?};land={};relief={};frag={};smooth={};\
         latc={};lats={};peak={};isl={};clim={};plates={};\
         mix={},{},{},{},{},{},{}",
        c.seed,
        c.size,
        c.aspect,
        c.land_fraction,
        c.relief,
        c.fragmentation,
        c.coastal_smoothing,
        c.latitude_center,
        c.latitude_span,
        c.peakiness,
        c.island_density,
        c.climate_bias,
        c.plate_bias,
        m.grassland,
        m.forest,
        m.rainforest,
        m.desert,
        m.tundra,
        m.mountains,
        m.rivers
    )
}

/// Хеш канонической строки контролов
#[must_use]
pub fn controls_hash(controls: &Controls) -> u64 {
    fnv1a64(controls_key(controls).as_bytes())
}

/// Итоговый отпечаток карты: хеш контролов + суммы ключевых слоёв
#[must_use]
pub fn identity_hash(
    controls_hash: u64,
    elevation01: &[f32],
    land: &[bool],
    river: &[bool],
    biome_ids: &[u8],
) -> String {
    let mut h = controls_hash;
    h = fnv1a64_with(h, &checksum_f32(elevation01).to_le_bytes());
    h = fnv1a64_with(h, &checksum_mask(land).to_le_bytes());
    h = fnv1a64_with(h, &checksum_mask(river).to_le_bytes());
    h = fnv1a64_with(h, &checksum_bytes(biome_ids).to_le_bytes());
    format!("{h:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_hash_ignores_seed_casing() {
        let a = Controls {
            seed: "Demo".into(),
            ..Controls::default()
        };
        let b = Controls {
            seed: "demo".into(),
            ..Controls::default()
        };
        assert_eq!(controls_hash(&a), controls_hash(&b));
    }

    #[test]
    fn any_layer_change_moves_the_fingerprint() {
        let elev = vec![0.5_f32; 16];
        let land = vec![true; 16];
        let river = vec![false; 16];
        let biome = vec![4_u8; 16];

        let base = identity_hash(1, &elev, &land, &river, &biome);

        let mut elev2 = elev.clone();
        elev2[7] = 0.500_01;
        assert_ne!(base, identity_hash(1, &elev2, &land, &river, &biome));

        let mut river2 = river.clone();
        river2[3] = true;
        assert_ne!(base, identity_hash(1, &elev, &land, &river2, &biome));
    }

    #[test]
    fn fingerprint_is_16_hex_chars() {
        let s = identity_hash(0, &[], &[], &[], &[]);
        assert_eq!(s.len(), 16);
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
