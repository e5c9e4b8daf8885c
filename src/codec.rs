// src/codec.rs
//! Экспорт и импорт контролов в виде URL-safe кода.
//!
//! Полезная нагрузка — версионированная строка `CG1|key=value|...` с
//! фиксированным порядком ключей, закодированная base64 без паддинга.
//! Импорт никогда не паникует: любой битый или чужой код → `None`.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::config::{AspectRatio, BiomeMix, Controls, SizeClass};

/// Версия формата кода экспорта
pub const CODEC_VERSION: &str = "CG1";

/// Результат экспорта контролов
#[derive(Debug, Clone)]
pub struct ExportedControls {
    pub version: String,
    pub code: String,
}

/// Сериализует контролы в версионированный URL-safe код
#[must_use]
pub fn export_controls(controls: &Controls) -> ExportedControls {
    let c = controls.normalized();
    let m = c.biome_mix;
    // Сид кодируется отдельно: произвольный текст не должен ломать разделители
    let payload = format!(
        "{CODEC_VERSION}|seed={}|size={:?}|aspect={:?}|land={}|relief={}|frag={}|smooth={}\
         |latc={}|lats={}|peak={}|isl={}|clim={}|plates={}\
         |mix={},{},{},{},{},{},{}",
        URL_SAFE_NO_PAD.encode(c.seed.as_bytes()),
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
    );
    ExportedControls {
        version: CODEC_VERSION.to_string(),
        code: URL_SAFE_NO_PAD.encode(payload.as_bytes()),
    }
}

/// Восстанавливает контролы из кода экспорта; битый код → `None`
#[must_use]
pub fn import_controls(code: &str) -> Option<Controls> {
    let bytes = URL_SAFE_NO_PAD.decode(code.trim()).ok()?;
    let payload = String::from_utf8(bytes).ok()?;

    let mut parts = payload.split('|');
    if parts.next()? != CODEC_VERSION {
        return None;
    }

    let mut controls = Controls::default();
    let mut seen = 0_u32;

    for part in parts {
        let (key, value) = part.split_once('=')?;
        match key {
            "seed" => {
                let raw = URL_SAFE_NO_PAD.decode(value).ok()?;
                controls.seed = String::from_utf8(raw).ok()?;
            }
            "size" => controls.size = parse_size(value)?,
            "aspect" => controls.aspect = parse_aspect(value)?,
            "land" => controls.land_fraction = value.parse().ok()?,
            "relief" => controls.relief = value.parse().ok()?,
            "frag" => controls.fragmentation = value.parse().ok()?,
            "smooth" => controls.coastal_smoothing = value.parse().ok()?,
            "latc" => controls.latitude_center = value.parse().ok()?,
            "lats" => controls.latitude_span = value.parse().ok()?,
            "peak" => controls.peakiness = value.parse().ok()?,
            "isl" => controls.island_density = value.parse().ok()?,
            "clim" => controls.climate_bias = value.parse().ok()?,
            "plates" => controls.plate_bias = value.parse().ok()?,
            "mix" => controls.biome_mix = parse_mix(value)?,
            _ => return None,
        }
        seen += 1;
    }

    // Все 14 ключей обязательны
    if seen != 14 {
        return None;
    }
    Some(controls.normalized())
}

fn parse_size(value: &str) -> Option<SizeClass> {
    match value {
        "Isle" => Some(SizeClass::Isle),
        "Region" => Some(SizeClass::Region),
        "Subcontinent" => Some(SizeClass::Subcontinent),
        "Supercontinent" => Some(SizeClass::Supercontinent),
        _ => None,
    }
}

fn parse_aspect(value: &str) -> Option<AspectRatio> {
    match value {
        "Square" => Some(AspectRatio::Square),
        "Standard" => Some(AspectRatio::Standard),
        "Wide" => Some(AspectRatio::Wide),
        "Tall" => Some(AspectRatio::Tall),
        _ => None,
    }
}

fn parse_mix(value: &str) -> Option<BiomeMix> {
    let mut weights = [0.0_f32; 7];
    let mut count = 0;
    for (slot, raw) in weights.iter_mut().zip(value.split(',')) {
        *slot = raw.parse().ok()?;
        count += 1;
    }
    if count != 7 || value.split(',').count() != 7 {
        return None;
    }
    Some(BiomeMix {
        grassland: weights[0],
        forest: weights[1],
        rainforest: weights[2],
        desert: weights[3],
        tundra: weights[4],
        mountains: weights[5],
        rivers: weights[6],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::controls_hash;

    #[test]
    fn round_trip_preserves_controls() {
        let original = Controls {
            seed: "  Misty Forge ".into(),
            size: SizeClass::Isle,
            land_fraction: 7.0,
            climate_bias: -2.5,
            ..Controls::default()
        };
        let exported = export_controls(&original);
        let imported = import_controls(&exported.code).expect("код должен читаться");
        assert_eq!(imported, original.normalized());
        assert_eq!(controls_hash(&imported), controls_hash(&original));
    }

    #[test]
    fn malformed_codes_return_none() {
        assert!(import_controls("").is_none());
        assert!(import_controls("не base64 вовсе!").is_none());

        // Валидный base64, но не наш формат
        let alien = URL_SAFE_NO_PAD.encode(b"XX9|foo=bar");
        assert!(import_controls(&alien).is_none());

        // Правильная версия, но обрезанная нагрузка
        let truncated = URL_SAFE_NO_PAD.encode(b"CG1|seed=demo");
        assert!(import_controls(&truncated).is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let payload = export_controls(&Controls::default());
        let decoded = URL_SAFE_NO_PAD.decode(&payload.code).unwrap();
        let mut text = String::from_utf8(decoded).unwrap();
        text.push_str("|mystery=1");
        let tampered = URL_SAFE_NO_PAD.encode(text.as_bytes());
        assert!(import_controls(&tampered).is_none());
    }
}
