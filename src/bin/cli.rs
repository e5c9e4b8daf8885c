use clap::Parser;
use continentgen::render::{biome_image, height_image, river_image, save_grayscale_png, save_rgba_png};
use continentgen::{Controls, GeneratedMap, export_controls, generate};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Генератор процедурных континентов
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Путь к конфигурационному файлу в формате TOML (без него — контролы по умолчанию)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Сид мира; перекрывает значение из конфига
    #[arg(short, long)]
    seed: Option<String>,

    /// Каталог для превью (height.png, biomes.png, rivers.png)
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Печать сводной статистики в формате JSON
    #[arg(long)]
    stats: bool,
}

#[derive(Serialize)]
struct MapStats<'a> {
    width: usize,
    height: usize,
    sea_level: f32,
    land_fraction: f32,
    land_area: usize,
    coast_perimeter: usize,
    river_cells: usize,
    identity: &'a str,
    export_code: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    println!("🔍 Загрузка контролов...");
    let mut controls = match &cli.config {
        Some(path) => Controls::from_toml_file(path.to_str().ok_or("Invalid config path")?)?,
        None => Controls::default(),
    };
    if let Some(seed) = cli.seed {
        controls.seed = seed;
    }

    let (w, h) = controls.grid_dimensions();
    println!("Генерация карты (размер: {w}×{h})...");
    let map = generate(&controls);

    println!("Сохранение превью в {:?}", cli.output);
    save_previews(&map, &cli.output)?;

    let exported = export_controls(&map.controls);
    if cli.stats {
        let stats = MapStats {
            width: map.width,
            height: map.height,
            sea_level: map.sea_level,
            land_fraction: map.land_fraction(),
            land_area: map.land_area,
            coast_perimeter: map.coast_perimeter,
            river_cells: map.river.iter().filter(|&&r| r).count(),
            identity: &map.identity,
            export_code: exported.code.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    println!("\nГотово! Отпечаток: {}", map.identity);
    println!("Код экспорта: {}", exported.code);
    Ok(())
}

fn save_previews(map: &GeneratedMap, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(dir)?;
    let path = |name: &str| -> Result<String, Box<dyn std::error::Error>> {
        Ok(dir
            .join(name)
            .to_str()
            .ok_or("Invalid output path")?
            .to_string())
    };

    save_grayscale_png(
        &height_image(&map.elevation01),
        map.width,
        map.height,
        &path("height.png")?,
    )?;
    save_rgba_png(
        &biome_image(&map.biomes, &map.light),
        map.width,
        map.height,
        &path("biomes.png")?,
    )?;
    save_grayscale_png(
        &river_image(&map.river, &map.flow, map.width, map.height),
        map.width,
        map.height,
        &path("rivers.png")?,
    )?;
    // Освещённость лежит в [0, 1] — кодек высот подходит без изменений
    save_grayscale_png(
        &height_image(&map.light),
        map.width,
        map.height,
        &path("shade.png")?,
    )?;
    Ok(())
}
