pub mod biome;
pub mod climate;
pub mod codec;
pub mod config;
pub mod generator;
pub mod heightfield;
pub mod hydrology;
pub mod identity;
pub mod mask;
pub mod noise;
pub mod render;
pub mod tectonics;

pub use biome::Biome;
pub use codec::{ExportedControls, export_controls, import_controls};
pub use config::{AspectRatio, BiomeMix, Controls, SizeClass};
pub use generator::{GeneratedMap, generate};
