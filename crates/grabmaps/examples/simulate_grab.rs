use grabmaps::grab::{self, SimulationParams};
use grabmaps::session::BoundsMode;

#[cfg(feature = "tracing")]
use grabmaps::core::init_tracing;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(feature = "tracing")]
    init_tracing(false);
    #[cfg(not(feature = "tracing"))]
    grabmaps::core::init_with_level(log::LevelFilter::Info)?;

    let Some(folder) = std::env::args().nth(1) else {
        eprintln!("Usage: simulate_grab <output_dir>");
        return Ok(());
    };

    let mut config = grab::preset_config(BoundsMode::SampledCorners);
    config.map_folder = folder.into();
    config.zoom_steps = 2;
    let params = SimulationParams {
        mode: BoundsMode::SampledCorners,
        ..SimulationParams::default()
    };

    let report = grab::simulate(&config, &params)?;
    for level in &report.levels {
        println!(
            "zoom {}: {}x{} tiles, {} pans",
            level.zoom_step, level.slices_x, level.slices_y, level.pans
        );
    }
    Ok(())
}
