use anyhow::{Context, Result};
use geogrid::{
    config::Config,
    grid::{load_dataset, GeohashPartitioner, GridIndex, GridWriter, Precision},
};
use std::path::PathBuf;
use tracing::info;

pub async fn build_grid(
    config: Config,
    input: Option<PathBuf>,
    precision: Option<u8>,
    output_dir: Option<PathBuf>,
    index: Option<PathBuf>,
) -> Result<()> {
    let input = input.unwrap_or_else(|| config.checkpoint.results_path.clone());
    let output_dir = output_dir.unwrap_or_else(|| config.grid.output_dir.clone());
    let index_path = index.unwrap_or_else(|| config.grid.index_path.clone());
    let precision = Precision::new(precision.unwrap_or(config.grid.precision))
        .context("Invalid grid precision")?;

    if !input.exists() {
        anyhow::bail!(
            "Geocoded dataset not found: {} (run `geogrid geocode` first)",
            input.display()
        );
    }

    let dataset = load_dataset(&input)?;
    info!("Building geohash grid (precision {})", precision);

    let partition = GeohashPartitioner::new(precision).partition(dataset.stores.iter().cloned());
    let grid_index = GridIndex::build(&partition).context("Failed to build grid index")?;

    let writer = GridWriter::new(&output_dir, &index_path).with_backups(config.grid.backup_paths.clone());
    let report = writer.write(&partition, &grid_index, &dataset)?;

    println!("\nGrid Complete!");
    println!("==============");
    println!("Precision:        {}", precision);
    println!("Total stores:     {}", grid_index.total_stores);
    println!("With coords:      {}", grid_index.stats.with_coords);
    println!("Without coords:   {}", grid_index.stats.without_coords);
    println!("Grid cells:       {}", grid_index.total_grids);
    println!(
        "Cell files:       {} in {} ({:.2} MB)",
        report.cell_files,
        output_dir.display(),
        report.cell_bytes as f64 / (1024.0 * 1024.0)
    );
    println!("Index:            {}", index_path.display());
    for backup in &report.backups {
        println!("Backup:           {}", backup.display());
    }

    Ok(())
}
