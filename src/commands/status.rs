use anyhow::Result;
use geogrid::{batch::Checkpoint, config::Config};
use std::path::PathBuf;

pub async fn show_status(config: Config, checkpoint: Option<PathBuf>) -> Result<()> {
    let checkpoint_path = checkpoint.unwrap_or_else(|| config.checkpoint.checkpoint_path.clone());

    if !checkpoint_path.exists() {
        println!("No checkpoint at {}; the next run starts fresh.", checkpoint_path.display());
        return Ok(());
    }

    let Some(checkpoint) = Checkpoint::load(&checkpoint_path) else {
        anyhow::bail!("Checkpoint file is unreadable: {}", checkpoint_path.display());
    };
    let stats = &checkpoint.stats;

    println!("\nGeocoding Checkpoint Status");
    println!("===========================");
    println!("Last index:     {}", checkpoint.last_index);
    println!("Records:        {}/{}", stats.completed(), stats.total);
    println!("Processed:      {}", stats.processed);
    println!("Resolved:       {}", stats.resolved);
    println!("Failed:         {}", stats.failed);
    println!("Skipped:        {}", stats.skipped);
    println!("Cached:         {}", stats.cached);
    println!("Success rate:   {:.1}%", stats.success_rate());
    println!("Timestamp:      {}", checkpoint.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    match &checkpoint.input {
        Some(input) => println!("Input:          {} records, sha256 {}", input.records, input.sha256),
        None => println!("Input:          (no fingerprint)"),
    }

    if stats.completed() < stats.total {
        println!("\nTo resume, run:");
        println!("  geogrid geocode");
    }

    Ok(())
}
