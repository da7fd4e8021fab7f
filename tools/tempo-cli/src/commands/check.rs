//! Check external tool availability.

use tempo_common::config::{config_file_path, MediaDefaults};
use tempo_media_io::ffmpeg::command_exists;

pub fn run(media: &MediaDefaults) -> anyhow::Result<()> {
    println!("Tempo System Check");
    println!("{}", "=".repeat(50));

    let tools = [("ffmpeg", &media.ffmpeg), ("ffprobe", &media.ffprobe)];
    let mut all_ok = true;
    for (label, binary) in tools {
        if command_exists(binary) {
            println!("[OK] {label}: {binary}");
        } else {
            all_ok = false;
            println!("[MISSING] {label}: {binary} not found on PATH");
        }
    }

    println!(
        "[OK] Worker threads: {}",
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    );

    let config_path = config_file_path();
    if config_path.exists() {
        println!("[OK] Config: {}", config_path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", config_path.display());
    }

    println!();
    if all_ok {
        println!("All required tools are available. Tempo is ready.");
    } else {
        println!("Some required tools are missing. Install ffmpeg to continue.");
    }

    Ok(())
}
