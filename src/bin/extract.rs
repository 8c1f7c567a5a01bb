use std::fs;
use std::path::PathBuf;

use clap::{arg, value_parser, Command};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use nsf_notation::config::ExtractionConfig;
use nsf_notation::{container, runner, Emulator};

fn get_args() -> (PathBuf, PathBuf, PathBuf, ExtractionConfig) {
    let matches = Command::new("nsfn-extract")
        .arg(
            arg!(-l --"emulator-lib" <PATH> "Path to the NSF emulator shared library")
                .required(true)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            arg!(-c --config <PATH> "Optional TOML config overriding extraction defaults")
                .required(false)
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(arg!(<nsf> "NSF file to extract notation from").value_parser(value_parser!(PathBuf)))
        .arg(arg!(<output> "Output .nsfn file").value_parser(value_parser!(PathBuf)))
        .get_matches();

    let lib_path = matches.get_one::<PathBuf>("emulator-lib").cloned().unwrap();
    let nsf_path = matches.get_one::<PathBuf>("nsf").cloned().unwrap();
    let output_path = matches.get_one::<PathBuf>("output").cloned().unwrap();

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => {
            let doc = fs::read_to_string(path).expect("failed to read config file");
            ExtractionConfig::from_toml_str(&doc).expect("invalid config file")
        }
        None => ExtractionConfig::default(),
    };

    (lib_path, nsf_path, output_path, config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let (lib_path, nsf_path, output_path, config) = get_args();

    let mut emu = Emulator::open(
        lib_path.to_str().expect("emulator library path must be valid UTF-8"),
        nsf_path.to_str().expect("NSF path must be valid UTF-8"),
    )?;

    let track_count = emu.track_count()?;
    let pb = ProgressBar::new(track_count as u64);
    pb.set_style(
        ProgressStyle::with_template("{msg} {wide_bar} {pos}/{len} tracks")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message("extracting");

    let notation = runner::extract_with_progress(&mut emu, &config, |done, _total| {
        pb.set_position(done as u64);
    })?;
    pb.finish_with_message("extraction complete");

    let bytes = container::write(&notation)?;
    fs::write(&output_path, &bytes)?;

    info!(
        tracks = notation.songs.len(),
        bytes = bytes.len(),
        output = %output_path.display(),
        "wrote notation container"
    );
    Ok(())
}
