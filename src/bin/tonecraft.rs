//! tonecraft - offline tone tuning from the command line

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use tonecraft_core::codec::{Decoder, WavDecoder, encode_wav};
use tonecraft_core::segment::{Segment, crop_file_name, format_time_precise};
use tonecraft_core::{EngineConfig, OfflineRenderer, ParamsPatch, Preset};

#[derive(Parser)]
#[command(name = "tonecraft")]
#[command(about = "Tone-tune recorded clips: EQ, compression, reverb and WAV export", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a WAV clip through the signal chain
    Render {
        input: PathBuf,

        /// Output file, or a directory to write an auto-named file into
        output: PathBuf,

        #[arg(short, long, default_value = "recommended")]
        preset: Preset,

        /// Override a parameter, e.g. `--set reverb=30` (repeatable)
        #[arg(short, long = "set", value_name = "FIELD=VALUE")]
        overrides: Vec<String>,

        /// Crop start in seconds (requires --end)
        #[arg(long, requires = "end")]
        start: Option<f64>,

        /// Crop end in seconds (requires --start)
        #[arg(long, requires = "start")]
        end: Option<f64>,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for the reverb impulse
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the parameters of a preset as JSON
    Preset {
        #[arg(default_value = "recommended")]
        name: Preset,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { input, output, preset, overrides, start, end, config, seed } => {
            let mut config = match config {
                Some(path) => EngineConfig::from_json_file(path)?,
                None => EngineConfig::default(),
            };
            if seed.is_some() {
                config.reverb_seed = seed;
            }

            let mut patch = ParamsPatch::default();
            for assignment in &overrides {
                patch.parse_assignment(assignment)?;
            }
            let params = preset.params().merged(&patch);

            let bytes = std::fs::read(&input)?;
            let source = WavDecoder.decode(&bytes)?;
            info!(
                "{}: {} ch @ {} Hz, {}",
                input.display(),
                source.channel_count(),
                source.sample_rate(),
                format_time_precise(source.duration())
            );

            let segment = start.zip(end).map(|(s, e)| Segment::new(s, e));
            let rendered = OfflineRenderer::from_config(&config).render(&source, &params, segment.as_ref())?;

            let target = if output.is_dir() {
                output.join(crop_file_name(segment.as_ref(), params.output_format, params.bit_rate).replace(':', "-"))
            } else {
                output
            };
            std::fs::write(&target, encode_wav(&rendered))?;
            info!("Wrote {} ({} frames, preset {})", target.display(), rendered.frames(), preset);
        }

        Commands::Preset { name } => {
            info!("{}: {}", name.title(), name.description().join(", "));
            println!("{}", serde_json::to_string_pretty(&name.params())?);
        }
    }

    Ok(())
}
