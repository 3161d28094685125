use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "motif", about = "Rhythm, harmony and spectral features from MIDI and audio files")]
pub struct Cli {
    /// Input files (.mid/.midi, or audio: WAV, MP3, FLAC, OGG)
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Measure length in beats for MIDI rhythm patterns
    #[arg(short, long, default_value_t = 4.0)]
    pub measure_length: f64,

    /// Number of MFCC coefficients for audio inputs
    #[arg(long, default_value_t = 13)]
    pub n_mfcc: usize,

    /// Print results as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Play the note contour of each MIDI input after analysis
    #[arg(long)]
    pub play: bool,

    /// MIDI output port name (substring match) for --play
    #[arg(long)]
    pub port: Option<String>,

    /// Config file (default: ./motif.toml, then ~/.config/motif/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}
