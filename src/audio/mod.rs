pub mod decode;
pub mod features;
pub mod rhythm;
pub mod spectral;
pub mod stft;

pub use decode::{decode_audio, AudioData};
pub use features::{AudioRhythmAnalysis, SpectralFeatures};
pub use rhythm::BeatConfig;
pub use spectral::SpectralConfig;
