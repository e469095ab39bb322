use clap::Parser;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_SHA"),
    ", ",
    env!("BUILD_DATE"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "tuner", version = VERSION)]
pub struct Args {
    /// Stream URL (MP3 over HTTP/HTTPS)
    pub url: String,

    /// Network read chunk size in bytes
    #[arg(long, default_value_t = 16 * 1024)]
    pub chunk_bytes: usize,

    /// Sink buffer target in seconds (higher => more stall resistance, more latency)
    #[arg(long, default_value_t = 2.0)]
    pub buffer_seconds: f32,

    /// Resampler input chunk size in frames
    #[arg(long, default_value_t = 1024)]
    pub chunk_frames: usize,
}
