use thiserror::Error;

/// Errors returned by session registry operations. The messages are shown
/// to the user that issued the command.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I'm already playing in a voice channel!")]
    AlreadyConnected,
    #[error("I'm not currently playing in a voice channel.")]
    NotConnected,
    #[error("Volume must be between 0 and 100.")]
    InvalidLevel,
    #[error("Unable to adjust volume for the current stream.")]
    VolumeUnsupported,
    #[error("Unable to join the voice channel: {0}")]
    ConnectFailed(#[source] TransportError),
    #[error("Unable to play radio stream: {0}")]
    PlaybackSetupFailed(#[source] TransportError),
    #[error(transparent)]
    Playback(#[from] PlaybackError)
}

/// Failures of the voice transport (joining, leaving, starting a stream).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("voice connection failed: {0}")]
    Connect(String),
    #[error("failed to start decoder: {0}")]
    Decoder(#[from] std::io::Error),
    #[error("{0}")]
    Other(String)
}

/// Failures of a running playback.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("playback is not active")]
    Finished,
    #[error("playback control failed: {0}")]
    Control(String)
}

/// Failures fetching the current track. Never surfaced past the track source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed track payload: {0}")]
    Decode(#[from] serde_json::Error)
}

/// Failure to deliver a now-playing announcement to one guild.
#[derive(Debug, Error)]
#[error("failed to deliver to channel {channel}: {reason}")]
pub struct DeliveryError {
    pub channel: u64,
    pub reason: String
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value: {value}")]
    Invalid {
        name: &'static str,
        value: String
    }
}

/// Failures installing ffmpeg from the prebuilt Windows archive.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("download failed: {0}")]
    Download(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("archive extraction exited with {0}")]
    Extract(std::process::ExitStatus),
    #[error("ffmpeg.exe not found in the downloaded archive")]
    MissingBinary,
    #[error("cannot extend PATH: {0}")]
    Path(#[from] std::env::JoinPathsError)
}
