use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub type SignalSender = UnboundedSender<SessionSignal>;
pub type SignalReceiver = UnboundedReceiver<SessionSignal>;

/// Signals sent from the voice layer back to the session registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// The stream stopped on its own, either finished or errored.
    PlaybackEnded {
        guild: u64,
        session: Uuid,
        error: Option<String>
    },
    /// The voice connection was dropped from outside (kicked, channel deleted...).
    TransportLost {
        guild: u64,
        session: Uuid
    }
}

impl SessionSignal {
    pub fn guild(&self) -> u64 {
        match self {
            Self::PlaybackEnded { guild, .. } | Self::TransportLost { guild, .. } => *guild
        }
    }

    pub fn session(&self) -> Uuid {
        match self {
            Self::PlaybackEnded { session, .. } | Self::TransportLost { session, .. } => *session
        }
    }
}
