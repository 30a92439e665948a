//! Channel and session state.
//!
//! The channel lifecycle and the session's idle/auth flags are independent
//! axes; [`SessionStatus`] is the snapshot the engine publishes after every
//! change.

use blade_core::messages::IceServer;
use blade_core::Authorization;

/// Lifecycle of the session's channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    /// `connect()` was never called.
    #[default]
    Absent,
    Connecting,
    Open,
    Closing,
    Closed,
}

impl ChannelState {
    pub fn connecting(self) -> bool {
        self == Self::Connecting
    }

    pub fn connected(self) -> bool {
        self == Self::Open
    }

    pub fn closing(self) -> bool {
        self == Self::Closing
    }

    pub fn closed(self) -> bool {
        self == Self::Closed
    }
}

/// Outcome of the most recent handshake.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Unknown,
    Authorizing,
    Authorized,
    Unauthorized,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub channel: ChannelState,
    /// Server asked us to stop sending; calls are queued.
    pub idle: bool,
    pub auth: AuthStatus,
    /// Negotiated protocol, empty until a handshake yields one.
    pub protocol: String,
    pub authorization: Option<Authorization>,
    pub ice_servers: Vec<IceServer>,
    /// Requests on the wire waiting for a reply.
    pub pending: usize,
    /// Calls held back until the channel is usable.
    pub queued: usize,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            channel: ChannelState::Absent,
            idle: true,
            auth: AuthStatus::Unknown,
            protocol: String::new(),
            authorization: None,
            ice_servers: Vec::new(),
            pending: 0,
            queued: 0,
        }
    }
}

impl SessionStatus {
    /// Signature of the current authorization, if any.
    pub fn signature(&self) -> Option<&str> {
        self.authorization.as_ref().map(|a| a.signature.as_str())
    }

    /// Connected at the socket level and not told to hold off.
    pub fn ready(&self) -> bool {
        self.channel.connected() && !self.idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_flags_follow_channel_state() {
        let cases = [
            (ChannelState::Absent, [false, false, false, false]),
            (ChannelState::Connecting, [true, false, false, false]),
            (ChannelState::Open, [false, true, false, false]),
            (ChannelState::Closing, [false, false, true, false]),
            (ChannelState::Closed, [false, false, false, true]),
        ];
        for (state, [connecting, connected, closing, closed]) in cases {
            assert_eq!(state.connecting(), connecting, "{state:?}");
            assert_eq!(state.connected(), connected, "{state:?}");
            assert_eq!(state.closing(), closing, "{state:?}");
            assert_eq!(state.closed(), closed, "{state:?}");
        }
    }

    #[test]
    fn fresh_session_is_idle_and_not_ready() {
        let status = SessionStatus::default();
        assert!(status.idle);
        assert!(!status.ready());
        assert_eq!(status.signature(), None);
    }
}
