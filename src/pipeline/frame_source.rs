use crossbeam_channel::{Receiver, TryRecvError};

use crate::{error::SessionError, types::Frame};

/// A live video stream that is driven from outside and polled by the session.
pub trait FrameSource {
    /// Gets the device delivering frames, or reports why it cannot.
    fn ensure_ready(&mut self) -> Result<(), SessionError>;

    /// Newest frame produced since the last call. Never blocks.
    fn next_frame(&mut self) -> Option<Frame>;
}

/// Frame source fed by any producer holding the sending half of a channel.
pub struct ChannelFrameSource {
    frame_rx: Receiver<Frame>,
    disconnected: bool,
}

impl ChannelFrameSource {
    pub fn new(frame_rx: Receiver<Frame>) -> Self {
        Self {
            frame_rx,
            disconnected: false,
        }
    }
}

impl FrameSource for ChannelFrameSource {
    fn ensure_ready(&mut self) -> Result<(), SessionError> {
        if self.disconnected {
            return Err(SessionError::Device("frame producer has gone away".to_string()));
        }
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let mut latest = None;
        loop {
            match self.frame_rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.disconnected = true;
                    break;
                }
            }
        }
        latest
    }
}
