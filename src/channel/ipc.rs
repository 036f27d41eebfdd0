//! In-process transport to the host application

use super::{MessageSink, NativeMessage};
use crate::utils::Result;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// A posted message as the host receives it: handler name plus JSON body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMessage {
    pub handler: String,
    pub body: String,
}

impl HostMessage {
    /// Decode the body of a tracker-statistics message
    pub fn decode(&self) -> Result<NativeMessage> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Page end of the channel
#[derive(Debug, Clone)]
pub struct HostSender {
    sender: UnboundedSender<HostMessage>,
}

impl MessageSink for HostSender {
    fn post_message(&self, handler: &str, message: NativeMessage) {
        let body = match serde_json::to_string(&message) {
            Ok(body) => body,
            Err(e) => {
                log::error!("failed to encode {} message: {}", handler, e);
                return;
            }
        };
        let message = HostMessage {
            handler: handler.to_string(),
            body,
        };
        if self.sender.send(message).is_err() {
            log::debug!("host channel closed, dropping {} message", handler);
        }
    }
}

/// Host end of the channel
#[derive(Debug)]
pub struct HostReceiver {
    receiver: UnboundedReceiver<HostMessage>,
}

impl HostReceiver {
    /// Wait for the next message; `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<HostMessage> {
        self.receiver.recv().await
    }

    /// Take a message if one is ready
    pub fn try_recv(&mut self) -> Option<HostMessage> {
        match self.receiver.try_recv() {
            Ok(message) => Some(message),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

/// Create a connected sender/receiver pair
pub fn host_channel() -> (HostSender, HostReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (HostSender { sender }, HostReceiver { receiver })
}
