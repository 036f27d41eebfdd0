//! Message channel between the page and the host application
//!
//! Every message carries the per-page security token so the host can tell
//! trusted reports from messages forged by page scripts. Posting is
//! fire-and-forget: nothing is awaited and no reply is correlated.

mod ipc;

pub use ipc::{HostMessage, HostReceiver, HostSender, host_channel};

use crate::shields::ResourceReport;
use crate::utils::{Result, ShieldsError};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::rand::{SecureRandom, SystemRandom};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

/// Handler name the host registers for tracker statistics
pub const DEFAULT_MESSAGE_HANDLER: &str = "trackingProtectionStats";

const TOKEN_BYTES: usize = 32;

/// Opaque per-page token proving a message came from injected code
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecurityToken(String);

impl SecurityToken {
    /// Generate a fresh random token
    pub fn generate() -> Result<Self> {
        let mut bytes = [0u8; TOKEN_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| ShieldsError::TokenGeneration)?;
        Ok(Self(URL_SAFE_NO_PAD.encode(bytes)))
    }

    /// Wrap a token handed over by the host
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecurityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecurityToken(..)")
    }
}

/// Outbound message shape: `{ securityToken, data }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeMessage {
    pub security_token: SecurityToken,
    pub data: ResourceReport,
}

/// Host-provided message-posting primitive
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink {
    /// Post a message to the named host handler
    fn post_message(&self, handler: &str, message: NativeMessage);
}

/// Posts reports to one host handler, stamping them with the page token
pub struct ChannelAdapter {
    handler: String,
    token: SecurityToken,
    sink: Rc<dyn MessageSink>,
}

impl ChannelAdapter {
    pub fn new(
        handler: impl Into<String>,
        token: SecurityToken,
        sink: Rc<dyn MessageSink>,
    ) -> Self {
        Self {
            handler: handler.into(),
            token,
            sink,
        }
    }

    /// Send a report; returns immediately
    pub fn post(&self, report: ResourceReport) {
        self.sink.post_message(
            &self.handler,
            NativeMessage {
                security_token: self.token.clone(),
                data: report,
            },
        );
    }
}

impl fmt::Debug for ChannelAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelAdapter")
            .field("handler", &self.handler)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
