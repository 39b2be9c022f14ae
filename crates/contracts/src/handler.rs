//! ChannelHandler trait - per vendor dispatch contract
//!
//! Protocol plugins implement this trait; the sender only ever talks to
//! vendors through it.

use async_trait::async_trait;

use crate::{ActionType, ChannelLogger, ChannelType, HandlerError, MsgStatus, OutgoingMsg};

/// What a dispatch call is asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchKind {
    /// Regular message send
    Message,
    /// Non-text action such as a typing indicator
    Action(ActionType),
}

/// Typed dispatch request
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    pub msg: &'a OutgoingMsg,
    pub kind: DispatchKind,
}

impl<'a> DispatchRequest<'a> {
    /// Request to send the message itself
    pub fn message(msg: &'a OutgoingMsg) -> Self {
        Self {
            msg,
            kind: DispatchKind::Message,
        }
    }

    /// Request to perform the message's action
    pub fn action(msg: &'a OutgoingMsg) -> Self {
        Self {
            msg,
            kind: DispatchKind::Action(msg.action),
        }
    }

    pub fn is_action(&self) -> bool {
        matches!(self.kind, DispatchKind::Action(_))
    }
}

/// Vendor send contract
///
/// `send` performs at most one HTTP level attempt per call; any retrying is
/// the handler's own concern. Exchanges should be recorded on `log`.
#[async_trait]
pub trait ChannelHandler: Send + Sync {
    /// Channel type served by this handler
    fn channel_type(&self) -> ChannelType;

    async fn send(
        &self,
        request: &DispatchRequest<'_>,
        log: &mut ChannelLogger,
    ) -> Result<MsgStatus, HandlerError>;

    /// Optional action capability
    fn action_sender(&self) -> Option<&dyn ActionSender> {
        None
    }
}

/// Capability for handlers supporting non-text actions
#[async_trait]
pub trait ActionSender: Send + Sync {
    async fn send_action(
        &self,
        request: &DispatchRequest<'_>,
        log: &mut ChannelLogger,
    ) -> Result<MsgStatus, HandlerError>;
}
