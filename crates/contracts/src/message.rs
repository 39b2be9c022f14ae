//! OutgoingMsg - Backend 输出，Worker 输入
//!
//! 排队中的出站消息，附带其所属的通道与联系人。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::ChannelType;

/// 消息的数据库 id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MsgId(pub i64);

impl fmt::Display for MsgId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MsgId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Message uuid
pub type MsgUuid = Uuid;

/// Channel uuid
pub type ChannelUuid = Uuid;

/// 单个厂商账号的已配置连接
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub uuid: ChannelUuid,
    pub channel_type: ChannelType,
    #[serde(default)]
    pub name: String,
    /// 厂商侧地址 (电话号码、page id、bot 用户名)
    #[serde(default)]
    pub address: String,
}

/// 消息的目标联系人
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactRef {
    pub uuid: Uuid,
    #[serde(default)]
    pub name: String,
}

/// Non-text action requested instead of a message send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    #[default]
    None,
    TypingIndicator,
}

/// 队列优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsgPriority {
    #[default]
    Default,
    High,
}

/// 排队的出站消息
///
/// 对分发引擎只读。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingMsg {
    pub id: MsgId,
    pub uuid: MsgUuid,
    pub channel: ChannelRef,
    pub contact: ContactRef,

    /// Destination URN (`whatsapp:15551234567`, `telegram:1234`, ...)
    pub urn: String,

    #[serde(default)]
    pub text: String,

    /// `content-type:url` 对
    #[serde(default)]
    pub attachments: Vec<String>,

    #[serde(default)]
    pub quick_replies: Vec<String>,

    /// Opaque metadata blob, see [`OutgoingMsg::templating`]
    #[serde(default)]
    pub metadata: Value,

    #[serde(default)]
    pub action: ActionType,

    #[serde(default)]
    pub is_resend: bool,

    #[serde(default)]
    pub priority: MsgPriority,

    #[serde(default = "Utc::now")]
    pub created_on: DateTime<Utc>,
}

impl OutgoingMsg {
    /// Channel type shortcut
    pub fn channel_type(&self) -> &ChannelType {
        &self.channel.channel_type
    }

    /// Whether this is an action rather than a message send
    pub fn is_action(&self) -> bool {
        self.action != ActionType::None
    }

    /// metadata 中的模板块 (存在且格式正确时)
    pub fn templating(&self) -> Option<Templating> {
        let raw = self.metadata.get("templating")?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Order details block (commerce messages)
    pub fn order_details(&self) -> Option<&Value> {
        self.metadata.get("order_details")
    }

    /// Flow message block (interactive flows)
    pub fn flow_message(&self) -> Option<&Value> {
        self.metadata.get("flow_message")
    }
}

/// Template reference stored in message metadata
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Templating {
    #[serde(default)]
    pub template: TemplateRef,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub variables: Vec<String>,
}

/// Name + uuid of a template
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TemplateRef {
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub name: String,
}

impl Templating {
    /// 仅当 name、uuid、language 均存在时才追踪模板发送
    pub fn is_complete(&self) -> bool {
        !self.template.name.is_empty()
            && !self.template.uuid.is_empty()
            && !self.language.is_empty()
    }
}
