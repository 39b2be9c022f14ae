//! 内存协作者
//!
//! `MemoryBackend` 与 `ScriptedHandler` 替代数据库/队列和厂商 handler，
//! 供测试与 `gateway run` 演练使用。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use contracts::{
    ActionSender, Backend, BackendError, BackendResult, ChannelHandler, ChannelLog, ChannelLogger,
    ChannelRef, ChannelType, DispatchRequest, HandlerError, MsgId, MsgPriority, MsgRecord,
    MsgStatus, MsgStatusValue, MsgUuid, OutgoingMsg, RunEvent,
};

/// 后端调用计数 (按操作)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendCalls {
    pub pop: u32,
    pub was_msg_sent: u32,
    pub is_msg_loop: u32,
    pub clear_msg_sent: u32,
    pub write_msg_status: u32,
    pub write_channel_logs: u32,
    pub mark_complete: u32,
    pub get_run_events: u32,
    pub get_message: u32,
    pub write_contact_last_seen: u32,
}

#[derive(Debug, Default)]
struct BackendState {
    high: VecDeque<OutgoingMsg>,
    default: VecDeque<OutgoingMsg>,
    sent: HashSet<MsgId>,
    loops: HashSet<MsgId>,
    run_events: HashMap<MsgUuid, Vec<RunEvent>>,
    messages: HashMap<MsgUuid, MsgRecord>,
    statuses: Vec<MsgStatus>,
    channel_logs: Vec<ChannelLog>,
    completed: Vec<(MsgId, MsgStatusValue)>,
    last_seen: HashMap<MsgUuid, DateTime<Utc>>,
    calls: BackendCalls,
    fail_pops: u32,
    failing: HashSet<&'static str>,
    delays: HashMap<&'static str, Duration>,
}

/// 线程安全的内存后端
///
/// 队列按优先级排序 (high 先于 default，同优先级内 FIFO)。
/// 完成消息时记录其已发送标记。
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<BackendState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a call and apply injected delay/failure for `operation`
    async fn enter(&self, operation: &'static str) -> BackendResult<()> {
        let delay = {
            let mut state = self.state();
            count_call(&mut state.calls, operation);
            state.delays.get(operation).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state().failing.contains(operation) {
            return Err(BackendError::Unavailable(format!("{operation} failed")));
        }
        Ok(())
    }

    /// 入队一条消息
    pub fn push(&self, msg: OutgoingMsg) {
        let mut state = self.state();
        match msg.priority {
            MsgPriority::High => state.high.push_back(msg),
            MsgPriority::Default => state.default.push_back(msg),
        }
    }

    /// Queue a contact's messages and record them as one conversation
    ///
    /// Every message gets a `msg_created` run event and a stored record
    /// with status `queued`, so later messages wait on earlier ones.
    pub fn push_conversation(&self, msgs: Vec<OutgoingMsg>) {
        let events: Vec<RunEvent> = msgs
            .iter()
            .map(|m| RunEvent::msg_created(m.uuid, m.created_on))
            .collect();

        {
            let mut state = self.state();
            for msg in &msgs {
                state.run_events.insert(msg.uuid, events.clone());
                state.messages.insert(
                    msg.uuid,
                    MsgRecord {
                        id: msg.id,
                        uuid: msg.uuid,
                        status: MsgStatusValue::Queued,
                    },
                );
            }
        }

        for msg in msgs {
            self.push(msg);
        }
    }

    pub fn mark_sent(&self, id: MsgId) {
        self.state().sent.insert(id);
    }

    pub fn mark_loop(&self, id: MsgId) {
        self.state().loops.insert(id);
    }

    pub fn set_run_events(&self, uuid: MsgUuid, events: Vec<RunEvent>) {
        self.state().run_events.insert(uuid, events);
    }

    /// Store (or overwrite) a message record
    pub fn set_message(&self, record: MsgRecord) {
        self.state().messages.insert(record.uuid, record);
    }

    /// 让接下来 `n` 次 pop 失败
    pub fn fail_next_pops(&self, n: u32) {
        self.state().fail_pops = n;
    }

    /// Make every call of `operation` fail until cleared
    ///
    /// Operation names match the [`BackendCalls`] fields.
    pub fn fail_operation(&self, operation: &'static str) {
        self.state().failing.insert(operation);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing.clear();
        state.fail_pops = 0;
    }

    /// 延迟 `operation` 的每次调用
    pub fn delay_operation(&self, operation: &'static str, delay: Duration) {
        self.state().delays.insert(operation, delay);
    }

    pub fn queue_len(&self) -> usize {
        let state = self.state();
        state.high.len() + state.default.len()
    }

    pub fn calls(&self) -> BackendCalls {
        self.state().calls
    }

    pub fn is_sent(&self, id: MsgId) -> bool {
        self.state().sent.contains(&id)
    }

    /// Written statuses, in write order
    pub fn statuses(&self) -> Vec<MsgStatus> {
        self.state().statuses.clone()
    }

    pub fn status_of(&self, id: MsgId) -> Option<MsgStatus> {
        self.state()
            .statuses
            .iter()
            .rev()
            .find(|s| s.msg_id == id)
            .cloned()
    }

    pub fn channel_logs(&self) -> Vec<ChannelLog> {
        self.state().channel_logs.clone()
    }

    /// Completed messages with their final status
    pub fn completed(&self) -> Vec<(MsgId, MsgStatusValue)> {
        self.state().completed.clone()
    }
}

fn count_call(calls: &mut BackendCalls, operation: &str) {
    let counter = match operation {
        "pop" => &mut calls.pop,
        "was_msg_sent" => &mut calls.was_msg_sent,
        "is_msg_loop" => &mut calls.is_msg_loop,
        "clear_msg_sent" => &mut calls.clear_msg_sent,
        "write_msg_status" => &mut calls.write_msg_status,
        "write_channel_logs" => &mut calls.write_channel_logs,
        "mark_complete" => &mut calls.mark_complete,
        "get_run_events" => &mut calls.get_run_events,
        "get_message" => &mut calls.get_message,
        "write_contact_last_seen" => &mut calls.write_contact_last_seen,
        _ => return,
    };
    *counter += 1;
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn pop_next_outgoing_msg(&self, _timeout: Duration) -> BackendResult<Option<OutgoingMsg>> {
        self.enter("pop").await?;

        let mut state = self.state();
        if state.fail_pops > 0 {
            state.fail_pops -= 1;
            return Err(BackendError::Unavailable("queue unreachable".to_string()));
        }

        let msg = match state.high.pop_front() {
            Some(msg) => Some(msg),
            None => state.default.pop_front(),
        };
        if let Some(msg) = &msg {
            trace!(msg_id = %msg.id, "popped outgoing message");
        }
        Ok(msg)
    }

    async fn was_msg_sent(&self, id: MsgId) -> BackendResult<bool> {
        self.enter("was_msg_sent").await?;
        Ok(self.state().sent.contains(&id))
    }

    async fn is_msg_loop(&self, msg: &OutgoingMsg) -> BackendResult<bool> {
        self.enter("is_msg_loop").await?;
        Ok(self.state().loops.contains(&msg.id))
    }

    async fn clear_msg_sent(&self, id: MsgId) -> BackendResult<()> {
        self.enter("clear_msg_sent").await?;
        self.state().sent.remove(&id);
        Ok(())
    }

    fn new_msg_status_for_id(
        &self,
        channel: &ChannelRef,
        id: MsgId,
        status: MsgStatusValue,
    ) -> MsgStatus {
        MsgStatus::new(channel.uuid, id, status)
    }

    async fn write_msg_status(&self, status: &MsgStatus) -> BackendResult<()> {
        self.enter("write_msg_status").await?;
        let mut state = self.state();
        if let Some(record) = state.messages.values_mut().find(|r| r.id == status.msg_id) {
            record.status = status.status;
        }
        state.statuses.push(status.clone());
        Ok(())
    }

    async fn write_channel_logs(&self, logs: &[ChannelLog]) -> BackendResult<()> {
        self.enter("write_channel_logs").await?;
        self.state().channel_logs.extend_from_slice(logs);
        Ok(())
    }

    async fn mark_outgoing_msg_complete(
        &self,
        msg: &OutgoingMsg,
        status: &MsgStatus,
    ) -> BackendResult<()> {
        self.enter("mark_complete").await?;
        let mut state = self.state();
        state.sent.insert(msg.id);
        state.completed.push((msg.id, status.status));
        debug!(msg_id = %msg.id, status = %status.status, "message completed");
        Ok(())
    }

    async fn get_run_events_by_msg_uuid(&self, uuid: MsgUuid) -> BackendResult<Vec<RunEvent>> {
        self.enter("get_run_events").await?;
        Ok(self.state().run_events.get(&uuid).cloned().unwrap_or_default())
    }

    async fn get_message(&self, uuid: MsgUuid) -> BackendResult<Option<MsgRecord>> {
        self.enter("get_message").await?;
        Ok(self.state().messages.get(&uuid).cloned())
    }

    async fn write_contact_last_seen(
        &self,
        msg: &OutgoingMsg,
        last_seen_on: DateTime<Utc>,
    ) -> BackendResult<()> {
        self.enter("write_contact_last_seen").await?;
        self.state().last_seen.insert(msg.contact.uuid, last_seen_on);
        Ok(())
    }
}

/// 单次 handler 调用的预设结果
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Succeed with this status and record an exchange
    Status(MsgStatusValue),
    /// Fail without recording anything
    Fail(HandlerError),
    /// Record an error exchange, then fail
    FailLogged(HandlerError),
    /// 永不返回
    Hang,
}

/// 按脚本回放结果的 handler
///
/// 结果按顺序消费；脚本耗尽后每次调用返回默认结果 (`wired`)。
pub struct ScriptedHandler {
    channel_type: ChannelType,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Scripted,
    supports_actions: bool,
    delay: Option<Duration>,
    send_calls: AtomicU32,
    action_calls: AtomicU32,
    sent: Mutex<Vec<MsgId>>,
}

impl ScriptedHandler {
    pub fn new(channel_type: impl Into<ChannelType>) -> Self {
        Self {
            channel_type: channel_type.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Scripted::Status(MsgStatusValue::Wired),
            supports_actions: false,
            delay: None,
            send_calls: AtomicU32::new(0),
            action_calls: AtomicU32::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Advertise the action capability
    pub fn with_actions(mut self) -> Self {
        self.supports_actions = true;
        self
    }

    pub fn with_fallback(mut self, fallback: Scripted) -> Self {
        self.fallback = fallback;
        self
    }

    /// 模拟厂商延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append one outcome to the script
    pub fn then(self, outcome: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(outcome);
        self
    }

    pub fn send_calls(&self) -> u32 {
        self.send_calls.load(Ordering::SeqCst)
    }

    pub fn action_calls(&self) -> u32 {
        self.action_calls.load(Ordering::SeqCst)
    }

    /// Message ids handed to the vendor, in call order
    pub fn sent(&self) -> Vec<MsgId> {
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn next_outcome(&self) -> Scripted {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn vendor_url(&self, path: &str) -> String {
        format!("https://vendor.invalid/{}/{}", self.channel_type.as_str().to_lowercase(), path)
    }

    async fn play(
        &self,
        request: &DispatchRequest<'_>,
        log: &mut ChannelLogger,
        path: &str,
    ) -> Result<MsgStatus, HandlerError> {
        let started = tokio::time::Instant::now();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let msg = request.msg;
        match self.next_outcome() {
            Scripted::Status(status) => {
                let entry = log
                    .entry()
                    .with_exchange("POST", self.vendor_url(path), 200, started.elapsed());
                log.record(entry);
                Ok(MsgStatus::new(msg.channel.uuid, msg.id, status)
                    .with_external_id(format!("ext-{}", msg.id)))
            }
            Scripted::Fail(err) => Err(err),
            Scripted::FailLogged(err) => {
                let entry = log
                    .entry()
                    .with_exchange("POST", self.vendor_url(path), 400, started.elapsed())
                    .with_error(err.code().to_string(), err.to_string());
                log.record(entry);
                Err(err)
            }
            Scripted::Hang => std::future::pending().await,
        }
    }
}

#[async_trait]
impl ChannelHandler for ScriptedHandler {
    fn channel_type(&self) -> ChannelType {
        self.channel_type.clone()
    }

    async fn send(
        &self,
        request: &DispatchRequest<'_>,
        log: &mut ChannelLogger,
    ) -> Result<MsgStatus, HandlerError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request.msg.id);
        self.play(request, log, "messages").await
    }

    fn action_sender(&self) -> Option<&dyn ActionSender> {
        if self.supports_actions {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl ActionSender for ScriptedHandler {
    async fn send_action(
        &self,
        request: &DispatchRequest<'_>,
        log: &mut ChannelLogger,
    ) -> Result<MsgStatus, HandlerError> {
        self.action_calls.fetch_add(1, Ordering::SeqCst);
        self.play(request, log, "actions").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::message;

    #[tokio::test]
    async fn test_priority_queue_order() {
        let backend = MemoryBackend::new();
        backend.push(message(1, "WAC"));
        let mut urgent = message(2, "WAC");
        urgent.priority = MsgPriority::High;
        backend.push(urgent);
        backend.push(message(3, "WAC"));

        let timeout = Duration::from_secs(1);
        let mut order = Vec::new();
        while let Some(msg) = backend.pop_next_outgoing_msg(timeout).await.unwrap() {
            order.push(msg.id.0);
        }
        assert_eq!(order, vec![2, 1, 3]);
        assert_eq!(backend.calls().pop, 4);
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = MemoryBackend::new();
        backend.fail_next_pops(1);
        backend.fail_operation("write_msg_status");

        assert!(backend.pop_next_outgoing_msg(Duration::from_secs(1)).await.is_err());
        assert!(backend.pop_next_outgoing_msg(Duration::from_secs(1)).await.unwrap().is_none());

        let status = MsgStatus::new(MsgUuid::nil(), MsgId(1), MsgStatusValue::Wired);
        assert!(backend.write_msg_status(&status).await.is_err());
        assert_eq!(backend.calls().write_msg_status, 1);

        backend.clear_failures();
        assert!(backend.write_msg_status(&status).await.is_ok());
    }

    #[tokio::test]
    async fn test_conversation_records() {
        let backend = MemoryBackend::new();
        let first = message(1, "WAC");
        let second = message(2, "WAC");
        let (first_uuid, second_uuid) = (first.uuid, second.uuid);
        backend.push_conversation(vec![first, second]);

        let events = backend.get_run_events_by_msg_uuid(second_uuid).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].msg_uuid, Some(first_uuid));

        let record = backend.get_message(first_uuid).await.unwrap().unwrap();
        assert_eq!(record.status, MsgStatusValue::Queued);
    }

    #[tokio::test]
    async fn test_scripted_handler_outcomes() {
        let handler = ScriptedHandler::new("TG")
            .then(Scripted::Status(MsgStatusValue::Sent))
            .then(Scripted::Fail(HandlerError::vendor("rejected")));
        let msg = message(9, "TG");
        let mut log = ChannelLogger::new(contracts::ChannelLogType::MsgSend, msg.channel.uuid, Some(msg.id));

        let status = handler.send(&DispatchRequest::message(&msg), &mut log).await.unwrap();
        assert_eq!(status.status, MsgStatusValue::Sent);
        assert_eq!(status.external_id.as_deref(), Some("ext-9"));
        assert_eq!(log.logs().len(), 1);

        assert!(handler.send(&DispatchRequest::message(&msg), &mut log).await.is_err());
        // 脚本耗尽，回退为 wired
        let status = handler.send(&DispatchRequest::message(&msg), &mut log).await.unwrap();
        assert_eq!(status.status, MsgStatusValue::Wired);
        assert_eq!(handler.send_calls(), 3);
        assert!(handler.action_sender().is_none());
    }
}
