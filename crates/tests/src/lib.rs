//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约冒烟测试
//! - scheduler -> dispatcher -> 旁路 -> broker 全内存链路
//! - 磁盘上的配置文件

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod support {
    use chrono::Utc;
    use serde_json::Value;
    use uuid::Uuid;

    use contracts::{ActionType, ChannelRef, ContactRef, MsgId, MsgPriority, OutgoingMsg};

    pub fn channel(channel_type: &str) -> ChannelRef {
        ChannelRef {
            uuid: Uuid::new_v4(),
            channel_type: channel_type.into(),
            name: format!("{channel_type} channel"),
            address: "+15550001111".to_string(),
        }
    }

    pub fn contact() -> ContactRef {
        ContactRef {
            uuid: Uuid::new_v4(),
            name: "Ana".to_string(),
        }
    }

    pub fn message(id: i64, channel: &ChannelRef, contact: &ContactRef) -> OutgoingMsg {
        OutgoingMsg {
            id: MsgId(id),
            uuid: Uuid::new_v4(),
            channel: channel.clone(),
            contact: contact.clone(),
            urn: "whatsapp:15551234567".to_string(),
            text: format!("message {id}"),
            attachments: Vec::new(),
            quick_replies: Vec::new(),
            metadata: Value::Null,
            action: ActionType::None,
            is_resend: false,
            priority: MsgPriority::Default,
            created_on: Utc::now(),
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use contracts::{
        ActionType, ChannelHandler, HandlerError, MsgId, MsgStatusValue, SenderSettings, SideChannelSettings,
    };
    use publisher::{
        EventPublisher, MemoryBroker, MemoryTransport, MultiPublisher, ResilientPublisher,
        RetryPolicy,
    };
    use sender::{
        HandlerRegistry, MemoryBackend, MsgDispatcher, Scheduler, Scripted, ScriptedHandler,
        SideChannel, TaskTracker,
    };
    use serde_json::json;

    use super::support::{channel, contact, message};

    struct Engine {
        backend: Arc<MemoryBackend>,
        scheduler: Scheduler,
        tracker: TaskTracker,
    }

    impl Engine {
        fn new(
            handlers: Vec<Arc<ScriptedHandler>>,
            publisher: Option<Arc<dyn EventPublisher>>,
            settings: SenderSettings,
        ) -> Self {
            let backend = Arc::new(MemoryBackend::new());

            let mut registry = HandlerRegistry::new();
            for handler in handlers {
                registry
                    .register(handler as Arc<dyn ChannelHandler>)
                    .unwrap();
            }

            let side_channel = SideChannel::new(publisher, &SideChannelSettings::default());
            let dispatcher = MsgDispatcher::new(
                backend.clone(),
                Arc::new(registry),
                side_channel,
                settings,
            );

            let tracker = TaskTracker::new();
            let scheduler = Scheduler::new(backend.clone(), Arc::new(dispatcher), tracker.clone());
            Self {
                backend,
                scheduler,
                tracker,
            }
        }

        async fn run_until(&self, mut done: impl FnMut(&MemoryBackend) -> bool) {
            self.scheduler.start().unwrap();
            while !done(&self.backend) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            self.scheduler.stop();
            self.tracker.close();
            self.tracker.wait().await;
        }
    }

    /// Scheduler -> dispatcher -> MultiPublisher -> in-memory broker
    ///
    /// 验证完整的数据流：
    /// 1. 每条入队消息只送达厂商一次并完成
    /// 2. 重复消息与循环消息不会送达厂商
    /// 3. 每次完成的发送在每个 broker 上产生计费事件
    #[tokio::test(start_paused = true)]
    async fn test_e2e_dispatch_to_brokers() {
        let primary = MemoryBroker::new();
        let replica = MemoryBroker::new();
        let publisher = Arc::new(MultiPublisher::with_targets(vec![
            ResilientPublisher::spawn(
                MemoryTransport::new("primary", primary.clone()),
                RetryPolicy::new(3, Duration::from_millis(10)),
                100,
            ),
            ResilientPublisher::spawn(
                MemoryTransport::new("replica", replica.clone()),
                RetryPolicy::new(3, Duration::from_millis(10)),
                100,
            ),
        ]));

        let handler = Arc::new(ScriptedHandler::new("WAC"));
        let engine = Engine::new(
            vec![handler.clone()],
            Some(publisher.clone() as Arc<dyn EventPublisher>),
            SenderSettings {
                max_workers: 4,
                ..Default::default()
            },
        );

        let wac = channel("WAC");
        for id in 1..=6 {
            engine.backend.push(message(id, &wac, &contact()));
        }
        engine.backend.mark_sent(MsgId(5));
        engine.backend.mark_loop(MsgId(6));

        engine.run_until(|backend| backend.completed().len() == 6).await;

        let mut sent = handler.sent();
        sent.sort();
        assert_eq!(sent, vec![MsgId(1), MsgId(2), MsgId(3), MsgId(4)]);

        let status_of = |id| engine.backend.status_of(MsgId(id)).unwrap().status;
        assert_eq!(status_of(5), MsgStatusValue::Wired);
        assert_eq!(status_of(6), MsgStatusValue::Failed);

        // 失败消息不发布；重复消息仍计为 wired
        drop(engine);
        let publisher = Arc::try_unwrap(publisher).ok().unwrap();
        let snapshots = publisher.shutdown().await;
        assert_eq!(snapshots.len(), 2);
        for (_, snapshot) in &snapshots {
            assert_eq!(snapshot.published_count, 5);
            assert_eq!(snapshot.failed_count, 0);
        }
        assert_eq!(primary.published_keys(), vec!["billing".to_string(); 5]);
        assert_eq!(replica.published().len(), 5);

        let payload: serde_json::Value =
            serde_json::from_slice(&primary.published()[0].1).unwrap();
        assert_eq!(payload["direction"], "O");
        assert_eq!(payload["channel_type"], "WAC");
    }

    /// A broker outage must not slow down or fail dispatching
    #[tokio::test(start_paused = true)]
    async fn test_e2e_broker_outage_is_isolated() {
        let broker = MemoryBroker::new();
        broker.fail_next_connects(1_000);
        let publisher = Arc::new(MultiPublisher::with_targets(vec![ResilientPublisher::spawn(
            MemoryTransport::new("down", broker.clone()),
            RetryPolicy::new(2, Duration::from_millis(10)),
            100,
        )]));

        let handler = Arc::new(ScriptedHandler::new("TG"));
        let engine = Engine::new(
            vec![handler.clone()],
            Some(publisher.clone() as Arc<dyn EventPublisher>),
            SenderSettings {
                max_workers: 2,
                ..Default::default()
            },
        );

        let tg = channel("TG");
        for id in 1..=3 {
            engine.backend.push(message(id, &tg, &contact()));
        }

        engine.run_until(|backend| backend.completed().len() == 3).await;
        assert_eq!(handler.send_calls(), 3);
        assert!(engine
            .backend
            .completed()
            .iter()
            .all(|(_, status)| *status == MsgStatusValue::Wired));

        drop(engine);
        let publisher = Arc::try_unwrap(publisher).ok().unwrap();
        let snapshots = publisher.shutdown().await;
        assert_eq!(snapshots[0].1.failed_count, 3);
        assert_eq!(snapshots[0].1.published_count, 0);
        assert!(broker.published().is_empty());
    }

    /// Wait-listed channel: a contact's messages reach the vendor in order
    #[tokio::test(start_paused = true)]
    async fn test_e2e_conversation_order_is_kept() {
        let handler = Arc::new(
            ScriptedHandler::new("WAC")
                .with_fallback(Scripted::Status(MsgStatusValue::Delivered))
                .with_delay(Duration::from_millis(100)),
        );
        let engine = Engine::new(
            vec![handler.clone()],
            None,
            SenderSettings {
                max_workers: 3,
                wait_media_channels: vec!["WAC".into()],
                wait_media_count: 10,
                wait_media_sleep_ms: 500,
                ..Default::default()
            },
        );

        let wac = channel("WAC");
        let ana = contact();
        engine
            .backend
            .push_conversation((1..=3).map(|id| message(id, &wac, &ana)).collect());

        engine.run_until(|backend| backend.completed().len() == 3).await;

        assert_eq!(handler.sent(), vec![MsgId(1), MsgId(2), MsgId(3)]);
        assert!(engine.backend.calls().get_message >= 2);
    }

    /// Mixed traffic: unknown channel types error, actions never persist
    #[tokio::test(start_paused = true)]
    async fn test_e2e_mixed_channels_and_actions() {
        let wac = Arc::new(ScriptedHandler::new("WAC").with_actions());
        let tg = Arc::new(
            ScriptedHandler::new("TG")
                .then(Scripted::FailLogged(HandlerError::vendor("bad request"))),
        );
        let engine = Engine::new(
            vec![wac.clone(), tg.clone()],
            None,
            SenderSettings {
                max_workers: 2,
                ..Default::default()
            },
        );

        let wac_channel = channel("WAC");
        let tg_channel = channel("TG");
        let ana = contact();

        let mut typing = message(1, &wac_channel, &ana);
        typing.action = ActionType::TypingIndicator;
        engine.backend.push(typing);
        engine.backend.push(message(2, &tg_channel, &ana));
        engine.backend.push(message(3, &channel("XX"), &ana));

        let mut template = message(4, &wac_channel, &ana);
        template.metadata = json!({
            "templating": {
                "template": {"uuid": "4ed5000f-5c94-4143-9697-b7cbd230a381", "name": "welcome"},
                "language": "eng"
            }
        });
        engine.backend.push(template);

        engine
            .run_until(|backend| backend.queue_len() == 0 && backend.completed().len() == 3)
            .await;

        assert_eq!(wac.action_calls(), 1);
        assert_eq!(wac.send_calls(), 1);

        let status_of = |id| engine.backend.status_of(MsgId(id)).unwrap().status;
        assert_eq!(status_of(2), MsgStatusValue::Errored);
        assert_eq!(status_of(3), MsgStatusValue::Errored);
        assert_eq!(status_of(4), MsgStatusValue::Wired);
        assert!(engine.backend.status_of(MsgId(1)).is_none());

        assert!(engine
            .backend
            .channel_logs()
            .iter()
            .any(|log| log.msg_id == Some(MsgId(2)) && log.is_error()));
    }
}

#[cfg(test)]
mod config_tests {
    use std::io::Write;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{GatewayConfig, PublisherTargetConfig, TransportKind};
    use tempfile::NamedTempFile;

    const GATEWAY_TOML: &str = r#"
[sender]
max_workers = 8
wait_media_channels = ["WAC"]
wait_media_count = 5

[side_channel]
billing_routing_key = "billing"
template_routing_key = "template"

[[side_channel.publishers]]
name = "events"
transport = "redis"
url = "redis://localhost:6379"
stream = "gateway.events"

[[side_channel.publishers]]
name = "audit"
transport = "log"

[observability]
log_format = "compact"
metrics_port = 9100
"#;

    #[test]
    fn test_load_config_file_from_disk() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(GATEWAY_TOML.as_bytes()).unwrap();

        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.sender.max_workers, 8);
        assert!(config.sender.waits_for_media(&"wac".into()));
        assert_eq!(config.side_channel.publishers.len(), 2);
        assert_eq!(config.side_channel.publishers[1].transport, TransportKind::Log);
        assert_eq!(config.observability.metrics_port, Some(9100));
    }

    #[test]
    fn test_written_config_loads_back() {
        let mut config = GatewayConfig::default();
        config.sender.max_workers = 3;
        config.side_channel.publishers.push(PublisherTargetConfig {
            name: "events".into(),
            transport: TransportKind::Redis,
            url: Some("redis://cache:6379/2".into()),
            stream: "gateway.events".into(),
            retry_attempts: 5,
            retry_delay_ms: 250,
            publish_timeout_ms: 2000,
            queue_capacity: 64,
        });

        let json = ConfigLoader::to_json(&config).unwrap();
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let loaded = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(loaded.sender.max_workers, 3);
        assert_eq!(loaded.side_channel.publishers[0].retry_attempts, 5);

        let toml = ConfigLoader::to_toml(&loaded).unwrap();
        let reparsed = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();
        assert_eq!(reparsed.side_channel.publishers[0].queue_capacity, 64);
    }

    #[tokio::test]
    async fn test_publishers_built_from_config_file() {
        let config = ConfigLoader::load_from_str(GATEWAY_TOML, ConfigFormat::Toml).unwrap();
        let publisher =
            publisher::MultiPublisher::from_config(&config.side_channel.publishers).unwrap();

        assert_eq!(publisher.len(), 2);
        assert_eq!(publisher::EventPublisher::name(&publisher), "events+audit");
        publisher.shutdown().await;
    }
}
