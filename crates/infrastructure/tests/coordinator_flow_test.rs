//! 协调器与内存消息存储的端到端流程测试

use std::sync::Arc;
use std::time::Duration;

use application::{
    ChangeNameOutcome, ChatCoordinator, ChatCoordinatorDependencies, ConnectOutcome,
    CoordinatorSettings, HistoryOutcome, HtmlSanitizer, ManualClock, MessageStore,
    SendMessageOutcome,
};
use config::{LimitsConfig, RateLimitRule};
use domain::{ConnectionId, DisplayName, Origin};
use infrastructure::MemoryMessageStore;

struct Harness {
    coordinator: Arc<ChatCoordinator>,
    clock: Arc<ManualClock>,
    store: Arc<MemoryMessageStore>,
}

fn harness(limits: LimitsConfig) -> Harness {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(MemoryMessageStore::new(100));
    let coordinator = ChatCoordinator::new(
        CoordinatorSettings {
            limits,
            propagate_renames: true,
        },
        ChatCoordinatorDependencies {
            message_store: store.clone(),
            sanitizer: Arc::new(HtmlSanitizer),
            clock: clock.clone(),
        },
    );
    Harness {
        coordinator: Arc::new(coordinator),
        clock,
        store,
    }
}

fn scenario_limits() -> LimitsConfig {
    LimitsConfig {
        send_message: RateLimitRule::new(5, 3),
        ban_duration_seconds: 10,
        ..LimitsConfig::default()
    }
}

#[tokio::test]
async fn spam_is_banned_and_recovers_after_ban_expires() {
    let Harness {
        coordinator,
        clock,
        store,
    } = harness(scenario_limits());
    let origin = Origin::new("1.2.3.4");

    let first = ConnectionId::generate();
    assert_eq!(
        coordinator.on_connect(first, origin.clone()),
        ConnectOutcome::Allowed
    );
    let renamed = coordinator.change_name(first, &origin, "alice").await.unwrap();
    assert!(matches!(renamed, ChangeNameOutcome::Applied { .. }));

    for text in ["a", "b", "c"] {
        let outcome = coordinator.send_message(first, &origin, text).await.unwrap();
        assert!(matches!(outcome, SendMessageOutcome::Stored { .. }), "{text} should be stored");
    }

    let fourth = coordinator.send_message(first, &origin, "d").await.unwrap();
    assert_eq!(
        fourth,
        SendMessageOutcome::Banned {
            retry_after: Duration::from_secs(10)
        }
    );
    assert!(fourth.should_terminate());

    clock.advance(Duration::from_secs(1));
    let fifth = coordinator.send_message(first, &origin, "e").await.unwrap();
    assert_eq!(
        fifth,
        SendMessageOutcome::Banned {
            retry_after: Duration::from_secs(9)
        }
    );

    // 传输层收到 Banned 后断开连接
    coordinator.on_disconnect(first);
    assert_eq!(coordinator.connections().active_connections(&origin), 0);

    // 封禁期间重连仍被拒绝
    assert!(matches!(
        coordinator.on_connect(ConnectionId::generate(), origin.clone()),
        ConnectOutcome::Banned { .. }
    ));

    clock.advance(Duration::from_secs(9));
    let second = ConnectionId::generate();
    assert_eq!(
        coordinator.on_connect(second, origin.clone()),
        ConnectOutcome::Allowed
    );
    assert_eq!(
        coordinator.change_name(second, &origin, "alice").await.unwrap(),
        ChangeNameOutcome::Applied {
            name: DisplayName::parse("alice").unwrap(),
            changed: true,
        }
    );
    let after_ban = coordinator.send_message(second, &origin, "f").await.unwrap();
    assert!(matches!(after_ban, SendMessageOutcome::Stored { .. }));

    let texts: Vec<_> = store
        .get_last(10)
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.text)
        .collect();
    assert_eq!(texts, vec!["a", "b", "c", "f"]);
}

#[tokio::test]
async fn history_reflects_renames() {
    let Harness { coordinator, .. } = harness(LimitsConfig::default());
    let origin = Origin::new("10.0.0.7");
    let id = ConnectionId::generate();
    coordinator.on_connect(id, origin.clone());

    coordinator.change_name(id, &origin, "bob").await.unwrap();
    coordinator.send_message(id, &origin, "<hello>").await.unwrap();
    coordinator.change_name(id, &origin, "robert").await.unwrap();

    let HistoryOutcome::Results { messages } =
        coordinator.get_history(id, &origin, 0).await.unwrap()
    else {
        panic!("history should be available");
    };
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].user_name, "robert");
    assert_eq!(messages[0].text, "&lt;hello&gt;");
}

#[tokio::test]
async fn capacity_is_enforced_per_origin() {
    let limits = LimitsConfig {
        max_connections_per_origin: 2,
        ..LimitsConfig::default()
    };
    let Harness { coordinator, .. } = harness(limits);
    let origin = Origin::new("1.2.3.4");

    for _ in 0..2 {
        assert_eq!(
            coordinator.on_connect(ConnectionId::generate(), origin.clone()),
            ConnectOutcome::Allowed
        );
    }
    let third = coordinator.on_connect(ConnectionId::generate(), origin.clone());
    assert_eq!(third, ConnectOutcome::CapacityExceeded);
    assert!(third.should_terminate());
    assert_eq!(coordinator.connections().active_connections(&origin), 2);

    // 其他来源不受影响
    assert_eq!(
        coordinator.on_connect(ConnectionId::generate(), Origin::new("5.6.7.8")),
        ConnectOutcome::Allowed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_connect_disconnect_keeps_counts_exact() {
    let limits = LimitsConfig {
        connect: RateLimitRule::new(60, 10_000),
        max_connections_per_origin: 1_000,
        ..LimitsConfig::default()
    };
    let Harness { coordinator, .. } = harness(limits);
    let origins: Vec<_> = (0..8).map(|i| Origin::new(format!("10.0.0.{i}"))).collect();

    let tasks: Vec<_> = (0..400)
        .map(|i| {
            let coordinator = coordinator.clone();
            // 每个来源各分到 25 个偶数 i 和 25 个奇数 i
            let origin = origins[(i / 2) % origins.len()].clone();
            tokio::spawn(async move {
                let id = ConnectionId::generate();
                assert_eq!(coordinator.on_connect(id, origin), ConnectOutcome::Allowed);
                tokio::task::yield_now().await;
                if i % 2 == 0 {
                    coordinator.on_disconnect(id);
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for origin in &origins {
        assert_eq!(coordinator.connections().active_connections(origin), 25);
    }
    assert_eq!(coordinator.connections().total_connections(), 200);
}

#[tokio::test]
async fn concurrent_renames_to_one_name_have_one_winner() {
    let Harness { coordinator, .. } = harness(LimitsConfig::default());

    let participants: Vec<_> = (0..12)
        .map(|i| {
            let id = ConnectionId::generate();
            let origin = Origin::new(format!("172.16.0.{i}"));
            coordinator.on_connect(id, origin.clone());
            (id, origin)
        })
        .collect();

    let tasks: Vec<_> = participants
        .into_iter()
        .map(|(id, origin)| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.change_name(id, &origin, "Contested").await })
        })
        .collect();

    let mut applied = 0;
    let mut taken = 0;
    for task in tasks {
        match task.await.unwrap().unwrap() {
            ChangeNameOutcome::Applied { .. } => applied += 1,
            ChangeNameOutcome::NameTaken => taken += 1,
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(taken, 11);
}
