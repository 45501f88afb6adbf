use chrono::Utc;
use gather_node::{GatherNode, NodeConfig};
use gather_storage::Backend;
use gather_types::{Address, BadgeDraft, BadgeKind, EventDraft, EventKind, EventStatus, Points};

fn test_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.storage.backend = "memory".to_string();
    config.chain.mode = "mock".to_string();
    config
}

fn past_recruit_draft() -> EventDraft {
    // Recruitment and start already passed, so one scheduler pass lands
    // the event in Progressing; the end is far enough out to stay there.
    let now = Utc::now();
    EventDraft {
        title: "Board game night".to_string(),
        content: "Bring your own snacks".to_string(),
        location: "Community hall".to_string(),
        capacity: 10,
        kind: EventKind::Fcfs,
        recruit_start_at: now - chrono::Duration::hours(3),
        recruit_end_at: now - chrono::Duration::hours(1),
        event_start_at: now - chrono::Duration::hours(1),
        event_end_at: now + chrono::Duration::hours(6),
    }
}

#[tokio::test]
async fn test_node_initialization() {
    let node = GatherNode::new(test_config()).await.unwrap();
    assert_eq!(node.name(), "gather-node");

    let stats = node.stats().await.unwrap();
    assert_eq!(stats.store.event_count, 0);
    assert!(stats.events_by_status.is_empty());
}

#[tokio::test]
async fn test_services_share_one_store() {
    let node = GatherNode::new(test_config()).await.unwrap();
    let user = Address::from_bytes([7u8; 20]);

    // Create through the registry, advance through the scheduler, and
    // check in through the check-in service. Each sees the others' writes.
    let event = node.registry.create_event(past_recruit_draft()).await.unwrap();

    let summary = node.scheduler.tick().await.unwrap();
    assert_eq!(summary.advanced, 1);
    assert_eq!(summary.transitions, 2);

    let event = node.registry.get_event(event.id).await.unwrap();
    assert_eq!(event.status, EventStatus::Progressing);

    node.registry.register(event.id, user).await.unwrap();
    let qr = node.check_in.activate(event.id).await.unwrap();
    node.check_in.scan(event.id, &qr.token, user).await.unwrap();

    let entries = node.registry.list_entries(event.id).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].is_confirmed);

    let stats = node.stats().await.unwrap();
    assert_eq!(stats.events_by_status.get("progressing"), Some(&1));
    assert_eq!(stats.store.entry_count, 1);
}

#[tokio::test]
async fn test_rewards_flow_through_node_wiring() {
    let mut config = test_config();
    config.rewards.review_reward = 5;
    config.rewards.exchange_threshold = 5;
    let node = GatherNode::new(config).await.unwrap();
    let user = Address::from_bytes([9u8; 20]);

    let event = node.registry.create_event(past_recruit_draft()).await.unwrap();
    node.scheduler.tick().await.unwrap();
    node.registry.register(event.id, user).await.unwrap();
    let qr = node.check_in.activate(event.id).await.unwrap();
    node.check_in.scan(event.id, &qr.token, user).await.unwrap();

    // End the event by hand; the real path waits on wall-clock time.
    let moved = node
        .store()
        .update_event_status(event.id, EventStatus::Progressing, EventStatus::Finished)
        .await
        .unwrap();
    assert!(moved);

    let badge = node
        .badges
        .create_badge(
            event.id,
            BadgeDraft {
                name: "Regular".to_string(),
                description: "Came to game night".to_string(),
                image: "https://gather.example/badges/regular.png".to_string(),
                kind: BadgeKind::Attendance,
                quantity: 5,
            },
        )
        .await
        .unwrap();
    assert_eq!(badge.remain_quantity, 5);

    let report = node.badges.distribute(event.id).await.unwrap();
    assert_eq!(report.issued(), 1);
    assert_eq!(report.failed(), 0);

    // The mock treasury seeded at startup funds the exchange.
    node.mileage.grant_review_mileage(event.id, user).await.unwrap();
    let receipt = node.mileage.exchange_mileage(user).await.unwrap();
    assert_eq!(receipt.amount, Points::new(5));

    let wallet = node.mileage.wallet(user).await.unwrap();
    assert_eq!(wallet.badge_count, 1);
    assert!(wallet.mileage.is_zero());
    assert_eq!(wallet.tokens, Points::new(5));
}

#[tokio::test]
async fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gather-config.toml");

    let mut config = NodeConfig::default();
    config.node.name = "round-trip".to_string();
    config.scheduler.tick_secs = 7;
    config.save_to_file(&path).unwrap();

    let loaded = NodeConfig::from_file(&path).unwrap();
    assert_eq!(loaded.node.name, "round-trip");
    assert_eq!(loaded.scheduler.tick_secs, 7);

    let node = GatherNode::new(loaded).await.unwrap();
    assert_eq!(node.name(), "round-trip");
}

#[tokio::test]
async fn test_demo_runs_clean() {
    gather_node::cli::run_demo(2).await.unwrap();
}
