use anyhow::Result;
use chrono::Utc;
use gather_chain::{MemoryPinStore, MockChain};
use gather_lifecycle::{CheckInManager, Clock, EventRegistry, EventScheduler, ManualClock};
use gather_rewards::{BadgeIssuer, MileageManager, RewardPolicy};
use gather_storage::{Backend, MemoryBackend};
use gather_types::{Address, BadgeDraft, BadgeKind, EventDraft, EventKind, Points};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn demo_user(index: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(index as u64).to_be_bytes());
    Address::from_bytes(bytes)
}

/// Drives one event from creation to settled rewards against the mock
/// ledger, stepping a manual clock instead of waiting on real time.
pub async fn run_demo(attendees: usize) -> Result<()> {
    info!(attendees, "Running local demo");

    let treasury = Address::from_bytes([0xee; 20]);
    let operator = Address::from_bytes([0x0f; 20]);

    let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let chain = MockChain::new().with_operator(operator);
    chain.fund(treasury, Points::new(1_000_000)).await;
    let chain = Arc::new(chain);

    let registry = EventRegistry::new(Arc::clone(&store), clock.clone()).await?;
    let scheduler = EventScheduler::new(
        Arc::clone(&store),
        clock.clone(),
        Duration::from_secs(60),
    );
    let check_in = CheckInManager::new(Arc::clone(&store), clock.clone());
    let badges = BadgeIssuer::new(
        Arc::clone(&store),
        chain.clone(),
        Arc::new(MemoryPinStore::new()),
        treasury,
    );
    let policy = RewardPolicy {
        review_reward: Points::new(5),
        exchange_threshold: Points::new(5),
        treasury,
        operator,
    };
    let mileage = MileageManager::new(Arc::clone(&store), chain, policy);

    let now = clock.now();
    let event = registry
        .create_event(EventDraft {
            title: "Neighborhood cleanup".to_string(),
            content: "Gloves and bags provided".to_string(),
            location: "Riverside park".to_string(),
            capacity: attendees as u32,
            kind: EventKind::Fcfs,
            recruit_start_at: now + chrono::Duration::hours(1),
            recruit_end_at: now + chrono::Duration::hours(2),
            event_start_at: now + chrono::Duration::hours(2),
            event_end_at: now + chrono::Duration::hours(3),
        })
        .await?;
    info!(event_id = %event.id, "Event created");

    // Recruitment opens.
    clock.set(now + chrono::Duration::minutes(61));
    scheduler.tick().await?;

    let users: Vec<Address> = (1..=attendees).map(demo_user).collect();
    for user in &users {
        registry.register(event.id, *user).await?;
    }
    info!(count = users.len(), "Attendees registered");

    // Event starts; put up the check-in code and scan everyone in.
    clock.set(now + chrono::Duration::minutes(121));
    scheduler.tick().await?;
    let qr = check_in.activate(event.id).await?;
    for user in &users {
        check_in.scan(event.id, &qr.token, *user).await?;
    }
    info!("All attendees checked in");

    // Event ends.
    clock.set(now + chrono::Duration::minutes(181));
    let summary = scheduler.tick().await?;
    info!(transitions = summary.transitions, "Event finished");

    let badge = badges
        .create_badge(
            event.id,
            BadgeDraft {
                name: "Cleanup crew".to_string(),
                description: "Showed up and pitched in".to_string(),
                image: "https://gather.example/badges/cleanup.png".to_string(),
                kind: BadgeKind::Attendance,
                quantity: attendees as u32,
            },
        )
        .await?;
    info!(token_id = %badge.token_id, "Badge minted");

    let report = badges.distribute(event.id).await?;
    info!(
        issued = report.issued(),
        failed = report.failed(),
        "Badges distributed"
    );

    for user in &users {
        mileage.grant_review_mileage(event.id, *user).await?;
    }
    info!(count = users.len(), "Review mileage granted");

    let receipt = mileage.exchange_mileage(users[0]).await?;
    info!(
        user = %receipt.user,
        exchanged = receipt.amount.value(),
        "Mileage exchanged for tokens"
    );

    let wallet = mileage.wallet(users[0]).await?;
    println!();
    println!("Demo wallet {}", wallet.address);
    println!("  badges:  {}", wallet.badge_count);
    println!("  mileage: {}", wallet.mileage.value());
    println!("  tokens:  {}", wallet.tokens.value());

    let stats = store.stats().await?;
    println!(
        "Store: {} events, {} entries, {} badges, {} wallets",
        stats.event_count, stats.entry_count, stats.badge_count, stats.wallet_count
    );

    Ok(())
}
