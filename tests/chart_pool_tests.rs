use std::time::Duration;

use chart_sync::api::{ChartPool, PoolConfig, PoolLease};
use chart_sync::cache::ManualClock;
use chart_sync::core::{AlignedDataset, ChartConfiguration};
use chart_sync::engine::{ChartCall, ChartHandle, ChartJournal, NullChartFactory};

struct Fixture {
    pool: ChartPool<NullChartFactory>,
    journal: ChartJournal,
    clock: ManualClock,
    config: ChartConfiguration,
    data: AlignedDataset,
    target: String,
}

fn fixture(config: PoolConfig) -> Fixture {
    let journal = ChartJournal::default();
    let clock = ManualClock::new(0);
    Fixture {
        pool: ChartPool::with_clock(
            NullChartFactory::new(journal.clone()),
            config,
            clock.shared(),
        ),
        journal,
        clock,
        config: ChartConfiguration::new().with_size(400.0, 200.0),
        data: AlignedDataset::from_dense(vec![vec![0.0, 1.0], vec![3.0, 4.0]]),
        target: "slot".to_owned(),
    }
}

#[test]
fn defaults_hold_five_charts_for_thirty_seconds() {
    let config = PoolConfig::default();
    assert_eq!(config.max_pool_size, 5);
    assert_eq!(config.max_idle_ms, 30_000);
}

#[test]
fn busy_charts_are_never_handed_out_twice() {
    let mut f = fixture(PoolConfig::default());

    let first = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    let second = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");

    assert_ne!(first.pooled_id(), second.pooled_id());
    assert_eq!(f.pool.len(), 2);
    assert_eq!(f.pool.idle_count(), 0);
}

#[test]
fn reuse_without_dimensions_only_refills_data() {
    let mut f = fixture(PoolConfig::default());
    let lease = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    f.pool.release(lease.pooled_id().expect("pooled"));
    f.journal.take();

    let sizeless = ChartConfiguration::new();
    f.pool.acquire(&sizeless, &f.data, &f.target).expect("reuse");

    assert_eq!(
        f.journal.take(),
        vec![ChartCall::SetData {
            handle_id: 1,
            series_count: 2,
            point_count: 2,
        }]
    );
}

#[test]
fn handle_rejecting_reuse_is_destroyed_and_replaced() {
    let mut f = fixture(PoolConfig::default());
    f.pool.factory_mut().reject_updates(true);
    let lease = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    let id = lease.pooled_id().expect("pooled");
    f.pool.release(id);
    f.journal.take();

    let replacement = f.pool.acquire(&f.config, &f.data, &f.target).expect("replace");

    assert_ne!(replacement.pooled_id(), Some(id));
    assert!(f.pool.handle(id).is_none());
    let calls = f.journal.take();
    assert_eq!(calls[0], ChartCall::Destroy { handle_id: 1 });
    assert!(matches!(calls[1], ChartCall::Create { handle_id: 2, .. }));
    assert_eq!(f.pool.len(), 1);
}

#[test]
fn unpooled_chart_is_owned_by_the_caller() {
    let mut f = fixture(PoolConfig::default().with_max_pool_size(0));

    let lease = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    let PoolLease::Unpooled(chart) = lease else {
        panic!("pool with no capacity must hand out unpooled charts");
    };
    chart.destroy();

    assert!(f.pool.is_empty());
    assert_eq!(f.journal.len(), 2);
}

#[test]
fn idle_expiry_uses_the_configured_window() {
    let mut f = fixture(PoolConfig::default().with_max_idle(Duration::from_secs(5)));
    let lease = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    f.pool.release(lease.pooled_id().expect("pooled"));

    f.clock.advance(Duration::from_millis(5_001));
    f.journal.take();
    f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");

    let calls = f.journal.take();
    assert_eq!(calls[0], ChartCall::Destroy { handle_id: 1 });
    assert!(matches!(calls[1], ChartCall::Create { handle_id: 2, .. }));
}

#[test]
fn release_of_unknown_id_is_ignored() {
    let mut f = fixture(PoolConfig::default());
    let lease = f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    let id = lease.pooled_id().expect("pooled");
    f.pool.destroy_all();

    assert!(!f.pool.release(id));
    assert!(f.pool.handle_mut(id).is_none());
}

#[test]
fn dropping_the_pool_destroys_every_chart() {
    let mut f = fixture(PoolConfig::default());
    f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    f.pool.acquire(&f.config, &f.data, &f.target).expect("acquire");
    f.journal.take();

    let journal = f.journal.clone();
    drop(f);

    assert_eq!(
        journal.take(),
        vec![
            ChartCall::Destroy { handle_id: 1 },
            ChartCall::Destroy { handle_id: 2 },
        ]
    );
}
