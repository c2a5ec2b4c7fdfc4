//! Integration tests for the window/sync protocol, driven tick by tick.

use std::sync::Arc;

use telewin::config::{SeriesConfig, WindowConfig};
use telewin::consumer::Consumer;
use telewin::error::{Result, SeriesError, TelewinError};
use telewin::mirror::MirrorSet;
use telewin::registry::Registry;
use telewin::sync::SyncOp;

fn registry(span: i64, names: &[&str]) -> Arc<Registry> {
    let mut config = WindowConfig {
        retention_span: span,
        ..WindowConfig::default()
    };
    for name in names {
        config = config.with_series(SeriesConfig::new(*name, "v"));
    }
    Arc::new(Registry::new(config).unwrap())
}

fn tick_to(registry: &Registry, target: i64) {
    while registry.last_x() < target {
        registry.tick();
    }
}

fn ops(consumer: &mut Consumer<MirrorSet>) -> Vec<SyncOp> {
    consumer
        .egress_mut()
        .take_log()
        .into_iter()
        .map(|(_, op)| op)
        .collect()
}

fn assert_mirror_matches(registry: &Registry, consumer: &Consumer<MirrorSet>, name: &str) {
    let snap = registry.snapshot(name).unwrap();
    assert_eq!(consumer.egress().xs(name), Some(snap.xs), "ticks of {name}");
    assert_eq!(consumer.egress().ys(name), Some(snap.ys), "values of {name}");
}

#[test]
fn test_end_to_end_scenario() -> Result<()> {
    let reg = registry(5, &["s"]);
    let s = reg.handle("s")?;

    reg.add(s, 1, 10.0)?;
    reg.add(s, 2, 20.0)?;
    reg.add(s, 3, 15.0)?;
    tick_to(&reg, 3);

    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    consumer.sync_now()?;
    assert_eq!(
        ops(&mut consumer),
        vec![SyncOp::ReplaceAll {
            xs: vec![1, 2, 3],
            ys: vec![10.0, 20.0, 15.0],
        }]
    );

    reg.add(s, 4, 25.0)?;
    let outcome = reg.tick();
    assert_eq!(outcome.tick, 4);
    assert_eq!(outcome.evicted, 0);
    consumer.sync_now()?;
    assert_eq!(
        ops(&mut consumer),
        vec![SyncOp::Append {
            xs: vec![4],
            ys: vec![25.0],
        }]
    );

    for x in 5..=9 {
        reg.add(s, x, x as f64)?;
        reg.tick();
    }
    assert_eq!(reg.last_x(), 9);
    consumer.sync_now()?;
    assert_eq!(
        ops(&mut consumer),
        vec![
            SyncOp::DropFromFront { count: 3 },
            SyncOp::Append {
                xs: vec![5, 6, 7, 8, 9],
                ys: vec![5.0, 6.0, 7.0, 8.0, 9.0],
            },
        ]
    );
    assert_mirror_matches(&reg, &consumer, "s");
    Ok(())
}

#[test]
fn test_one_new_sample_is_one_append() -> Result<()> {
    let reg = registry(100, &["a", "b"]);
    reg.push("a", 1.0)?;
    reg.push("b", 2.0)?;
    reg.tick();

    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    consumer.sync_now()?;
    consumer.egress_mut().take_log();

    reg.push("a", 3.0)?;
    reg.tick();
    let report = consumer.sync_now()?;
    assert_eq!(report.ops, 1);
    assert_eq!(report.series_touched, 1);
    assert_eq!(
        consumer.egress_mut().take_log(),
        vec![(
            "a".to_string(),
            SyncOp::Append {
                xs: vec![1],
                ys: vec![3.0],
            }
        )]
    );
    Ok(())
}

#[test]
fn test_stale_consumer_gets_full_replace() -> Result<()> {
    let reg = registry(4, &["s"]);
    let s = reg.handle("s")?;
    for x in 1..=3 {
        reg.add(s, x, x as f64)?;
    }
    reg.tick();

    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    consumer.sync_now()?;
    ops(&mut consumer);

    // The consumer sleeps through enough ticks for its whole mirror to age out.
    for x in 4..=20 {
        reg.add(s, x, x as f64)?;
        reg.tick();
    }
    consumer.sync_now()?;
    let sent = ops(&mut consumer);
    assert_eq!(sent.len(), 1);
    assert!(matches!(sent[0], SyncOp::ReplaceAll { .. }));
    assert_mirror_matches(&reg, &consumer, "s");
    Ok(())
}

#[test]
fn test_consumers_sync_independently() -> Result<()> {
    let reg = registry(10, &["s"]);
    let mut eager = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    let mut lazy = Consumer::attach(Arc::clone(&reg), MirrorSet::new());

    for round in 0..60 {
        reg.push("s", f64::from(round % 7) - 3.0)?;
        reg.tick();
        eager.sync_now()?;
        assert_mirror_matches(&reg, &eager, "s");
        if round % 9 == 0 {
            lazy.sync_now()?;
            assert_mirror_matches(&reg, &lazy, "s");
        }
    }

    // The eager consumer never needed more than the first replace.
    let replaces = eager
        .egress_mut()
        .take_log()
        .into_iter()
        .filter(|(_, op)| matches!(op, SyncOp::ReplaceAll { .. }))
        .count();
    assert_eq!(replaces, 1);
    Ok(())
}

#[test]
fn test_compaction_is_invisible_to_consumers() -> Result<()> {
    let reg = registry(8, &["s"]);
    let s = reg.handle("s")?;
    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());

    for x in 0..500 {
        reg.add(s, x, ((x * 13) % 17) as f64)?;
        tick_to(&reg, x + 1);
        if x % 3 == 0 {
            consumer.sync_now()?;
            assert_mirror_matches(&reg, &consumer, "s");
        }
    }
    let stored = reg.with_series(s, |series| series.stored_len())?;
    assert!(stored <= 8 * 5 / 4 + 2);
    Ok(())
}

#[test]
fn test_silent_source_keeps_mirror() -> Result<()> {
    let reg = registry(3, &["s", "keepalive"]);
    reg.push("s", 1.0)?;
    reg.tick();

    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    consumer.sync_now()?;
    ops(&mut consumer);

    // Another source keeps ticks busy so "s" ages out completely.
    for _ in 0..6 {
        reg.push("keepalive", 0.0)?;
        reg.tick();
    }
    assert!(reg.snapshot("s")?.xs.is_empty());
    assert_eq!(reg.snapshot("s")?.min_y, None);

    consumer.sync_now()?;
    let sent = consumer.egress_mut().take_log();
    assert!(sent.iter().all(|(name, _)| name == "keepalive"));
    assert_eq!(consumer.egress().xs("s"), Some(vec![0]));
    Ok(())
}

#[test]
fn test_unknown_series_is_recoverable() {
    let reg = registry(3, &["s"]);
    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    assert!(matches!(
        consumer.sync_series("nope"),
        Err(TelewinError::Series(SeriesError::UnknownSeries { .. }))
    ));
    assert_eq!(consumer.sync_series("s").unwrap(), 0);
}

#[test]
fn test_axis_ranges_reach_egress() -> Result<()> {
    let config = WindowConfig::default()
        .with_series(SeriesConfig::new("cell.1", "volts"))
        .with_series(SeriesConfig::new("cell.2", "volts"))
        .with_series(SeriesConfig::new("pv.power", "watts"));
    let reg = Arc::new(Registry::new(config)?);
    reg.push("cell.1", 3.31)?;
    reg.push("cell.2", 3.27)?;
    reg.tick();

    let mut consumer = Consumer::attach(Arc::clone(&reg), MirrorSet::new());
    consumer.sync_now()?;
    let axes = consumer.egress().axes();
    assert_eq!(axes.len(), 1);
    assert_eq!(axes["volts"].min, 3.27);
    assert_eq!(axes["volts"].max, 3.31);
    Ok(())
}
