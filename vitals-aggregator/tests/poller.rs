use std::sync::Arc;
use std::time::Duration;

use vitals_aggregator::{
    Aggregator, AggregatorError, AggregatorSettings, ManualClock, Metric, MockDataSource,
    MockDeviceLink, PollEvent, Poller,
};
use vitals_core::DeviceKind;

fn aggregator() -> Aggregator<MockDeviceLink, ManualClock> {
    let clock = ManualClock::new(jiff::Timestamp::from_second(1_700_000_000).unwrap());
    Aggregator::new(MockDeviceLink::instant(), clock, AggregatorSettings::default()).unwrap()
}

async fn next_event(rx: &mut tokio::sync::mpsc::Receiver<PollEvent>) -> PollEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("poller produced no event")
        .expect("poller channel closed")
}

#[tokio::test]
async fn idle_poller_reports_no_device() {
    let agg = aggregator();
    let cancel = tokio_util::sync::CancellationToken::new();
    let poller = Poller::new(
        agg.clone(),
        Arc::new(MockDataSource::default()),
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );

    let mut rx = poller.start(cancel.clone());

    let mut metrics = Vec::new();
    for _ in 0..2 {
        match next_event(&mut rx).await {
            PollEvent::NoDevice { metric } => metrics.push(metric),
            other => panic!("unexpected event {other:?}"),
        }
    }
    metrics.sort_by_key(|m| *m == Metric::Sleep);
    assert_eq!(metrics, vec![Metric::HeartRate, Metric::Sleep]);
    assert!(agg.history().is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn poller_stores_samples_for_connected_device() {
    let agg = aggregator();
    agg.connect(DeviceKind::AppleWatch).await.unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let poller = Poller::new(
        agg.clone(),
        Arc::new(MockDataSource::default()),
        Duration::from_millis(20),
        Duration::from_secs(3600),
    );
    let mut rx = poller.start(cancel.clone());

    let mut heart_rates = 0;
    let mut sleeps = 0;
    while heart_rates < 3 || sleeps < 1 {
        match next_event(&mut rx).await {
            PollEvent::Sampled {
                metric: Metric::HeartRate,
                sample,
            } => {
                assert!(sample.stress_level().is_some());
                heart_rates += 1;
            }
            PollEvent::Sampled {
                metric: Metric::Sleep,
                sample,
            } => {
                assert!(sample.sleep_quality().is_some());
                sleeps += 1;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    cancel.cancel();
    assert!(agg.history().len() >= 4);
}

#[tokio::test]
async fn failing_source_is_reported() {
    let agg = aggregator();
    agg.connect(DeviceKind::Fitbit).await.unwrap();

    let cancel = tokio_util::sync::CancellationToken::new();
    let poller = Poller::new(
        agg.clone(),
        Arc::new(MockDataSource::new(100)),
        Duration::from_secs(3600),
        Duration::from_secs(3600),
    );
    let mut rx = poller.start(cancel.clone());

    for _ in 0..2 {
        match next_event(&mut rx).await {
            PollEvent::Failed { error, .. } => {
                assert!(matches!(error, AggregatorError::SourceUnavailable(_)));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(agg.history().is_empty());

    cancel.cancel();
}

#[tokio::test]
async fn cancellation_closes_the_channel() {
    let agg = aggregator();
    let cancel = tokio_util::sync::CancellationToken::new();
    let poller = Poller::new(
        agg,
        Arc::new(MockDataSource::default()),
        Duration::from_millis(10),
        Duration::from_millis(10),
    );
    let mut rx = poller.start(cancel.clone());

    cancel.cancel();

    let drained = tokio::time::timeout(Duration::from_secs(2), async {
        while rx.recv().await.is_some() {}
    })
    .await;
    assert!(drained.is_ok(), "poller kept running after cancellation");
}
