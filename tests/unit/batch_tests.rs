/*!
 * Tests for concurrency-limited, order-preserving scheduling
 */

use std::sync::Arc;

use epubtrans::app_config::SchedulingMode;
use epubtrans::events::EventLog;
use epubtrans::providers::mock::{MockLatency, MockProvider};
use epubtrans::translation::ConcurrencyLimitedBatcher;

use crate::common::test_translator;

async fn translate_all(
    provider: Arc<MockProvider>,
    texts: Vec<String>,
    limit: usize,
    mode: SchedulingMode,
) -> Vec<String> {
    let translator = test_translator(provider, 1, EventLog::new());
    let batcher = ConcurrencyLimitedBatcher::new(limit, mode);
    let outcomes = batcher
        .run(texts, |text| {
            let translator = &translator;
            async move { translator.translate(&text, "test-model").await }
        })
        .await;
    outcomes.into_iter().map(|o| o.into_text()).collect()
}

fn texts(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("<p>chunk {}</p>", i)).collect()
}

#[tokio::test]
async fn test_run_inBothModes_shouldNeverExceedLimit() {
    for mode in [SchedulingMode::Batched, SchedulingMode::Sliding] {
        for (n, limit) in [(1, 1), (7, 3), (10, 2), (4, 8)] {
            let provider = Arc::new(MockProvider::working().with_latency(MockLatency::Fixed { delay_ms: 5 }));
            translate_all(provider.clone(), texts(n), limit, mode).await;

            assert!(
                provider.max_in_flight() <= limit,
                "{:?}: {} in flight with limit {}",
                mode,
                provider.max_in_flight(),
                limit
            );
            assert_eq!(provider.max_in_flight(), limit.min(n), "{:?} should saturate the limit", mode);
            assert_eq!(provider.request_count(), n);
        }
    }
}

#[tokio::test]
async fn test_run_withLaterCallsFinishingFirst_shouldKeepInputOrder() {
    for mode in [SchedulingMode::Batched, SchedulingMode::Sliding] {
        let provider = Arc::new(
            MockProvider::working().with_latency(MockLatency::Decreasing { start_ms: 60, step_ms: 10 }),
        );
        let input = texts(5);

        let output = translate_all(provider, input.clone(), 5, mode).await;

        let expected: Vec<String> = input.iter().map(|t| MockProvider::expected_translation(t)).collect();
        assert_eq!(output, expected, "{:?}", mode);
    }
}

#[tokio::test]
async fn test_run_withZeroLimit_shouldRunOneAtATime() {
    let provider = Arc::new(MockProvider::working().with_latency(MockLatency::Fixed { delay_ms: 2 }));
    let batcher = ConcurrencyLimitedBatcher::new(0, SchedulingMode::Sliding);
    assert_eq!(batcher.limit(), 1);

    translate_all(provider.clone(), texts(3), 0, SchedulingMode::Sliding).await;

    assert_eq!(provider.max_in_flight(), 1);
}
