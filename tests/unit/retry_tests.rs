/*!
 * Tests for the retrying translator and credential rotation
 */

use std::sync::Arc;

use epubtrans::events::{EventLevel, EventLog};
use epubtrans::providers::mock::MockProvider;
use epubtrans::translation::TranslationOutcome;

use crate::common::{TEST_KEYS, test_translator};

#[tokio::test]
async fn test_translate_withAlwaysRateLimited_shouldReturnInputAfterMaxRetries() {
    let provider = Arc::new(MockProvider::rate_limited());
    let events = EventLog::new();
    let translator = test_translator(provider.clone(), 5, events.clone());

    let outcome = translator.translate("<p>Keep me</p>", "test-model").await;

    assert_eq!(outcome, TranslationOutcome::Fallback("<p>Keep me</p>".to_string()));
    assert_eq!(provider.request_count(), 5);

    let keys = provider.keys_used();
    assert!(keys.windows(2).all(|pair| pair[0] != pair[1]), "consecutive attempts reused a key: {:?}", keys);
    assert_eq!(keys[..3], TEST_KEYS.map(String::from));

    assert_eq!(events.count(EventLevel::Warning), 5);
    assert_eq!(events.count(EventLevel::Error), 1);
}

#[tokio::test]
async fn test_translate_withFencedAnswer_shouldStripFences() {
    let provider = Arc::new(MockProvider::fenced());
    let translator = test_translator(provider, 1, EventLog::new());

    let outcome = translator.translate("<p>Hi</p>", "test-model").await;

    assert_eq!(outcome, TranslationOutcome::Translated(MockProvider::expected_translation("<p>Hi</p>")));
}

#[tokio::test]
async fn test_translate_withEmptyAnswers_shouldFallBack() {
    let provider = Arc::new(MockProvider::empty());
    let translator = test_translator(provider.clone(), 2, EventLog::new());

    let outcome = translator.translate("<p>Hi</p>", "test-model").await;

    assert!(outcome.is_fallback());
    assert_eq!(outcome.text(), "<p>Hi</p>");
    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_translate_concurrently_shouldSpreadKeys() {
    let provider = Arc::new(MockProvider::working());
    let translator = test_translator(provider.clone(), 1, EventLog::new());

    let texts: Vec<String> = (0..6).map(|i| format!("text {}", i)).collect();
    futures::future::join_all(texts.iter().map(|t| translator.translate(t, "test-model"))).await;

    let keys = provider.keys_used();
    for key in TEST_KEYS {
        assert_eq!(keys.iter().filter(|k| k.as_str() == key).count(), 2);
    }
}
