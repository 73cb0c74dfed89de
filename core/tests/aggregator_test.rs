use async_trait::async_trait;
use mockall::mock;
use parley_core::search::{
    Definition, LookupProvider, RateResult, SearchAggregator, SearchData, SearchParams,
    SearchProvider, SearchQuery, SearchRequest, SearchResult, SearchSource, TimeLimit,
};
use parley_core::{ParleyError, Result};
use serde_json::json;
use std::sync::Arc;

mock! {
    pub Search {}

    #[async_trait]
    impl SearchProvider for Search {
        fn name(&self) -> &'static str;
        async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>>;
    }
}

mock! {
    pub Lookup {}

    #[async_trait]
    impl LookupProvider for Lookup {
        async fn currency(&self, from: &str, to: &str, amount: f64) -> Result<RateResult>;
        async fn define(&self, word: &str) -> Result<Vec<Definition>>;
    }
}

fn hit(n: usize) -> SearchResult {
    SearchResult {
        title: format!("title {n}"),
        url: format!("https://example.com/{n}"),
        description: format!("description {n}"),
    }
}

fn provider(name: &'static str) -> MockSearch {
    let mut m = MockSearch::new();
    m.expect_name().return_const(name);
    m
}

fn aggregator(primary: MockSearch, fallback: MockSearch, lookup: MockLookup) -> SearchAggregator {
    SearchAggregator::new(Arc::new(primary), Arc::new(fallback), Arc::new(lookup))
}

#[tokio::test]
async fn test_primary_results_skip_fallback() -> Result<()> {
    let mut primary = provider("primary");
    primary
        .expect_search()
        .times(1)
        .returning(|_| Ok(vec![hit(1), hit(2)]));
    let mut fallback = provider("fallback");
    fallback.expect_search().times(0);

    let agg = aggregator(primary, fallback, MockLookup::new());
    let outcome = agg.search(&SearchQuery::new("rust")).await?;
    assert_eq!(outcome.source, SearchSource::Primary);
    assert_eq!(outcome.results, vec![hit(1), hit(2)]);
    Ok(())
}

#[tokio::test]
async fn test_primary_error_falls_back_once() -> Result<()> {
    let mut primary = provider("primary");
    primary
        .expect_search()
        .times(1)
        .returning(|_| Err(ParleyError::SearchError("blocked".into())));
    let mut fallback = provider("fallback");
    fallback
        .expect_search()
        .withf(|q| q.query == "rust" && q.time.is_none())
        .times(1)
        .returning(|_| Ok(vec![hit(7)]));

    let agg = aggregator(primary, fallback, MockLookup::new());
    let mut query = SearchQuery::new("rust");
    query.time = Some(TimeLimit::Week);
    let outcome = agg.search(&query).await?;
    assert_eq!(outcome.source, SearchSource::Fallback);
    assert_eq!(outcome.results, vec![hit(7)]);
    Ok(())
}

#[tokio::test]
async fn test_empty_primary_triggers_fallback() -> Result<()> {
    let mut primary = provider("primary");
    primary.expect_search().times(1).returning(|_| Ok(vec![]));
    let mut fallback = provider("fallback");
    fallback.expect_search().times(1).returning(|_| Ok(vec![hit(3)]));

    let agg = aggregator(primary, fallback, MockLookup::new());
    let resp = agg.handle(SearchRequest::web("rust")).await;
    assert!(resp.success);
    assert_eq!(resp.source, Some(SearchSource::Fallback));

    let body = serde_json::to_value(&resp)?;
    assert_eq!(
        body,
        json!({
            "success": true,
            "source": "fallback",
            "data": [{"title": "title 3", "url": "https://example.com/3", "description": "description 3"}]
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_both_failing_is_a_structured_failure() {
    let mut primary = provider("primary");
    primary
        .expect_search()
        .returning(|_| Err(ParleyError::SearchError("primary down".into())));
    let mut fallback = provider("fallback");
    fallback
        .expect_search()
        .times(1)
        .returning(|_| Err(ParleyError::SearchError("fallback down".into())));

    let agg = aggregator(primary, fallback, MockLookup::new());
    let resp = agg.handle(SearchRequest::web("rust")).await;
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("fallback down"));
    assert!(resp.data.is_none());
}

#[tokio::test]
async fn test_currency_bypasses_search_chain() {
    let mut primary = provider("primary");
    primary.expect_search().times(0);
    let mut fallback = provider("fallback");
    fallback.expect_search().times(0);
    let mut lookup = MockLookup::new();
    lookup
        .expect_currency()
        .withf(|from, to, amount| from == "USD" && to == "EUR" && *amount == 10.0)
        .times(1)
        .returning(|from, to, amount| {
            Ok(RateResult {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                converted: 9.2,
                rate: 0.92,
                timestamp: None,
            })
        });

    let agg = aggregator(primary, fallback, lookup);
    let params = SearchParams {
        kind: Some("currency".into()),
        from: Some("usd".into()),
        to: Some("eur".into()),
        amount: Some("10".into()),
        ..Default::default()
    };
    let resp = agg.handle_params(&params).await;
    assert!(resp.success);
    assert!(resp.source.is_none());
    match resp.data {
        Some(SearchData::Rate(rate)) => assert!((rate.converted - 9.2).abs() < 1e-9),
        other => panic!("unexpected data: {:?}", other),
    }
}

#[tokio::test]
async fn test_lookup_failure_has_no_fallback() {
    let mut fallback = provider("fallback");
    fallback.expect_search().times(0);
    let mut lookup = MockLookup::new();
    lookup
        .expect_define()
        .times(1)
        .returning(|_| Err(ParleyError::LookupError("No definitions found for 'zzz'".into())));

    let agg = aggregator(provider("primary"), fallback, lookup);
    let resp = agg
        .handle(SearchRequest::Define { word: "zzz".into() })
        .await;
    assert!(!resp.success);
    assert_eq!(resp.error.as_deref(), Some("No definitions found for 'zzz'"));
}

#[tokio::test]
async fn test_malformed_query_never_reaches_providers() {
    let mut primary = provider("primary");
    primary.expect_search().times(0);
    let mut fallback = provider("fallback");
    fallback.expect_search().times(0);

    let agg = aggregator(primary, fallback, MockLookup::new());
    let resp = agg.handle_params(&SearchParams::default()).await;
    assert_eq!(resp.error.as_deref(), Some("Search query 'q' is required"));

    let params = SearchParams {
        q: Some("rust".into()),
        time: Some("h".into()),
        ..Default::default()
    };
    assert!(!agg.handle_params(&params).await.success);
}

#[tokio::test]
async fn test_result_cap_is_passed_down() -> Result<()> {
    let mut primary = provider("primary");
    primary
        .expect_search()
        .withf(|q| q.max_results == 5)
        .times(1)
        .returning(|_| Ok(vec![hit(1)]));

    let agg = aggregator(primary, provider("fallback"), MockLookup::new()).with_max_results(5);
    agg.search(&SearchQuery::new("rust")).await?;
    Ok(())
}
