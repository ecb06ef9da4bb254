// tests/token_tests.rs
use std::num::NonZeroUsize;

use proptest::prelude::*;

use warp_pool::{TokenRegistry, BAD_TOKEN};

mod common;
use common::opts;

fn registry(capacity: usize) -> TokenRegistry {
    TokenRegistry::new(NonZeroUsize::new(capacity).unwrap())
}

#[test]
fn get_same_token_test() {
    let registry = registry(16);
    let options = opts(&["-r", "bilinear", "-t_srs", "epsg:3857"]);
    let token1 = registry.get_token("geo.tif", &options);
    let token2 = registry.get_token("geo.tif", &options);
    assert_ne!(token1, BAD_TOKEN);
    assert_eq!(token1, token2);
}

#[test]
fn get_different_uri_tokens_test() {
    let registry = registry(16);
    let options = opts(&["-r", "bilinear"]);
    let token1 = registry.get_token("geo.tif", &options);
    let token2 = registry.get_token("geo2.tif", &options);
    assert_ne!(token1, token2);
}

#[test]
fn get_different_options_tokens_test() {
    let registry = registry(16);
    let token1 = registry.get_token("geo.tif", &opts(&["-r", "bilinear"]));
    let token2 = registry.get_token("geo.tif", &opts(&["-r", "near"]));
    assert_ne!(token1, token2);
}

#[test]
fn option_order_is_significant() {
    let registry = registry(16);
    let token1 = registry.get_token("geo.tif", &opts(&["-tap", "-q"]));
    let token2 = registry.get_token("geo.tif", &opts(&["-q", "-tap"]));
    assert_ne!(token1, token2);
}

#[test]
fn query_round_trips_the_key() {
    let registry = registry(16);
    let options = opts(&["-r", "bilinear", "-dstnodata", "107"]);
    let token = registry.get_token("geo.tif", &options);
    let key = registry.query_token(token).expect("token should be live");
    assert_eq!(key.uri, "geo.tif");
    assert_eq!(key.options, options);
}

#[test]
fn bad_token_and_unknown_tokens_are_absent() {
    let registry = registry(16);
    assert!(registry.query_token(BAD_TOKEN).is_none());
    assert!(registry.query_token(93).is_none());
}

#[test]
fn capacity_is_enforced_by_lru_eviction() {
    let registry = registry(4);
    let tokens: Vec<_> = (0..8)
        .map(|i| registry.get_token(&format!("geo{}.tif", i), &[]))
        .collect();
    assert_eq!(registry.len(), 4);
    // The four oldest mappings are gone, the four newest survive.
    for token in &tokens[..4] {
        assert!(registry.query_token(*token).is_none());
    }
    for (i, token) in tokens[4..].iter().enumerate() {
        let key = registry.query_token(*token).expect("recent token evicted");
        assert_eq!(key.uri, format!("geo{}.tif", i + 4));
    }
}

#[test]
fn querying_promotes_against_eviction() {
    let registry = registry(2);
    let hot = registry.get_token("hot.tif", &[]);
    let cold = registry.get_token("cold.tif", &[]);
    // Touch the older mapping, then intern a third key.
    assert!(registry.query_token(hot).is_some());
    registry.get_token("new.tif", &[]);
    assert!(registry.query_token(hot).is_some());
    assert!(registry.query_token(cold).is_none());
}

proptest! {
    #[test]
    fn token_round_trip(
        uri in "[a-z0-9_/.]{1,40}",
        options in prop::collection::vec("[-a-z0-9:]{1,12}", 0..8),
    ) {
        let registry = registry(64);
        let token = registry.get_token(&uri, &options);
        prop_assert_ne!(token, BAD_TOKEN);
        let key = registry.query_token(token).expect("fresh token must resolve");
        prop_assert_eq!(key.uri, uri);
        prop_assert_eq!(key.options, options);
    }

    #[test]
    fn distinct_live_tokens_map_to_their_own_keys(
        uris in prop::collection::hash_set("[a-z]{1,12}\\.tif", 2..10),
    ) {
        let registry = registry(64);
        let pairs: Vec<_> = uris
            .iter()
            .map(|uri| (uri.clone(), registry.get_token(uri, &[])))
            .collect();
        for (uri, token) in &pairs {
            let key = registry.query_token(*token).expect("live token");
            prop_assert_eq!(&key.uri, uri);
        }
    }
}
