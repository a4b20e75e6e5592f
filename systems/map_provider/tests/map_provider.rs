use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use arena_level_core::{MapResponse, MapService, MapServiceError};
use arena_level_map_provider::{MapError, MapProvider};

#[derive(Clone, Default)]
struct CountingService {
    calls: Arc<AtomicU32>,
}

impl CountingService {
    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MapService for CountingService {
    fn fetch(&self, service_name: &str) -> Result<MapResponse, MapServiceError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        if service_name == "broken" {
            return Ok(MapResponse {
                width: 2,
                height: 2,
                resolution: 1.0,
                origin: [0.0, 0.0],
                data: vec![0; 3],
            });
        }
        if service_name == "silent" {
            return Ok(MapResponse {
                width: 0,
                height: 0,
                resolution: 1.0,
                origin: [0.0, 0.0],
                data: Vec::new(),
            });
        }

        Ok(MapResponse {
            width: 4,
            height: 3,
            resolution: 0.5,
            origin: [0.0, 0.0],
            data: vec![0; 12],
        })
    }
}

#[test]
fn repeated_requests_return_identical_instance_without_refetching() {
    let service = CountingService::default();
    let provider = MapProvider::new(service.clone());

    let first = provider
        .get_map("static_map")
        .expect("fetch succeeds")
        .expect("map present");
    let second = provider
        .get_map("static_map")
        .expect("cached lookup succeeds")
        .expect("map present");

    assert!(Arc::ptr_eq(&first, &second), "cache must hand out one instance");
    assert_eq!(service.calls(), 1, "second request must not reach the service");
    assert_eq!(provider.fetch_count(), 1);
}

#[test]
fn cached_map_is_returned_for_any_name() {
    let service = CountingService::default();
    let provider = MapProvider::new(service.clone());

    let first = provider
        .get_map("static_map")
        .expect("fetch succeeds")
        .expect("map present");
    let other = provider
        .get_map("another_map")
        .expect("cached lookup succeeds")
        .expect("map present");
    let unnamed = provider
        .get_map("")
        .expect("cached lookup succeeds")
        .expect("map present");

    assert!(Arc::ptr_eq(&first, &other));
    assert!(Arc::ptr_eq(&first, &unnamed));
    assert_eq!(service.calls(), 1);
}

#[test]
fn empty_name_without_cache_is_absent_and_offline() {
    let service = CountingService::default();
    let provider = MapProvider::new(service.clone());

    let map = provider.get_map("").expect("empty name never fails");

    assert!(map.is_none());
    assert_eq!(service.calls(), 0, "no network call for an empty name");
    assert_eq!(provider.fetch_count(), 0);
}

#[test]
fn malformed_response_is_reported_and_not_cached() {
    let service = CountingService::default();
    let provider = MapProvider::new(service.clone());

    let error = provider.get_map("broken").expect_err("malformed map rejected");
    assert!(matches!(error, MapError::InvalidGrid { ref service, .. } if service == "broken"));
    assert!(provider.cached().is_none());

    let recovered = provider
        .get_map("static_map")
        .expect("later fetch succeeds")
        .expect("map present");
    assert_eq!(recovered.width(), 4);
    assert_eq!(service.calls(), 2);
}

#[test]
fn empty_response_is_a_service_error() {
    let provider = MapProvider::new(CountingService::default());

    let error = provider.get_map("silent").expect_err("empty map rejected");

    assert_eq!(
        error,
        MapError::Service(MapServiceError::EmptyResponse {
            service: String::from("silent"),
        })
    );
}

#[test]
fn fetched_maps_receive_distinct_identities() {
    let first = MapProvider::new(CountingService::default());
    let second = MapProvider::new(CountingService::default());

    let a = first.get_map("static_map").expect("fetch").expect("map");
    let b = second.get_map("static_map").expect("fetch").expect("map");

    assert_ne!(a.id(), b.id(), "identity keys memoization, not content");
    assert_eq!(a.cells(), b.cells());
}

#[test]
fn concurrent_first_requests_share_a_single_fetch() {
    let service = CountingService::default();
    let provider = MapProvider::new(service.clone());

    let grids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| provider.get_map("static_map")))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("fetching thread panicked")
                    .expect("fetch succeeds")
                    .expect("map present")
            })
            .collect()
    });

    assert_eq!(provider.fetch_count(), 1);
    assert_eq!(service.calls(), 1);
    assert!(grids.iter().all(|grid| Arc::ptr_eq(grid, &grids[0])));
}
