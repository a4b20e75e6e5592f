#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Explicitly constructed cache of the static occupancy grid.
//!
//! A level without its map is meaningless, so the first successful fetch is
//! kept for the lifetime of the provider and every later request, whatever
//! service name it carries, observes the same grid instance. Hosts construct
//! one provider, wrap it in an [`Arc`] and inject it into every level that
//! should share the map.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use arena_level_core::{GridError, MapId, MapService, MapServiceError, OccupancyGrid};
use log::info;
use thiserror::Error;

static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

/// Failures surfaced while obtaining the static map.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MapError {
    /// The map-providing service failed; callers usually treat this as fatal.
    #[error(transparent)]
    Service(#[from] MapServiceError),
    /// The service answered with data that does not describe a valid grid.
    #[error("map service \"{service}\" returned an invalid grid")]
    InvalidGrid {
        /// Name of the service that produced the response.
        service: String,
        /// Validation failure reported by the grid constructor.
        #[source]
        source: GridError,
    },
}

/// Caches the first grid fetched from the injected map service.
pub struct MapProvider {
    service: Box<dyn MapService + Send + Sync>,
    cached: Mutex<Option<Arc<OccupancyGrid>>>,
    fetches: AtomicU64,
}

impl MapProvider {
    /// Creates a provider that fetches lazily from `service`.
    #[must_use]
    pub fn new<S>(service: S) -> Self
    where
        S: MapService + Send + Sync + 'static,
    {
        Self {
            service: Box::new(service),
            cached: Mutex::new(None),
            fetches: AtomicU64::new(0),
        }
    }

    /// Returns the cached grid, fetching it from `service_name` on first use.
    ///
    /// Once a grid is cached every call returns the same instance regardless
    /// of the name. Without a cached grid an empty name yields `Ok(None)` and
    /// the service is not contacted. A failed fetch leaves the cache empty.
    pub fn get_map(&self, service_name: &str) -> Result<Option<Arc<OccupancyGrid>>, MapError> {
        let mut cached = self.lock();
        if let Some(grid) = cached.as_ref() {
            return Ok(Some(Arc::clone(grid)));
        }

        if service_name.is_empty() {
            return Ok(None);
        }

        let _ = self.fetches.fetch_add(1, Ordering::Relaxed);
        let response = self.service.fetch(service_name)?;
        if response.data.is_empty() {
            return Err(MapServiceError::EmptyResponse {
                service: service_name.to_owned(),
            }
            .into());
        }

        let id = MapId::new(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed));
        let grid = OccupancyGrid::from_response(id, &response).map_err(|source| {
            MapError::InvalidGrid {
                service: service_name.to_owned(),
                source,
            }
        })?;
        info!(
            "got static map from \"{service_name}\": {}x{} cells at {} per cell",
            grid.width(),
            grid.height(),
            grid.resolution()
        );

        let grid = Arc::new(grid);
        *cached = Some(Arc::clone(&grid));
        Ok(Some(grid))
    }

    /// Returns the cached grid without contacting the service.
    #[must_use]
    pub fn cached(&self) -> Option<Arc<OccupancyGrid>> {
        self.lock().clone()
    }

    /// Number of round trips made to the map service.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<OccupancyGrid>>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MapProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapProvider")
            .field("cached", &self.cached().map(|grid| grid.id()))
            .field("fetches", &self.fetch_count())
            .finish_non_exhaustive()
    }
}
