use super::{Movie, MovieCategory, MovieSource};
use crate::config::ConfigSynchronizer;
use crate::error::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info};

/// Lazily built movies, tagged with the config generation they were built under.
///
/// Any config change drops every entry, whichever category or key changed.
pub struct MovieCache<S: MovieSource> {
    source: S,
    token: Option<u64>,
    entries: HashMap<MovieCategory, Movie>,
}

impl<S: MovieSource> MovieCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            token: None,
            entries: HashMap::new(),
        }
    }

    /// Movie for a category, rebuilt if the config changed since it was cached
    pub fn value_for(
        &mut self,
        category: MovieCategory,
        sync: &mut ConfigSynchronizer,
    ) -> Result<&Movie> {
        sync.sync()?;

        let generation = sync.generation();
        if self.token != Some(generation) {
            if !self.entries.is_empty() {
                info!(
                    "Config changed (generation {}), dropping {} cached movie(s)",
                    generation,
                    self.entries.len()
                );
            }
            self.entries.clear();
            self.token = Some(generation);
        }

        match self.entries.entry(category) {
            Entry::Occupied(entry) => {
                debug!("Using cached {} movie", category);
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let movie = self.source.load(category, &sync.document())?;
                Ok(entry.insert(movie))
            }
        }
    }

    /// Drop every cached movie
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.token = None;
    }

    pub fn cached_categories(&self) -> Vec<MovieCategory> {
        let mut categories: Vec<_> = self.entries.keys().copied().collect();
        categories.sort();
        categories
    }
}
