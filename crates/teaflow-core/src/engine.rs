//! The engine context: one store, and every component wired onto it.

use std::path::Path;
use std::sync::Arc;

use crate::error::{CoreError, Result};
use crate::feedback::FeedbackAnalytics;
use crate::learning::PersonalizationStore;
use crate::library::TeaLibrary;
use crate::scheduler::{BrewParams, ScheduleBreakdown, ScheduleComputer};
use crate::storage::{Config, Database, KvStore, MemoryStore};
use crate::sync::{LogSink, OfflineSync, SyncSink};
use crate::tea::TeaProfile;

/// Brew engine context.
///
/// Construct one per process (or per test) and share it; every component is
/// internally synchronized.
pub struct TeaFlow {
    config: Config,
    store: Arc<dyn KvStore>,
    personalization: Arc<PersonalizationStore>,
    sync: Arc<OfflineSync>,
    feedback: FeedbackAnalytics,
    library: TeaLibrary,
}

impl TeaFlow {
    /// Open the engine over the SQLite store in the data directory.
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open()?;
        Ok(Self::with_store(config, Arc::new(db), Arc::new(LogSink)))
    }

    /// Open the engine over a SQLite file at an explicit path.
    pub fn open_at(config: Config, path: &Path) -> Result<Self> {
        let db = Database::open_at(path)?;
        Ok(Self::with_store(config, Arc::new(db), Arc::new(LogSink)))
    }

    /// An engine that keeps everything in memory.
    pub fn in_memory(config: Config) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()), Arc::new(LogSink))
    }

    pub fn with_store(config: Config, store: Arc<dyn KvStore>, sink: Arc<dyn SyncSink>) -> Self {
        let personalization = Arc::new(PersonalizationStore::new(store.clone()));
        let sync = Arc::new(OfflineSync::new(store.clone(), sink, config.sync.clone()));
        let feedback = FeedbackAnalytics::new(
            store.clone(),
            personalization.clone(),
            sync.clone(),
            config.feedback.clone(),
        );
        let library = TeaLibrary::new(store.clone(), sync.clone());
        Self {
            config,
            store,
            personalization,
            sync,
            feedback,
            library,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn personalization(&self) -> &PersonalizationStore {
        &self.personalization
    }

    pub fn sync(&self) -> &OfflineSync {
        &self.sync
    }

    pub fn feedback(&self) -> &FeedbackAnalytics {
        &self.feedback
    }

    pub fn library(&self) -> &TeaLibrary {
        &self.library
    }

    pub fn scheduler(&self) -> ScheduleComputer<'_> {
        ScheduleComputer::new(&self.personalization)
    }

    /// Look up a tea among built-in and user teas.
    ///
    /// # Errors
    /// Returns [`CoreError::UnknownTea`] when no tea has this id.
    pub fn tea(&self, tea_id: &str) -> Result<TeaProfile> {
        self.library
            .find_tea(tea_id)?
            .ok_or_else(|| CoreError::UnknownTea(tea_id.to_string()))
    }

    /// Brew parameters for a tea when the caller gives none: saved
    /// preferences first, then configured defaults, then the tea itself.
    pub fn default_params(&self, tea: &TeaProfile) -> Result<BrewParams> {
        let prefs = self.library.tea_prefs(&tea.id)?;
        let brew = &self.config.brew;
        Ok(BrewParams::new(
            prefs.vessel_ml.unwrap_or(brew.default_vessel_ml),
            brew.default_leaf_grams,
            prefs
                .temp_c
                .or(brew.default_temp_c)
                .unwrap_or(tea.base_temp_c),
        ))
    }

    /// Compute the schedule for a tea by id.
    pub fn schedule_for(&self, tea_id: &str, vessel_ml: f64, leaf_grams: f64, temp_c: f64) -> Result<Vec<u32>> {
        let tea = self.tea(tea_id)?;
        self.scheduler().compute_schedule(&tea, vessel_ml, leaf_grams, temp_c)
    }

    /// Like [`schedule_for`](Self::schedule_for) with the factors kept.
    pub fn schedule_breakdown_for(&self, tea_id: &str, params: BrewParams) -> Result<ScheduleBreakdown> {
        let tea = self.tea(tea_id)?;
        self.scheduler().breakdown(&tea, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::TeaPrefs;

    #[test]
    fn schedules_builtin_tea_by_id() {
        let engine = TeaFlow::in_memory(Config::default());
        let steeps = engine.schedule_for("oolong", 110.0, 7.0, 92.0).unwrap();
        assert_eq!(steeps.len(), 11);
    }

    #[test]
    fn unknown_tea_is_an_error() {
        let engine = TeaFlow::in_memory(Config::default());
        let err = engine.schedule_for("matcha", 110.0, 7.0, 80.0).unwrap_err();
        assert!(matches!(err, CoreError::UnknownTea(id) if id == "matcha"));
    }

    #[test]
    fn components_share_the_engine_store() {
        let mut config = Config::default();
        config.brew.default_tea = "green".to_string();
        let engine = TeaFlow::in_memory(config);
        assert_eq!(engine.config().brew.default_tea, "green");

        engine
            .personalization()
            .apply_offset("green", crate::buckets::VesselBucket::Medium, 0, 10.0)
            .unwrap();
        let raw = engine.store().get(crate::storage::keys::LEARNING).unwrap();
        assert!(raw.is_some_and(|r| r.contains("green")));
    }

    #[test]
    fn default_params_prefer_saved_prefs() {
        let engine = TeaFlow::in_memory(Config::default());
        let green = engine.tea("green").unwrap();
        let params = engine.default_params(&green).unwrap();
        assert_eq!(params, BrewParams::new(110.0, 7.0, 78.0));

        engine
            .library()
            .set_tea_prefs(
                "green",
                TeaPrefs {
                    vessel_ml: Some(80.0),
                    temp_c: None,
                },
            )
            .unwrap();
        let params = engine.default_params(&green).unwrap();
        assert_eq!(params.vessel_ml, 80.0);
        assert_eq!(params.temp_c, 78.0);
    }
}
