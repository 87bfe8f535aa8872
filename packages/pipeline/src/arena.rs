//! Fitted models keyed by partition.

use std::collections::BTreeMap;

use crime_forecast_forecast_models::ModelState;

/// One fitted model per partition key. Models never share state; a later
/// fit for the same key replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct ModelArena {
    models: BTreeMap<String, ModelState>,
}

impl ModelArena {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            models: BTreeMap::new(),
        }
    }

    /// Stores the model for `key`, returning the one it replaced.
    pub fn insert(&mut self, key: impl Into<String>, model: ModelState) -> Option<ModelState> {
        self.models.insert(key.into(), model)
    }

    /// Model fitted for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ModelState> {
        self.models.get(key)
    }

    /// Number of stored models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether no model is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_forecast_forecast_models::{TrendState, UncertaintySettings};

    use super::*;

    fn model(rows: usize) -> ModelState {
        ModelState {
            history_start: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            history_end: NaiveDate::from_ymd_opt(2023, 3, 1).unwrap(),
            training_rows: rows,
            t_scale_days: 59.0,
            y_scale: 1.0,
            trend: TrendState {
                offset: 0.0,
                base_slope: 0.0,
                changepoints: vec![],
                deltas: vec![],
            },
            seasonalities: vec![],
            sigma: 0.0,
            uncertainty: UncertaintySettings {
                interval_width: 0.8,
                samples: 10,
                seed: 1,
            },
        }
    }

    #[test]
    fn refit_replaces_previous_model() {
        let mut arena = ModelArena::new();
        assert!(arena.insert("B2", model(10)).is_none());
        assert!(arena.insert("A1", model(20)).is_none());

        let replaced = arena.insert("B2", model(30)).unwrap();
        assert_eq!(replaced.training_rows, 10);
        assert_eq!(arena.len(), 2);
        assert_eq!(arena.get("B2").unwrap().training_rows, 30);
        assert!(arena.get("C11").is_none());
    }

    #[test]
    fn empty_arena_has_no_models() {
        let arena = ModelArena::default();
        assert!(arena.is_empty());
        assert_eq!(arena.len(), 0);
        assert!(arena.get("A1").is_none());
    }
}
