// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Progress chart extraction.
//!
//! Projects a routine's progress history into one weight trend per slot,
//! limited to entries recorded after a cutoff instant. The projection is a
//! plain function over an already loaded [`Routine`]: no I/O and no shared
//! state, so handlers may call it from any task.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Exercise, ProgressEntry, Routine, RoutineData};

/// Label format applied to progress timestamps (UTC month/day).
pub const LABEL_FORMAT: &str = "%m/%d";

/// Index-aligned label and weight sequences: `labels[i]` labels `weights[i]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartData {
    /// Date labels in `MM/DD` form.
    pub labels: Vec<String>,
    /// Weight values, unchanged from the progress entries.
    pub weights: Vec<f64>,
}

impl ChartData {
    fn push(&mut self, entry: &ProgressEntry) {
        self.labels
            .push(entry.created_at.format(LABEL_FORMAT).to_string());
        self.weights.push(entry.weight);
    }

    /// Number of points in the series.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True when no entry survived the cutoff.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

/// Chart series for one routine slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    /// The slot's exercise.
    pub exercise: Exercise,
    /// The filtered weight trend.
    pub chart_data: ChartData,
}

/// Build one chart series per routine slot from entries strictly after `cutoff`.
///
/// The output has exactly one item per `routine.routine_data` entry, in the
/// same order. Slots whose history is empty after filtering keep their
/// position with empty sequences, and duplicate exercise references are not
/// merged.
pub fn extract_chart_data(routine: &Routine, cutoff: DateTime<Utc>) -> Vec<ChartSeries> {
    routine
        .routine_data
        .iter()
        .map(|slot| series_for_slot(slot, cutoff))
        .collect()
}

fn series_for_slot(slot: &RoutineData, cutoff: DateTime<Utc>) -> ChartSeries {
    let mut chart_data = ChartData::default();
    for entry in slot.progress.iter().filter(|p| p.created_at > cutoff) {
        chart_data.push(entry);
    }

    ChartSeries {
        exercise: slot.exercise.clone(),
        chart_data,
    }
}
