use crate::network::{FrequencyEntryRef, TransitNetwork};
use std::{collections::HashMap, time::Instant};
use tracing::debug;

impl TransitNetwork {
    /// Regenerates every transient lookup from the persistent arrays.
    /// Idempotent; run after the last feed load and after applying a
    /// scenario. None of these maps is ever serialized.
    pub fn rebuild_indexes(&mut self) {
        let now = Instant::now();

        let mut patterns_for_stop: Vec<Vec<u32>> = vec![Vec::new(); self.stop_count()];
        for (index, pattern) in self.trip_patterns.iter().enumerate() {
            let index = index as u32;
            for &stop in pattern.stops.iter() {
                let touched = &mut patterns_for_stop[stop as usize];
                // patterns are visited in ascending order, so duplicates
                // from loop routes land adjacently
                if touched.last() != Some(&index) {
                    touched.push(index);
                }
            }
        }
        self.patterns_for_stop = patterns_for_stop
            .into_iter()
            .map(|patterns| patterns.into())
            .collect();

        let mut stop_for_street_vertex = HashMap::new();
        for (stop, &vertex) in self.street_vertex_for_stop.iter().enumerate() {
            if vertex >= 0 {
                stop_for_street_vertex.insert(vertex as u32, stop as u32);
            }
        }
        self.stop_for_street_vertex = stop_for_street_vertex;

        self.stop_index_for_id = self
            .stop_id_for_index
            .iter()
            .enumerate()
            .map(|(index, id)| (id.clone(), index as u32))
            .collect();

        let mut frequency_entry_for_id = HashMap::new();
        for (p, pattern) in self.trip_patterns.iter().enumerate() {
            for (s, schedule) in pattern.schedules.iter().enumerate() {
                let Some(frequencies) = &schedule.frequencies else {
                    continue;
                };
                for (e, id) in frequencies.entry_ids.iter().enumerate() {
                    frequency_entry_for_id.insert(
                        id.clone(),
                        FrequencyEntryRef {
                            pattern: p as u32,
                            schedule: s as u32,
                            entry: e as u32,
                        },
                    );
                }
            }
        }
        self.frequency_entry_for_id = frequency_entry_for_id;

        debug!(
            stops = self.stop_count(),
            patterns = self.pattern_count(),
            "Rebuilding indexes took {:?}",
            now.elapsed()
        );
    }
}
