//! ---
//! vt_section: "02-simulation"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Alarm persistence over a trailing history window."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::Serialize;

use super::{Alarm, AlarmKind, FaultEngine};
use crate::telemetry::TelemetryRecord;

/// Share of window records that must carry the flag for an alarm to persist.
pub const PERSISTENCE_FRACTION: f64 = 0.7;

/// Per-alarm persistence verdicts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PersistenceMap(IndexMap<AlarmKind, bool>);

impl PersistenceMap {
    /// Persistence verdict for `kind`. Alarms never evaluated count as persistent.
    pub fn is_persistent(&self, kind: AlarmKind) -> bool {
        self.0.get(&kind).copied().unwrap_or(true)
    }

    pub fn insert(&mut self, kind: AlarmKind, persistent: bool) {
        self.0.insert(kind, persistent);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AlarmKind, bool)> + '_ {
        self.0.iter().map(|(kind, persistent)| (*kind, *persistent))
    }
}

impl FaultEngine {
    /// Debounce active alarms against the last [`FaultEngine::window_len`] records.
    ///
    /// An active alarm with no history to check against is persistent.
    pub fn temporal_validate<'a, I>(&self, history: I, alarms: &[Alarm]) -> PersistenceMap
    where
        I: IntoIterator<Item = &'a TelemetryRecord>,
        I::IntoIter: DoubleEndedIterator,
    {
        let window: Vec<&TelemetryRecord> = history
            .into_iter()
            .rev()
            .take(self.window_len)
            .collect();

        let mut map = PersistenceMap::default();
        for alarm in alarms {
            let persistent = if !alarm.active {
                false
            } else if window.is_empty() {
                true
            } else {
                let flagged = window
                    .iter()
                    .filter(|record| record.alarms.get(alarm.kind))
                    .count();
                flagged as f64 / window.len() as f64 >= PERSISTENCE_FRACTION
            };
            map.insert(alarm.kind, persistent);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::faults::{AlarmFlags, AlarmThresholds};
    use crate::telemetry::Telemetry;

    fn engine() -> FaultEngine {
        // 0.5 s ticks with a 5 s window inspect exactly ten records.
        FaultEngine::new(AlarmThresholds::default(), 0.5, 5.0)
    }

    fn history(pattern: &[bool]) -> Vec<TelemetryRecord> {
        pattern
            .iter()
            .enumerate()
            .map(|(i, on)| {
                let mut alarms = AlarmFlags::default();
                alarms.set(AlarmKind::PipHigh, *on);
                TelemetryRecord {
                    time_s: i as f64 * 0.5,
                    telemetry: Telemetry::default(),
                    alarms,
                }
            })
            .collect()
    }

    fn active_pip_alarm(active: bool) -> Vec<Alarm> {
        let telemetry = Telemetry {
            pip_cmh2o: if active { 55.0 } else { 20.0 },
            ..Telemetry::default()
        };
        engine().compute_alarms(&telemetry)
    }

    #[test]
    fn three_of_ten_is_transient() {
        let records = history(&[
            true, false, false, true, false, false, false, true, false, false,
        ]);
        let map = engine().temporal_validate(&records, &active_pip_alarm(true));
        assert!(!map.is_persistent(AlarmKind::PipHigh));
    }

    #[test]
    fn eight_of_ten_is_persistent() {
        let records = history(&[
            true, true, false, true, true, true, false, true, true, true,
        ]);
        let map = engine().temporal_validate(&records, &active_pip_alarm(true));
        assert!(map.is_persistent(AlarmKind::PipHigh));
    }

    #[test]
    fn only_trailing_window_counts() {
        let mut pattern = vec![true; 20];
        pattern.extend([false; 10]);
        let map = engine().temporal_validate(&history(&pattern), &active_pip_alarm(true));
        assert!(!map.is_persistent(AlarmKind::PipHigh));
    }

    #[test]
    fn empty_history_is_conservative() {
        let records: Vec<TelemetryRecord> = Vec::new();
        let map = engine().temporal_validate(&records, &active_pip_alarm(true));
        assert!(map.is_persistent(AlarmKind::PipHigh));
        assert!(!map.is_persistent(AlarmKind::LeakHigh));
    }

    #[test]
    fn inactive_alarm_never_persists() {
        let records = history(&[true; 10]);
        let map = engine().temporal_validate(&records, &active_pip_alarm(false));
        assert!(!map.is_persistent(AlarmKind::PipHigh));
    }

    #[test]
    fn unknown_alarm_defaults_to_persistent() {
        assert!(PersistenceMap::default().is_persistent(AlarmKind::Spo2Low));
    }
}
