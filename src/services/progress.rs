//! Progreso lógico de un turno
//!
//! Un par pickup + dropoff de la misma move request cuenta como una sola
//! unidad, completa solo cuando ambos waypoints lo están. Cada waypoint
//! regular es una unidad por sí mismo.

use std::collections::BTreeMap;

use rust_decimal::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{StopType, Waypoint};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct LogicalProgress {
    pub total: i32,
    pub completed: i32,
    /// 0-100, 0 si no hay unidades
    pub percentage: f64,
}

impl LogicalProgress {
    pub fn from_waypoints(waypoints: &[Waypoint]) -> Self {
        let mut total = 0;
        let mut completed = 0;
        // move_request_id -> (pickup completado, dropoff completado)
        let mut pairs: BTreeMap<Uuid, (bool, bool)> = BTreeMap::new();

        for waypoint in waypoints {
            match waypoint.move_request_id {
                Some(request_id) if waypoint.stop_type.is_move_stop() => {
                    let pair = pairs.entry(request_id).or_insert((false, false));
                    match waypoint.stop_type {
                        StopType::Pickup => pair.0 = waypoint.is_completed,
                        _ => pair.1 = waypoint.is_completed,
                    }
                }
                _ => {
                    total += 1;
                    if waypoint.is_completed {
                        completed += 1;
                    }
                }
            }
        }

        total += pairs.len() as i32;
        completed += pairs
            .values()
            .filter(|(pickup, dropoff)| *pickup && *dropoff)
            .count() as i32;

        Self::new(completed, total)
    }

    pub fn new(completed: i32, total: i32) -> Self {
        let percentage = if total > 0 {
            completed as f64 * 100.0 / total as f64
        } else {
            0.0
        };
        Self {
            total,
            completed,
            percentage,
        }
    }

    /// Tasa de completado con dos decimales, para el historial
    pub fn completion_rate(&self) -> Decimal {
        if self.total <= 0 {
            return Decimal::ZERO;
        }
        (Decimal::from(self.completed) * Decimal::ONE_HUNDRED / Decimal::from(self.total))
            .round_dp(2)
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn waypoint(stop_type: StopType, request: Option<Uuid>, done: bool) -> Waypoint {
        let mut w = Waypoint::new(Uuid::nil(), Uuid::new_v4(), 0, stop_type, request, Utc::now());
        w.is_completed = done;
        w
    }

    #[test]
    fn test_regular_bins_count_individually() {
        let waypoints = vec![
            waypoint(StopType::Regular, None, true),
            waypoint(StopType::Regular, None, false),
            waypoint(StopType::Regular, None, false),
        ];
        let progress = LogicalProgress::from_waypoints(&waypoints);
        assert_eq!((progress.completed, progress.total), (1, 3));
        assert!((progress.percentage - 33.33).abs() < 0.01);
        assert_eq!(progress.completion_rate(), Decimal::new(3333, 2));
    }

    #[test]
    fn test_pair_counts_once_and_needs_both_stops() {
        let request = Uuid::new_v4();
        for (pickup_done, dropoff_done, expected) in [
            (false, false, 0),
            (true, false, 0),
            (false, true, 0),
            (true, true, 1),
        ] {
            let waypoints = vec![
                waypoint(StopType::Pickup, Some(request), pickup_done),
                waypoint(StopType::Dropoff, Some(request), dropoff_done),
                waypoint(StopType::Regular, None, false),
            ];
            let progress = LogicalProgress::from_waypoints(&waypoints);
            assert_eq!(progress.total, 2);
            assert_eq!(progress.completed, expected);
            assert!(progress.completed <= progress.total);
        }
    }

    #[test]
    fn test_lone_completed_pickup_is_not_a_finished_pair() {
        // Tras cerrar el turno el dropoff pendiente se borra
        let request = Uuid::new_v4();
        let waypoints = vec![
            waypoint(StopType::Regular, None, true),
            waypoint(StopType::Pickup, Some(request), true),
        ];
        let progress = LogicalProgress::from_waypoints(&waypoints);
        assert_eq!((progress.completed, progress.total), (1, 2));

        let lone_dropoff = vec![waypoint(StopType::Dropoff, Some(request), true)];
        assert_eq!(LogicalProgress::from_waypoints(&lone_dropoff).completed, 0);
    }

    #[test]
    fn test_empty_shift_has_zero_rate() {
        let progress = LogicalProgress::from_waypoints(&[]);
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percentage, 0.0);
        assert_eq!(progress.completion_rate(), Decimal::ZERO);
        assert!(progress.is_complete());
    }
}
