//! Secuenciador de rutas
//!
//! Calcula el orden de visita de las paradas de un turno al iniciarlo.
//! Dos modos excluyentes:
//!
//! - **Optimización completa** cuando alguna parada sigue sin secuenciar
//!   (`sequence_order == 0`): vecino más cercano ponderado por urgencia de
//!   llenado, seguido de mejoras 2-opt que respetan pickup antes de dropoff.
//! - **Rotación** cuando la ruta predefinida ya trae orden: se rota el orden
//!   existente para empezar por la parada más cercana al conductor.
//!
//! El módulo es puro: no toca base de datos ni reloj.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::location::GeoPoint;

/// Radio terrestre en kilómetros
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Distancia haversine entre dos puntos, en kilómetros
pub fn haversine_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let delta_lat = (to.latitude - from.latitude).to_radians();
    let delta_lng = (to.longitude - from.longitude).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Parada a secuenciar
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerStop {
    pub waypoint_id: Uuid,
    pub location: GeoPoint,
    pub fill_percentage: Option<i32>,
    pub sequence_order: i32,
    /// Parada que debe visitarse antes (el pickup de un dropoff)
    pub after: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencingMode {
    FullOptimization,
    Rotation,
}

#[derive(Debug, Clone)]
pub struct SequencerOptions {
    /// 0.0 = solo distancia; 1.0 = un contenedor lleno "cuesta" la mitad
    pub fill_urgency_weight: f64,
    pub two_opt_passes: usize,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            fill_urgency_weight: 0.5,
            two_opt_passes: 50,
        }
    }
}

/// Resultado de la secuenciación
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePlan {
    pub mode: SequencingMode,
    pub order: Vec<Uuid>,
}

impl SequencePlan {
    /// Posiciones 1..N para escribir de vuelta en los waypoints
    pub fn positions(&self) -> Vec<(Uuid, i32)> {
        self.order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index as i32 + 1))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RouteSequencer {
    options: SequencerOptions,
}

impl RouteSequencer {
    pub fn new(options: SequencerOptions) -> Self {
        Self { options }
    }

    pub fn mode_for(stops: &[SequencerStop]) -> SequencingMode {
        if stops.iter().any(|stop| stop.sequence_order <= 0) {
            SequencingMode::FullOptimization
        } else {
            SequencingMode::Rotation
        }
    }

    /// Secuenciar las paradas desde la ubicación actual del conductor
    pub fn sequence(&self, origin: GeoPoint, stops: &[SequencerStop]) -> SequencePlan {
        let mode = Self::mode_for(stops);
        let order = match mode {
            SequencingMode::FullOptimization => self.optimize(origin, stops),
            SequencingMode::Rotation => Self::rotate(origin, stops),
        };
        SequencePlan { mode, order }
    }

    /// Vecino más cercano ponderado + 2-opt
    pub fn optimize(&self, origin: GeoPoint, stops: &[SequencerStop]) -> Vec<Uuid> {
        if stops.is_empty() {
            return Vec::new();
        }

        let index_of: HashMap<Uuid, usize> = stops
            .iter()
            .enumerate()
            .map(|(index, stop)| (stop.waypoint_id, index))
            .collect();
        let predecessor: Vec<Option<usize>> = stops
            .iter()
            .map(|stop| stop.after.and_then(|id| index_of.get(&id).copied()))
            .collect();

        let mut visited = vec![false; stops.len()];
        let mut order: Vec<usize> = Vec::with_capacity(stops.len());
        let mut current = origin;

        while order.len() < stops.len() {
            let mut best: Option<(usize, f64)> = None;
            for (index, stop) in stops.iter().enumerate() {
                if visited[index] {
                    continue;
                }
                if let Some(before) = predecessor[index] {
                    if !visited[before] {
                        continue;
                    }
                }
                let cost = self.edge_cost(current, stop);
                if best.map_or(true, |(_, best_cost)| cost < best_cost) {
                    best = Some((index, cost));
                }
            }

            // Solo ocurre con precedencias circulares: se toma la primera restante
            let next = match best {
                Some((index, _)) => index,
                None => match visited.iter().position(|v| !v) {
                    Some(index) => index,
                    None => break,
                },
            };

            visited[next] = true;
            order.push(next);
            current = stops[next].location;
        }

        self.two_opt(origin, stops, &predecessor, &mut order);

        order.into_iter().map(|index| stops[index].waypoint_id).collect()
    }

    /// Rotar el orden existente para empezar por la parada más cercana
    pub fn rotate(origin: GeoPoint, stops: &[SequencerStop]) -> Vec<Uuid> {
        let mut ordered: Vec<&SequencerStop> = stops.iter().collect();
        ordered.sort_by_key(|stop| stop.sequence_order);

        let closest = ordered
            .iter()
            .enumerate()
            .map(|(index, stop)| (index, haversine_km(origin, stop.location)))
            .fold(None::<(usize, f64)>, |best, (index, distance)| match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((index, distance)),
            });

        if let Some((index, _)) = closest {
            ordered.rotate_left(index);
        }

        ordered.into_iter().map(|stop| stop.waypoint_id).collect()
    }

    /// Costo de ir hacia `to`: distancia reducida por urgencia de llenado
    fn edge_cost(&self, from: GeoPoint, to: &SequencerStop) -> f64 {
        let fill = to.fill_percentage.unwrap_or(0).clamp(0, 100) as f64 / 100.0;
        haversine_km(from, to.location) / (1.0 + self.options.fill_urgency_weight.max(0.0) * fill)
    }

    fn two_opt(
        &self,
        origin: GeoPoint,
        stops: &[SequencerStop],
        predecessor: &[Option<usize>],
        order: &mut Vec<usize>,
    ) {
        let n = order.len();
        if n < 2 {
            return;
        }

        let cost = |from: Option<usize>, to: usize| -> f64 {
            let from_point = from.map(|i| stops[i].location).unwrap_or(origin);
            self.edge_cost(from_point, &stops[to])
        };

        for _ in 0..self.options.two_opt_passes {
            let mut improved = false;

            for i in 0..n - 1 {
                let prev = if i == 0 { None } else { Some(order[i - 1]) };
                let mut forward_internal = 0.0;
                let mut reversed_internal = 0.0;

                for j in i + 1..n {
                    forward_internal += cost(Some(order[j - 1]), order[j]);
                    reversed_internal += cost(Some(order[j]), order[j - 1]);

                    let next = order.get(j + 1).copied();
                    let before = cost(prev, order[i])
                        + forward_internal
                        + next.map_or(0.0, |k| cost(Some(order[j]), k));
                    let after = cost(prev, order[j])
                        + reversed_internal
                        + next.map_or(0.0, |k| cost(Some(order[i]), k));

                    if after + IMPROVEMENT_EPSILON < before {
                        order[i..=j].reverse();
                        if respects_precedence(order, predecessor) {
                            improved = true;
                            break;
                        }
                        order[i..=j].reverse();
                    }
                }

                if improved {
                    break;
                }
            }

            if !improved {
                break;
            }
        }
    }
}

fn respects_precedence(order: &[usize], predecessor: &[Option<usize>]) -> bool {
    let mut position = vec![0usize; predecessor.len()];
    for (pos, &index) in order.iter().enumerate() {
        position[index] = pos;
    }
    order.iter().all(|&index| match predecessor[index] {
        Some(before) => position[before] < position[index],
        None => true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn stop(lat: f64, lng: f64, sequence_order: i32) -> SequencerStop {
        SequencerStop {
            waypoint_id: Uuid::new_v4(),
            location: GeoPoint::new(lat, lng),
            fill_percentage: None,
            sequence_order,
            after: None,
        }
    }

    #[test]
    fn test_haversine_same_point() {
        let p = GeoPoint::new(36.1, -115.1);
        assert!(haversine_km(p, p) < 0.001);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Las Vegas -> Los Angeles, ~370 km
        let dist = haversine_km(GeoPoint::new(36.17, -115.14), GeoPoint::new(34.05, -118.24));
        assert!(dist > 350.0 && dist < 400.0, "got {}", dist);
    }

    #[test]
    fn test_mode_selection() {
        let sequenced = vec![stop(0.0, 0.0, 1), stop(0.0, 0.1, 2)];
        assert_eq!(RouteSequencer::mode_for(&sequenced), SequencingMode::Rotation);

        let mut mixed = sequenced.clone();
        mixed.push(stop(0.0, 0.2, 0));
        assert_eq!(RouteSequencer::mode_for(&mixed), SequencingMode::FullOptimization);
    }

    #[test]
    fn test_rotation_starts_at_closest_stop() {
        // A..E a lo largo de una línea; el conductor está junto a C
        let stops: Vec<_> = (0..5).map(|i| stop(0.0, i as f64 * 0.1, i + 1)).collect();
        let ids: Vec<Uuid> = stops.iter().map(|s| s.waypoint_id).collect();

        let order = RouteSequencer::rotate(GeoPoint::new(0.0, 0.201), &stops);
        assert_eq!(order, vec![ids[2], ids[3], ids[4], ids[0], ids[1]]);
    }

    #[test]
    fn test_rotation_is_a_permutation_regardless_of_input_order() {
        let mut stops: Vec<_> = (0..6).map(|i| stop(0.01 * i as f64, 0.02 * i as f64, i + 1)).collect();
        stops.reverse();
        let origin = GeoPoint::new(0.036, 0.071);

        let order = RouteSequencer::rotate(origin, &stops);
        let before: HashSet<Uuid> = stops.iter().map(|s| s.waypoint_id).collect();
        let after: HashSet<Uuid> = order.iter().copied().collect();
        assert_eq!(order.len(), stops.len());
        assert_eq!(before, after);

        let closest = stops
            .iter()
            .min_by(|a, b| {
                haversine_km(origin, a.location)
                    .partial_cmp(&haversine_km(origin, b.location))
                    .unwrap()
            })
            .unwrap();
        assert_eq!(order[0], closest.waypoint_id);
    }

    #[test]
    fn test_optimize_visits_every_stop_once() {
        let stops: Vec<_> = [(0.3, 0.1), (0.0, 0.5), (0.2, 0.2), (0.9, 0.9), (0.1, 0.0)]
            .iter()
            .map(|(lat, lng)| stop(*lat, *lng, 0))
            .collect();
        let sequencer = RouteSequencer::default();

        let order = sequencer.optimize(GeoPoint::new(0.0, 0.0), &stops);
        assert_eq!(order.len(), stops.len());
        let unique: HashSet<Uuid> = order.iter().copied().collect();
        assert_eq!(unique.len(), stops.len());
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let stops: Vec<_> = (0..8)
            .map(|i| stop((i * 7 % 5) as f64 * 0.01, (i * 3 % 8) as f64 * 0.01, 0))
            .collect();
        let sequencer = RouteSequencer::default();
        let origin = GeoPoint::new(0.02, 0.02);

        assert_eq!(sequencer.optimize(origin, &stops), sequencer.optimize(origin, &stops));
    }

    #[test]
    fn test_optimize_prefers_fuller_bin_at_equal_distance() {
        let mut empty = stop(0.0, 0.01, 0);
        empty.fill_percentage = Some(10);
        let mut full = stop(0.0, -0.01, 0);
        full.fill_percentage = Some(95);
        let full_id = full.waypoint_id;

        let sequencer = RouteSequencer::new(SequencerOptions {
            fill_urgency_weight: 1.0,
            two_opt_passes: 0,
        });
        let order = sequencer.optimize(GeoPoint::new(0.0, 0.0), &[empty, full]);
        assert_eq!(order[0], full_id);
    }

    #[test]
    fn test_optimize_keeps_pickup_before_dropoff() {
        // El dropoff está al lado del conductor y el pickup lejos
        let pickup = stop(0.5, 0.5, 0);
        let mut dropoff = stop(0.0, 0.001, 0);
        dropoff.after = Some(pickup.waypoint_id);
        let regular = stop(0.25, 0.25, 0);
        let stops = vec![dropoff.clone(), regular, pickup.clone()];

        let order = RouteSequencer::default().optimize(GeoPoint::new(0.0, 0.0), &stops);
        let pickup_pos = order.iter().position(|id| *id == pickup.waypoint_id).unwrap();
        let dropoff_pos = order.iter().position(|id| *id == dropoff.waypoint_id).unwrap();
        assert!(pickup_pos < dropoff_pos);
    }

    #[test]
    fn test_two_opt_untangles_crossing_route() {
        // Sin ponderación, el orden óptimo sobre una línea es monotónico
        let stops: Vec<_> = [0.4, 0.1, 0.3, 0.2].iter().map(|lng| stop(0.0, *lng, 0)).collect();
        let sequencer = RouteSequencer::new(SequencerOptions {
            fill_urgency_weight: 0.0,
            two_opt_passes: 10,
        });
        let order = sequencer.optimize(GeoPoint::new(0.0, 0.0), &stops);
        let lngs: Vec<f64> = order
            .iter()
            .map(|id| stops.iter().find(|s| s.waypoint_id == *id).unwrap().location.longitude)
            .collect();
        assert_eq!(lngs, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_positions_start_at_one() {
        let plan = SequencePlan {
            mode: SequencingMode::Rotation,
            order: vec![Uuid::new_v4(), Uuid::new_v4()],
        };
        let positions: Vec<i32> = plan.positions().into_iter().map(|(_, p)| p).collect();
        assert_eq!(positions, vec![1, 2]);
    }

    #[test]
    fn test_empty_input() {
        let plan = RouteSequencer::default().sequence(GeoPoint::new(0.0, 0.0), &[]);
        assert!(plan.order.is_empty());
    }
}
