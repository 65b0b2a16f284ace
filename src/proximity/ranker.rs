use std::borrow::Borrow;

use tracing::debug;

use super::distance_km;
use crate::models::{LocatedEntity, RankedEntity, SearchQuery};

/// Filter entities to the query radius, nearest first, capped.
///
/// Entities with a non-finite or out-of-range position are dropped. The sort
/// is stable, so entities at equal distance keep their input order. No
/// deduplication is performed. Accepts owned or borrowed entities; only
/// the entities inside the radius are cloned.
pub fn rank_nearby<I>(query: &SearchQuery, entities: I) -> Vec<RankedEntity>
where
    I: IntoIterator,
    I::Item: Borrow<LocatedEntity>,
{
    let mut dropped = 0usize;

    let mut ranked: Vec<RankedEntity> = entities
        .into_iter()
        .filter_map(|entity| {
            let entity = entity.borrow();
            let Some(position) = entity.coordinate() else {
                dropped += 1;
                return None;
            };
            let distance = distance_km(query.center, position);
            (distance <= query.radius_km).then(|| RankedEntity::new(entity.clone(), distance))
        })
        .collect();

    if dropped > 0 {
        debug!("Dropped {} entities with malformed coordinates", dropped);
    }

    // Stable: equal distances keep input order
    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked.truncate(query.cap);

    debug!(
        "Ranked {} entities within {} km of {}",
        ranked.len(),
        query.radius_km,
        query.center
    );

    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinate, EntityKind};
    use crate::proximity::EARTH_RADIUS_KM;

    /// Offset a coordinate due north by `km` (1 degree of latitude ≈ 111.195 km)
    fn north_of(origin: Coordinate, km: f64) -> (f64, f64) {
        (origin.lat + km / (EARTH_RADIUS_KM * std::f64::consts::PI / 180.0), origin.lng)
    }

    fn lot(id: &str, lat: f64, lng: f64) -> LocatedEntity {
        LocatedEntity::new(id, format!("lot {}", id), EntityKind::Parking, lat, lng)
    }

    fn ids(ranked: &[RankedEntity]) -> Vec<&str> {
        ranked.iter().map(|r| r.entity.id.as_str()).collect()
    }

    #[test]
    fn test_gangnam_exact_match_only() {
        let center = Coordinate::new(37.497942, 127.027619).unwrap();
        let (far_lat, far_lng) = north_of(center, 2.0);
        let query = SearchQuery::new(center, 0.5).unwrap();

        let ranked = rank_nearby(
            &query,
            vec![lot("here", center.lat, center.lng), lot("far", far_lat, far_lng)],
        );

        assert_eq!(ids(&ranked), vec!["here"]);
        assert!(ranked[0].distance_km.abs() < 1e-9);
    }

    #[test]
    fn test_radius_filter_and_order() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let (a_lat, a_lng) = north_of(center, 0.8);
        let (b_lat, b_lng) = north_of(center, 1.5);
        let (c_lat, c_lng) = north_of(center, 0.3);
        let query = SearchQuery::new(center, 1.0).unwrap();

        let ranked = rank_nearby(
            &query,
            vec![lot("0.8", a_lat, a_lng), lot("1.5", b_lat, b_lng), lot("0.3", c_lat, c_lng)],
        );

        assert_eq!(ids(&ranked), vec!["0.3", "0.8"]);
        assert!((ranked[0].distance_km - 0.3).abs() < 0.001);
        assert!((ranked[1].distance_km - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_malformed_entities_dropped() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let query = SearchQuery::new(center, 1000.0).unwrap();

        let ranked = rank_nearby(
            &query,
            vec![
                lot("nan", f64::NAN, 126.9780),
                lot("lat200", 200.0, 126.9780),
                lot("lng-300", 37.5665, -300.0),
                lot("inf", 37.5665, f64::INFINITY),
                lot("ok", 37.5665, 126.9780),
            ],
        );

        assert_eq!(ids(&ranked), vec!["ok"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let (lat, lng) = north_of(center, 0.2);
        let query = SearchQuery::new(center, 1.0).unwrap();

        let ranked = rank_nearby(
            &query,
            vec![lot("first", lat, lng), lot("second", lat, lng), lot("third", lat, lng)],
        );

        assert_eq!(ids(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_cap_and_sorted_invariant() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let entities: Vec<LocatedEntity> = (0..50)
            .map(|i| {
                // Scatter distances non-monotonically across the input
                let km = ((i * 37) % 50) as f64 * 0.04;
                let (lat, lng) = north_of(center, km);
                lot(&i.to_string(), lat, lng)
            })
            .collect();
        let query = SearchQuery::new(center, 1.0).unwrap().with_cap(7).unwrap();

        let ranked = rank_nearby(&query, entities);

        assert_eq!(ranked.len(), 7);
        assert!(ranked.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));
        assert!(ranked.iter().all(|r| r.distance_km <= query.radius_km));
    }

    #[test]
    fn test_every_entity_inside_radius_present_once() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let entities: Vec<LocatedEntity> = (0..30)
            .map(|i| {
                let (lat, lng) = north_of(center, i as f64 * 0.1);
                lot(&i.to_string(), lat, lng)
            })
            .collect();
        let query = SearchQuery::new(center, 1.45).unwrap().with_cap(100).unwrap();

        let ranked = rank_nearby(&query, entities.clone());

        for entity in &entities {
            let d = distance_km(center, entity.coordinate().unwrap());
            let hits = ranked.iter().filter(|r| r.entity.id == entity.id).count();
            if d <= query.radius_km {
                assert_eq!(hits, 1, "entity {} at {} km", entity.id, d);
            } else {
                assert_eq!(hits, 0, "entity {} at {} km", entity.id, d);
            }
        }
    }

    #[test]
    fn test_empty_input() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let query = SearchQuery::new(center, 1.0).unwrap();
        assert!(rank_nearby(&query, Vec::<LocatedEntity>::new()).is_empty());
    }

    #[test]
    fn test_source_fields_untouched() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let query = SearchQuery::new(center, 1.0).unwrap();
        let entity = lot("a", 37.5665, 126.9780).with_meta("fee", "1000원/30분");

        let ranked = rank_nearby(&query, vec![entity.clone()]);

        assert_eq!(ranked[0].entity.id, entity.id);
        assert_eq!(ranked[0].entity.metadata, entity.metadata);
        assert!(ranked[0].route.is_none());
    }

    #[test]
    fn test_borrowed_input_clones_only_survivors() {
        let center = Coordinate::new(37.5665, 126.9780).unwrap();
        let (far_lat, far_lng) = north_of(center, 3.0);
        let query = SearchQuery::new(center, 1.0).unwrap();
        let dataset = vec![lot("far", far_lat, far_lng), lot("near", center.lat, center.lng)];

        let ranked = rank_nearby(&query, dataset.iter());

        assert_eq!(ids(&ranked), vec!["near"]);
        assert_eq!(dataset.len(), 2);
    }
}
