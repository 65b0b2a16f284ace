//! Kakao Mobility car directions.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::{DirectionsProvider, Priority};
use crate::config::ApiConfig;
use crate::error::{FetchError, RouteError};
use crate::models::{Coordinate, RouteFare, RouteSummary};

/// Kakao Mobility accepts up to five stopovers
pub const MAX_WAYPOINTS: usize = 5;

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default)]
    routes: Vec<Route>,
}

#[derive(Debug, Deserialize)]
struct Route {
    result_code: i64,
    #[serde(default)]
    result_msg: String,
    summary: Option<Summary>,
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Summary {
    distance: f64,
    duration: f64,
    #[serde(default)]
    fare: Option<RouteFare>,
}

#[derive(Debug, Deserialize)]
struct Section {
    #[serde(default)]
    roads: Vec<Road>,
}

#[derive(Debug, Deserialize)]
struct Road {
    /// Flat `[lng, lat, lng, lat, ...]`
    #[serde(default)]
    vertexes: Vec<f64>,
}

#[derive(Clone)]
pub struct KakaoDirections {
    client: Client,
    base_url: Url,
    api_key: String,
    priority: Priority,
    include_path: bool,
}

impl KakaoDirections {
    pub fn new(client: Client, base_url: Url, api_key: String) -> Self {
        Self {
            client,
            base_url,
            api_key,
            priority: Priority::default(),
            include_path: false,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, FetchError> {
        let api_key = config
            .kakao_rest_api_key
            .clone()
            .ok_or(FetchError::MissingApiKey("kakao_directions"))?;
        Ok(Self::new(
            crate::fetcher::http_client(config.timeout())?,
            Url::parse(&config.kakao_directions_url)?,
            api_key,
        ))
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Keep the route polyline in returned summaries
    pub fn with_path(mut self, include_path: bool) -> Self {
        self.include_path = include_path;
        self
    }

    fn route_url(&self, origin: Coordinate, waypoints: &[Coordinate], destination: Coordinate) -> Url {
        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("origin", &format!("{},{}", origin.lng, origin.lat))
                .append_pair("destination", &format!("{},{}", destination.lng, destination.lat))
                .append_pair("priority", self.priority.as_str());
            if !waypoints.is_empty() {
                let via: Vec<String> = waypoints.iter().map(|w| format!("{},{}", w.lng, w.lat)).collect();
                pairs.append_pair("waypoints", &via.join("|"));
            }
        }
        url
    }

    /// Driving route through `waypoints` in order
    pub async fn route_via(
        &self,
        origin: Coordinate,
        waypoints: &[Coordinate],
        destination: Coordinate,
    ) -> Result<RouteSummary, RouteError> {
        if waypoints.len() > MAX_WAYPOINTS {
            return Err(RouteError::TooManyWaypoints {
                max: MAX_WAYPOINTS,
                got: waypoints.len(),
            });
        }
        if waypoints.is_empty() && origin == destination {
            debug!("Origin and destination are identical. Returning zero route.");
            return Ok(RouteSummary::new(0.0, 0.0));
        }

        let response = self
            .client
            .get(self.route_url(origin, waypoints, destination))
            .header("Authorization", format!("KakaoAK {}", self.api_key))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            warn!("Directions request {} -> {} failed: HTTP {}", origin, destination, status);
            return Err(RouteError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_directions(&text, self.include_path)
    }
}

#[async_trait]
impl DirectionsProvider for KakaoDirections {
    async fn route(&self, origin: Coordinate, destination: Coordinate) -> Result<RouteSummary, RouteError> {
        self.route_via(origin, &[], destination).await
    }
}

/// Extract the first route's summary; a non-zero `result_code` is a failure
fn parse_directions(text: &str, include_path: bool) -> Result<RouteSummary, RouteError> {
    let response: DirectionsResponse = serde_json::from_str(text)?;
    let route = response.routes.into_iter().next().ok_or_else(|| RouteError::NoRoute {
        code: -1,
        message: "No route in response".to_string(),
    })?;

    let summary = match (route.result_code, route.summary) {
        (0, Some(summary)) => summary,
        (code, _) => {
            return Err(RouteError::NoRoute {
                code,
                message: route.result_msg,
            })
        }
    };

    let path = if include_path {
        route_path(&route.sections)
    } else {
        Vec::new()
    };
    Ok(RouteSummary {
        distance_meters: summary.distance,
        duration_seconds: summary.duration,
        fare: summary.fare,
        path,
    })
}

/// Flatten `sections[].roads[].vertexes` into coordinates. A trailing odd
/// value and out-of-range pairs are skipped.
fn route_path(sections: &[Section]) -> Vec<Coordinate> {
    sections
        .iter()
        .flat_map(|section| &section.roads)
        .flat_map(|road| road.vertexes.chunks_exact(2))
        .filter_map(|pair| Coordinate::new(pair[1], pair[0]).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_success() {
        let text = json!({
            "trans_id": "abc",
            "routes": [{
                "result_code": 0,
                "result_msg": "길찾기 성공",
                "summary": {
                    "distance": 9876,
                    "duration": 1234,
                    "fare": { "taxi": 12000, "toll": 0 },
                    "priority": "RECOMMEND"
                },
                "sections": []
            }]
        })
        .to_string();

        let summary = parse_directions(&text, false).unwrap();
        assert_eq!(summary.distance_meters, 9876.0);
        assert_eq!(summary.duration_seconds, 1234.0);
        assert_eq!(summary.fare, Some(RouteFare { taxi: 12000, toll: 0 }));
        assert!(summary.path.is_empty());
    }

    #[test]
    fn test_parse_path_from_vertexes() {
        let text = json!({
            "routes": [{
                "result_code": 0,
                "result_msg": "길찾기 성공",
                "summary": { "distance": 850, "duration": 240 },
                "sections": [
                    { "roads": [
                        { "vertexes": [127.0276, 37.4979, 127.0281, 37.4985] },
                        { "vertexes": [127.0290, 37.4990, 127.0301] }
                    ]},
                    { "roads": [{ "vertexes": [127.0310, 37.5001] }] }
                ]
            }]
        })
        .to_string();

        let summary = parse_directions(&text, true).unwrap();

        let path: Vec<(f64, f64)> = summary.path.iter().map(|c| (c.lat, c.lng)).collect();
        assert_eq!(
            path,
            vec![
                (37.4979, 127.0276),
                (37.4985, 127.0281),
                (37.4990, 127.0290),
                (37.5001, 127.0310),
            ]
        );
        assert_eq!(summary.fare, None);
    }

    #[test]
    fn test_parse_result_code_failure() {
        let text = json!({
            "routes": [{ "result_code": 104, "result_msg": "출발지와 도착지가 5 m 이내로 설정된 경우 경로를 탐색할 수 없음" }]
        })
        .to_string();

        match parse_directions(&text, false) {
            Err(RouteError::NoRoute { code, .. }) => assert_eq!(code, 104),
            other => panic!("expected NoRoute, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_routes() {
        assert!(matches!(
            parse_directions(r#"{"routes": []}"#, false),
            Err(RouteError::NoRoute { .. })
        ));
    }

    #[test]
    fn test_route_url_uses_lng_lat_order() {
        let directions = KakaoDirections::new(
            Client::new(),
            Url::parse("https://apis-navi.example.test/v1/directions").unwrap(),
            "KEY".into(),
        )
        .with_priority(Priority::Time);
        let url = directions.route_url(
            Coordinate::new(37.497942, 127.027619).unwrap(),
            &[],
            Coordinate::new(37.556067, 126.972559).unwrap(),
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("origin".into(), "127.027619,37.497942".into())));
        assert!(pairs.contains(&("destination".into(), "126.972559,37.556067".into())));
        assert!(pairs.contains(&("priority".into(), "TIME".into())));
        assert!(!pairs.iter().any(|(k, _)| k == "waypoints"));
    }

    fn directions() -> KakaoDirections {
        KakaoDirections::new(
            Client::new(),
            Url::parse("https://apis-navi.example.test/v1/directions").unwrap(),
            "KEY".into(),
        )
    }

    #[test]
    fn test_waypoints_joined_in_order() {
        let url = directions().route_url(
            Coordinate::new(37.49, 127.02).unwrap(),
            &[Coordinate::new(37.50, 127.03).unwrap(), Coordinate::new(37.51, 127.04).unwrap()],
            Coordinate::new(37.55, 126.97).unwrap(),
        );
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert!(pairs.contains(&("waypoints".into(), "127.03,37.5|127.04,37.51".into())));
    }

    #[tokio::test]
    async fn test_too_many_waypoints_rejected_before_request() {
        let stop = Coordinate::new(37.5, 127.0).unwrap();
        let waypoints = vec![stop; MAX_WAYPOINTS + 1];

        match directions().route_via(stop, &waypoints, stop).await {
            Err(RouteError::TooManyWaypoints { max, got }) => {
                assert_eq!((max, got), (MAX_WAYPOINTS, MAX_WAYPOINTS + 1));
            }
            other => panic!("expected TooManyWaypoints, got {:?}", other),
        }
    }
}
