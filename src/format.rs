//! Display helpers for distances and durations.

/// "850m" below one kilometer, "1.2km" above
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Whole minutes, with hours once the trip reaches an hour: "5분", "1시간 5분"
pub fn format_duration(seconds: f64) -> String {
    let minutes = (seconds / 60.0).round() as i64;
    let hours = minutes / 60;
    let rest = minutes % 60;
    if hours > 0 {
        format!("{}시간 {}분", hours, rest)
    } else {
        format!("{}분", rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(849.6), "850m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(1234.0), "1.2km");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(29.0), "0분");
        assert_eq!(format_duration(300.0), "5분");
        assert_eq!(format_duration(3600.0), "1시간 0분");
        assert_eq!(format_duration(3900.0), "1시간 5분");
    }
}
