use crate::models::order::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Minutes until arrival at the assumed speed, rounded up. An arrival that
/// rounds to zero minutes over a non-zero distance reports one minute.
/// `None` when either coordinate is missing or the speed is unusable.
pub fn eta_minutes(
    current: Option<&GeoPoint>,
    destination: Option<&GeoPoint>,
    assumed_speed_kmh: f64,
) -> Option<u32> {
    let current = current?;
    let destination = destination?;

    if !assumed_speed_kmh.is_finite() || assumed_speed_kmh <= 0.0 {
        return None;
    }

    let distance_km = haversine_km(current, destination);
    let minutes = (distance_km / assumed_speed_kmh * 60.0).ceil();

    if distance_km > 0.0 && minutes < 1.0 {
        return Some(1);
    }

    Some(minutes as u32)
}

/// Share of the route covered so far, clamped to [0, 100]. A degenerate
/// route (start and end coincide) reports 0 rather than dividing by zero.
pub fn progress_percent(start: &GeoPoint, current: &GeoPoint, end: &GeoPoint) -> f64 {
    let total_km = haversine_km(start, end);
    if total_km == 0.0 {
        return 0.0;
    }

    let covered_km = haversine_km(start, current);
    (covered_km / total_km * 100.0).clamp(0.0, 100.0)
}
