/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometres between two points given in decimal
/// degrees, using the haversine formula.
///
/// No range validation is performed: out-of-range coordinates yield a
/// well-defined but meaningless number.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance between two optional coordinate pairs. `None` if any coordinate
/// is missing or the result is not a finite number.
pub fn distance_km(
    pickup_lat: Option<f64>,
    pickup_lon: Option<f64>,
    dropoff_lat: Option<f64>,
    dropoff_lon: Option<f64>,
) -> Option<f64> {
    let d = haversine_km(pickup_lat?, pickup_lon?, dropoff_lat?, dropoff_lon?);
    d.is_finite().then_some(d)
}
