/// Piecewise-linear interpolation over points sorted by x.
///
/// Returns None when fewer than two points are available or `query_x` lies outside
/// `[first_x, last_x]`; nothing is ever extrapolated.
pub fn linear_interp(sorted_points: &[(f64, f64)], query_x: f64) -> Option<f64> {
    if sorted_points.len() < 2 {
        return None;
    }

    let first_x = sorted_points[0].0;
    let last_x = sorted_points[sorted_points.len() - 1].0;
    if query_x < first_x || query_x > last_x {
        return None;
    }

    // Find the interval containing query_x
    for window in sorted_points.windows(2) {
        let (x1, y1) = window[0];
        let (x2, y2) = window[1];

        if query_x >= x1 && query_x <= x2 {
            if x2 == x1 {
                return Some(y1);
            }
            let t = (query_x - x1) / (x2 - x1);
            return Some(y1 + t * (y2 - y1));
        }
    }

    None
}
