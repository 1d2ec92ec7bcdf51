use nalgebra::Point3;

/// Mean and sample standard deviation of a series.
///
/// Returns NaN for the mean of an empty series and NaN for the deviation of
/// fewer than two samples. Callers compare with `<`, so NaN never passes a
/// threshold.
pub fn mean_std_dev(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, f64::NAN);
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance.sqrt())
}

/// Sample standard deviation, see [`mean_std_dev`].
pub fn std_dev(values: &[f64]) -> f64 {
    mean_std_dev(values).1
}

pub fn euclidean(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    nalgebra::distance(a, b)
}

/// Strict "less than" that treats NaN as greater than every number.
pub fn nan_last_lt(a: f64, b: f64) -> bool {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a < b,
        (false, true) => true,
        _ => false,
    }
}
