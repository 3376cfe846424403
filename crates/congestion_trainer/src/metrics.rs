//! Held-out regression metrics

/// Root mean squared error; 0 for empty input
pub fn rmse(predictions: &[f64], targets: &[f64]) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    let sse: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (p - t).powi(2))
        .sum();
    (sse / targets.len() as f64).sqrt()
}

/// Coefficient of determination. `None` when the targets have no variance,
/// where R² is undefined.
pub fn r2(predictions: &[f64], targets: &[f64]) -> Option<f64> {
    if targets.is_empty() {
        return None;
    }
    let mean = targets.iter().sum::<f64>() / targets.len() as f64;
    let ss_tot: f64 = targets.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return None;
    }
    let ss_res: f64 = predictions
        .iter()
        .zip(targets)
        .map(|(p, t)| (t - p).powi(2))
        .sum();
    Some(1.0 - ss_res / ss_tot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_fit() {
        let targets = [0.1, 0.5, 0.9];
        assert_eq!(rmse(&targets, &targets), 0.0);
        assert_eq!(r2(&targets, &targets), Some(1.0));
    }

    #[test]
    fn test_known_values() {
        let rmse = rmse(&[0.0, 0.0], &[0.3, 0.4]);
        assert!((rmse - 0.125f64.sqrt()).abs() < 1e-12);

        // predicting the mean scores zero
        let r2 = r2(&[0.5, 0.5], &[0.3, 0.7]).unwrap();
        assert!(r2.abs() < 1e-12);
    }

    #[test]
    fn test_constant_targets() {
        assert_eq!(r2(&[0.1, 0.2], &[0.4, 0.4]), None);
        assert_eq!(r2(&[], &[]), None);
        assert_eq!(rmse(&[], &[]), 0.0);
    }
}
