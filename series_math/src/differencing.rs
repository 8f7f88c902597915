//! Differencing operators

/// Apply lag-`lag` differencing `order` times.
///
/// Each pass shortens the series by `lag` observations.
pub fn difference(values: &[f64], order: usize, lag: usize) -> Vec<f64> {
    let mut current = values.to_vec();
    for _ in 0..order {
        if current.len() <= lag {
            return Vec::new();
        }
        current = (lag..current.len())
            .map(|i| current[i] - current[i - lag])
            .collect();
    }
    current
}

/// Coefficients of the polynomial `(1 - B)^d`, lowest power first.
///
/// `(1 - B)^2` yields `[1, -2, 1]`.
pub fn difference_polynomial(d: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        let mut next = vec![0.0; poly.len() + 1];
        for (i, c) in poly.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= c;
        }
        poly = next;
    }
    poly
}

/// Undo `d` rounds of first differencing for values continuing `history`.
///
/// `forecasts` are on the differenced scale; the result is on the scale of
/// `history`.
pub fn integrate(forecasts: &[f64], history: &[f64], d: usize) -> Vec<f64> {
    if d == 0 {
        return forecasts.to_vec();
    }

    // Last value at each differencing level, level 0 being the raw series.
    let mut tails = Vec::with_capacity(d);
    let mut level = history.to_vec();
    for _ in 0..d {
        tails.push(level.last().copied().unwrap_or(0.0));
        level = difference(&level, 1, 1);
    }

    let mut out = forecasts.to_vec();
    for k in (0..d).rev() {
        let mut acc = tails[k];
        for v in out.iter_mut() {
            acc += *v;
            *v = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 1, 1), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_second_difference() {
        assert_eq!(difference(&[1.0, 3.0, 6.0, 10.0], 2, 1), vec![1.0, 1.0]);
    }

    #[test]
    fn test_seasonal_lag() {
        assert_eq!(difference(&[1.0, 2.0, 5.0, 7.0], 1, 2), vec![4.0, 5.0]);
    }

    #[test]
    fn test_polynomial() {
        assert_eq!(difference_polynomial(0), vec![1.0]);
        assert_eq!(difference_polynomial(2), vec![1.0, -2.0, 1.0]);
    }

    #[test]
    fn test_integrate_inverts_difference() {
        let history = [1.0, 3.0, 6.0, 10.0];
        // Next values 15, 21 have first differences 5, 6 and second differences 1, 1.
        assert_eq!(integrate(&[5.0, 6.0], &history, 1), vec![15.0, 21.0]);
        assert_eq!(integrate(&[1.0, 1.0], &history, 2), vec![15.0, 21.0]);
    }
}
