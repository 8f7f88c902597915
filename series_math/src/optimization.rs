//! Derivative-free minimisation

use serde::{Deserialize, Serialize};

/// Settings for the Nelder-Mead simplex search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Stop once the spread of objective values falls below this
    pub tolerance: f64,
    /// ...and every vertex lies within this distance of the best, per coordinate
    pub x_tolerance: f64,
    /// Initial simplex step, relative to each coordinate (absolute when it is zero)
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            x_tolerance: 1e-6,
            initial_step: 0.05,
        }
    }
}

/// Outcome of a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations performed
    pub iterations: usize,
    /// Whether the tolerance was reached before `max_iter`
    pub converged: bool,
}

/// Largest coordinate distance from the best vertex to any other
fn diameter(simplex: &[Vec<f64>], best: usize) -> f64 {
    simplex
        .iter()
        .flat_map(|v| v.iter().zip(&simplex[best]).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max)
}

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Minimise `objective` starting from `initial`.
///
/// Points are clamped to `bounds` (one `(min, max)` per coordinate) whenever
/// bounds are given. Non-finite objective values are treated as `+inf`.
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    if n == 0 {
        return NelderMeadResult {
            point: Vec::new(),
            value: eval(&[]),
            iterations: 0,
            converged: true,
        };
    }

    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(clamp(initial, bounds));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        let step = if vertex[i].abs() > 1e-10 {
            config.initial_step * vertex[i].abs()
        } else {
            config.initial_step
        };
        vertex[i] += step;
        let mut vertex = clamp(&vertex, bounds);
        // Clamping can collapse the vertex onto the start; step the other way.
        if (vertex[i] - simplex[0][i]).abs() < 1e-12 {
            vertex[i] -= step;
            vertex = clamp(&vertex, bounds);
        }
        simplex.push(vertex);
    }
    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        // Equal values alone can come from vertices straddling the minimum.
        if (values[worst] - values[best]).abs() < config.tolerance
            && diameter(&simplex, best) < config.x_tolerance
        {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| {
                simplex
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != worst)
                    .map(|(_, v)| v[j])
                    .sum::<f64>()
                    / n as f64
            })
            .collect();

        let towards = |from: &[f64], coef: f64| -> Vec<f64> {
            let p: Vec<f64> = centroid
                .iter()
                .zip(from)
                .map(|(c, x)| c + coef * (x - c))
                .collect();
            clamp(&p, bounds)
        };

        let reflected = towards(&simplex[worst], -REFLECTION);
        let reflected_value = eval(&reflected);

        if reflected_value < values[best] {
            let expanded = towards(&reflected, EXPANSION);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < values[worst] {
            let c = towards(&reflected, CONTRACTION);
            let v = eval(&c);
            (c, v)
        } else {
            let c = towards(&simplex[worst], CONTRACTION);
            let v = eval(&c);
            (c, v)
        };

        if contracted_value < values[worst].min(reflected_value) {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i == best {
                continue;
            }
            let shrunk: Vec<f64> = anchor
                .iter()
                .zip(&simplex[i])
                .map(|(a, x)| a + SHRINK * (x - a))
                .collect();
            simplex[i] = clamp(&shrunk, bounds);
            values[i] = eval(&simplex[i]);
        }
    }

    let best = (0..=n)
        .min_by(|&a, &b| values[a].total_cmp(&values[b]))
        .unwrap_or(0);

    NelderMeadResult {
        point: simplex[best].clone(),
        value: values[best],
        iterations,
        converged,
    }
}

fn clamp(point: &[f64], bounds: Option<&[(f64, f64)]>) -> Vec<f64> {
    match bounds {
        None => point.to_vec(),
        Some(b) => point
            .iter()
            .enumerate()
            .map(|(i, &x)| match b.get(i) {
                Some(&(lo, hi)) => x.clamp(lo, hi),
                None => x,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_quadratic_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
            &[0.0, 0.0],
            None,
            &NelderMeadConfig::default(),
        );
        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 2.0, epsilon = 1e-3);
        assert_abs_diff_eq!(result.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_rosenbrock() {
        let config = NelderMeadConfig {
            max_iter: 5000,
            tolerance: 1e-12,
            ..Default::default()
        };
        let result = nelder_mead(
            |x| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2),
            &[-1.2, 1.0],
            None,
            &config,
        );
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(result.point[1], 1.0, epsilon = 1e-2);
    }

    #[test]
    fn test_bounds_are_respected() {
        let bounds = [(0.5, 1.0)];
        let result = nelder_mead(
            |x| x[0] * x[0],
            &[0.9],
            Some(&bounds),
            &NelderMeadConfig::default(),
        );
        assert_abs_diff_eq!(result.point[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_symmetric_simplex_keeps_searching() {
        // Vertices at 0.5 and 1.5 have equal values around the minimum at 1.
        let config = NelderMeadConfig {
            initial_step: 2.0,
            ..Default::default()
        };
        let result = nelder_mead(|x| (x[0] - 1.0).powi(2), &[0.5], None, &config);
        assert!(result.converged);
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_non_finite_objective_is_avoided() {
        let result = nelder_mead(
            |x| if x[0] < 0.0 { f64::NAN } else { (x[0] - 1.0).powi(2) },
            &[0.5],
            None,
            &NelderMeadConfig::default(),
        );
        assert_abs_diff_eq!(result.point[0], 1.0, epsilon = 1e-3);
    }
}
