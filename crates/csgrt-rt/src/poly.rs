//! Real roots of low-degree polynomials.
//!
//! Closed-form solutions followed by Newton polishing. Roots come back
//! unsorted; callers sort what they keep.

use std::f64::consts::PI;

const EPS: f64 = 1e-12;

/// Solve `a*x^2 + b*x + c = 0`.
///
/// Degenerates to the linear case when `a` vanishes. A double root is
/// reported twice.
pub fn solve_quadratic(a: f64, b: f64, c: f64) -> Vec<f64> {
    if a.abs() < EPS {
        if b.abs() > EPS {
            return vec![-c / b];
        }
        return Vec::new();
    }

    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }

    // Avoid cancellation between -b and sqrt(disc).
    let sqrt_disc = disc.sqrt();
    let q = -0.5 * (b + b.signum() * sqrt_disc);
    if q.abs() < EPS {
        let r = -b / (2.0 * a);
        return vec![r, r];
    }
    vec![q / a, c / q]
}

/// Solve `a*x^3 + b*x^2 + c*x + d = 0`.
pub fn solve_cubic(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    if a.abs() < EPS {
        return solve_quadratic(b, c, d);
    }

    // x = t - b/(3a) gives t^3 + p*t + q = 0.
    let (b, c, d) = (b / a, c / a, d / a);
    let offset = b / 3.0;
    let p = c - b * offset;
    let q = d - c * offset + 2.0 * offset * offset * offset;

    let half_q = 0.5 * q;
    let third_p = p / 3.0;
    let disc = half_q * half_q + third_p * third_p * third_p;

    let ts: Vec<f64> = if disc > EPS {
        let root = disc.sqrt();
        vec![(root - half_q).cbrt() - (root + half_q).cbrt()]
    } else if disc >= -EPS {
        // Repeated root; all three coincide when p and q vanish.
        let u = (-half_q).cbrt();
        if u.abs() < EPS {
            vec![0.0]
        } else {
            vec![2.0 * u, -u]
        }
    } else {
        // Three distinct real roots, Viete's trigonometric form.
        let r = (-third_p).sqrt();
        let phi = (-half_q / (r * r * r)).clamp(-1.0, 1.0).acos();
        (0..3)
            .map(|k| 2.0 * r * ((phi - 2.0 * PI * k as f64) / 3.0).cos())
            .collect()
    };

    let coeffs = [1.0, b, c, d];
    ts.into_iter().map(|t| polish(&coeffs, t - offset)).collect()
}

/// Solve `c4*x^4 + c3*x^3 + c2*x^2 + c1*x + c0 = 0` by Ferrari's method.
///
/// Roots come in pairs from two quadratic factors, so a double root is
/// either reported twice or, when rounding pushes it complex, not at all.
pub fn solve_quartic(c4: f64, c3: f64, c2: f64, c1: f64, c0: f64) -> Vec<f64> {
    if c4.abs() < EPS {
        return solve_cubic(c3, c2, c1, c0);
    }

    let p = c3 / c4;
    let q = c2 / c4;
    let r = c1 / c4;
    let s = c0 / c4;

    // Depressed quartic via x = y - p/4: y^4 + a2*y^2 + a1*y + a0 = 0
    let p2 = p * p;
    let a2 = q - 3.0 * p2 / 8.0;
    let a1 = r - p * q / 2.0 + p2 * p / 8.0;
    let a0 = s - p * r / 4.0 + p2 * q / 16.0 - 3.0 * p2 * p2 / 256.0;
    let shift = p / 4.0;

    let mut ys = Vec::with_capacity(4);
    if a1.abs() < EPS {
        // Biquadratic: z = y^2.
        for z in solve_quadratic(1.0, a2, a0) {
            if z > EPS {
                let sz = z.sqrt();
                ys.push(sz);
                ys.push(-sz);
            } else if z >= -EPS {
                ys.push(0.0);
                ys.push(0.0);
            }
        }
    } else {
        // Resolvent cubic 8m^3 + 8*a2*m^2 + (2*a2^2 - 8*a0)*m - a1^2 = 0.
        // Any positive root factors the quartic into two quadratics;
        // the largest is the best conditioned.
        let m = solve_cubic(8.0, 8.0 * a2, 2.0 * a2 * a2 - 8.0 * a0, -a1 * a1)
            .into_iter()
            .filter(|m| *m > EPS)
            .fold(f64::NAN, f64::max);
        if m.is_nan() {
            return Vec::new();
        }
        let sqrt_2m = (2.0 * m).sqrt();
        let k = a1 / (2.0 * sqrt_2m);
        // y^2 + sqrt(2m)*y + (m + a2/2 - k) = 0
        ys.extend(solve_quadratic(1.0, sqrt_2m, m + a2 / 2.0 - k));
        // y^2 - sqrt(2m)*y + (m + a2/2 + k) = 0
        ys.extend(solve_quadratic(1.0, -sqrt_2m, m + a2 / 2.0 + k));
    }

    let coeffs = [c4, c3, c2, c1, c0];
    ys.into_iter().map(|y| polish(&coeffs, y - shift)).collect()
}

/// Refine a root with a few Newton steps on the original polynomial.
///
/// Steps that would move the estimate further from a root are skipped.
fn polish(coeffs: &[f64], mut x: f64) -> f64 {
    for _ in 0..3 {
        let (f, df) = eval_with_derivative(coeffs, x);
        if df.abs() < EPS {
            break;
        }
        let next = x - f / df;
        if !next.is_finite() || eval_with_derivative(coeffs, next).0.abs() > f.abs() {
            break;
        }
        x = next;
    }
    x
}

/// Horner evaluation of a polynomial (highest degree first) and its derivative.
fn eval_with_derivative(coeffs: &[f64], x: f64) -> (f64, f64) {
    let mut f = 0.0;
    let mut df = 0.0;
    for &c in coeffs {
        df = df * x + f;
        f = f * x + c;
    }
    (f, df)
}
