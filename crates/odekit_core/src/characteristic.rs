//! Characteristic roots of constant-coefficient linear ODEs
//! `a_n y^(n) + ... + a_1 y' + a_0 y = 0` and the matching solution basis.

use anyhow::{bail, Result};
use nalgebra::DMatrix;
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Roots are rounded to this many decimals before classification.
const ROUND_DECIMALS: i32 = 6;
/// `|im|` below this is treated as a real root.
const IMAG_EPS: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RootSettings {
    /// Relative distance under which two roots count as one repeated root.
    pub merge_tolerance: f64,
}

impl Default for RootSettings {
    fn default() -> Self {
        Self {
            merge_tolerance: 1e-5,
        }
    }
}

/// A distinct root. Complex roots stand for the conjugate pair `re ± i·im` with `im > 0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicRoot {
    pub re: f64,
    pub im: f64,
    pub multiplicity: usize,
}

impl CharacteristicRoot {
    pub fn is_real(&self) -> bool {
        self.im == 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacteristicRoots {
    pub real: Vec<CharacteristicRoot>,
    pub complex: Vec<CharacteristicRoot>,
}

/// One homogeneous solution `x^power · e^(alpha x) · {1, cos(beta x), sin(beta x)}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BasisFunction {
    Exponential { power: usize, rate: f64 },
    Cosine { power: usize, alpha: f64, beta: f64 },
    Sine { power: usize, alpha: f64, beta: f64 },
}

fn round_decimals(v: f64) -> f64 {
    let scale = 10f64.powi(ROUND_DECIMALS);
    let r = (v * scale).round() / scale;
    // Avoid printing -0
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

fn fmt_coeff(v: f64) -> String {
    if v < 0.0 {
        format!("({})", v)
    } else {
        format!("{}", v)
    }
}

fn prefix(power: usize) -> String {
    match power {
        0 => String::new(),
        1 => "x*".to_string(),
        p => format!("x^{}*", p),
    }
}

impl fmt::Display for BasisFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            BasisFunction::Exponential { power, rate } => {
                if rate == 0.0 {
                    match power {
                        0 => write!(f, "1"),
                        1 => write!(f, "x"),
                        p => write!(f, "x^{}", p),
                    }
                } else {
                    write!(f, "{}exp({}*x)", prefix(power), fmt_coeff(rate))
                }
            }
            BasisFunction::Cosine { power, alpha, beta } => {
                write!(f, "{}", prefix(power))?;
                if alpha != 0.0 {
                    write!(f, "exp({}*x)*", fmt_coeff(alpha))?;
                }
                write!(f, "cos({}*x)", beta)
            }
            BasisFunction::Sine { power, alpha, beta } => {
                write!(f, "{}", prefix(power))?;
                if alpha != 0.0 {
                    write!(f, "exp({}*x)*", fmt_coeff(alpha))?;
                }
                write!(f, "sin({}*x)", beta)
            }
        }
    }
}

/// Finds the roots of `a_n r^n + ... + a_0` (coefficients highest order first) through the
/// eigenvalues of the companion matrix.
pub fn characteristic_roots(coefficients: &[f64], settings: RootSettings) -> Result<CharacteristicRoots> {
    if coefficients.len() < 2 {
        bail!("Characteristic polynomial needs degree at least one.");
    }
    if coefficients.iter().any(|c| !c.is_finite()) {
        bail!("Coefficients must be finite.");
    }
    let lead = coefficients[0];
    if lead == 0.0 {
        bail!("Leading coefficient must be non-zero.");
    }
    if !(settings.merge_tolerance > 0.0) {
        bail!("merge_tolerance must be positive.");
    }

    let degree = coefficients.len() - 1;
    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for j in 0..degree {
        companion[(0, j)] = -coefficients[j + 1] / lead;
    }
    for i in 1..degree {
        companion[(i, i - 1)] = 1.0;
    }

    let eigenvalues = companion.complex_eigenvalues();
    let rounded: Vec<Complex<f64>> = eigenvalues
        .iter()
        .map(|z| Complex::new(round_decimals(z.re), round_decimals(z.im)))
        .collect();

    let mut real = Vec::new();
    let mut complex = Vec::new();
    for z in rounded {
        if z.im.abs() < IMAG_EPS {
            merge(&mut real, z.re, 0.0, settings.merge_tolerance);
        } else if z.im > 0.0 {
            // One representative per conjugate pair.
            merge(&mut complex, z.re, z.im, settings.merge_tolerance);
        }
    }

    real.sort_by(|a, b| b.re.total_cmp(&a.re));
    complex.sort_by(|a, b| b.re.total_cmp(&a.re).then(a.im.total_cmp(&b.im)));
    Ok(CharacteristicRoots { real, complex })
}

fn merge(roots: &mut Vec<CharacteristicRoot>, re: f64, im: f64, tolerance: f64) {
    let z = Complex::new(re, im);
    for root in roots.iter_mut() {
        let existing = Complex::new(root.re, root.im);
        let scale = existing.norm().max(1.0);
        if (existing - z).norm() <= tolerance * scale {
            // Running mean keeps the representative centred in the cluster.
            let m = root.multiplicity as f64;
            root.re = round_decimals((root.re * m + re) / (m + 1.0));
            root.im = round_decimals((root.im * m + im) / (m + 1.0));
            root.multiplicity += 1;
            return;
        }
    }
    roots.push(CharacteristicRoot {
        re,
        im,
        multiplicity: 1,
    });
}

impl CharacteristicRoots {
    /// Degree accounted for by the roots (conjugate pairs count twice).
    pub fn degree(&self) -> usize {
        self.real.iter().map(|r| r.multiplicity).sum::<usize>()
            + 2 * self.complex.iter().map(|r| r.multiplicity).sum::<usize>()
    }

    pub fn basis(&self) -> Vec<BasisFunction> {
        let mut basis = Vec::with_capacity(self.degree());
        for root in &self.real {
            for power in 0..root.multiplicity {
                basis.push(BasisFunction::Exponential {
                    power,
                    rate: root.re,
                });
            }
        }
        for root in &self.complex {
            for power in 0..root.multiplicity {
                basis.push(BasisFunction::Cosine {
                    power,
                    alpha: root.re,
                    beta: root.im,
                });
                basis.push(BasisFunction::Sine {
                    power,
                    alpha: root.re,
                    beta: root.im,
                });
            }
        }
        basis
    }

    /// `y = C1*... + C2*... + ...`
    pub fn general_solution(&self) -> String {
        let terms: Vec<String> = self
            .basis()
            .iter()
            .enumerate()
            .map(|(i, b)| format!("C{}*{}", i + 1, b))
            .collect();
        format!("y = {}", terms.join(" + "))
    }
}
