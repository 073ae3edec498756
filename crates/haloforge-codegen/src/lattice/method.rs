//! Single-relaxation-time lattice Boltzmann method description.

use haloforge_ir::{Assignment, Direction, Expr, Stencil};

use crate::error::{CodegenError, Result};

/// Weights of the standard lattices, by number of nonzero axes.
fn lattice_weights(stencil: &Stencil) -> Option<[(i64, i64); 4]> {
    match (stencil.dim(), stencil.len()) {
        (2, 9) => Some([(4, 9), (1, 9), (1, 36), (0, 1)]),
        (3, 15) => Some([(2, 9), (1, 9), (0, 1), (1, 72)]),
        (3, 19) => Some([(1, 3), (1, 18), (1, 36), (0, 1)]),
        (3, 27) => Some([(8, 27), (2, 27), (1, 54), (1, 216)]),
        _ => None,
    }
}

/// `c · v` for a lattice direction and a symbolic vector.
fn dot(c: &Direction, v: &[Expr]) -> Expr {
    Expr::sum(v.iter().enumerate().filter_map(|(axis, x)| {
        match c.component(axis) {
            0 => None,
            1 => Some(x.clone()),
            -1 => Some(-x.clone()),
            k => Some(Expr::int(k as i64) * x.clone()),
        }
    }))
}

/// BGK method: one relaxation rate, second-order equilibrium and an
/// optional Guo body force.
#[derive(Debug, Clone, PartialEq)]
pub struct LbMethod {
    stencil: Stencil,
    weights: Vec<Expr>,
    relaxation_rate: Expr,
    compressible: bool,
    force: Option<Vec<Expr>>,
}

impl LbMethod {
    /// SRT method on a D2Q9, D3Q15, D3Q19 or D3Q27 stencil.
    pub fn srt(stencil: Stencil, relaxation_rate: impl Into<Expr>) -> Result<Self> {
        let table = lattice_weights(&stencil).ok_or_else(|| {
            CodegenError::InvalidInput(format!(
                "no lattice weights known for a {}D stencil with {} directions",
                stencil.dim(),
                stencil.len()
            ))
        })?;
        let weights = stencil
            .iter()
            .map(|d| {
                let (p, q) = table[d.nonzero_axes().min(3)];
                Expr::rational(p, q)
            })
            .collect();
        Ok(Self {
            stencil,
            weights,
            relaxation_rate: relaxation_rate.into(),
            compressible: true,
            force: None,
        })
    }

    /// Select the compressible or incompressible equilibrium.
    pub fn with_compressible(mut self, compressible: bool) -> Self {
        self.compressible = compressible;
        self
    }

    /// Add a body force (one component per spatial axis).
    pub fn with_force(mut self, force: Vec<Expr>) -> Self {
        self.force = Some(force);
        self
    }

    /// Lattice stencil.
    pub fn stencil(&self) -> &Stencil {
        &self.stencil
    }

    /// Quadrature weights, one per direction.
    pub fn weights(&self) -> &[Expr] {
        &self.weights
    }

    /// Relaxation rate.
    pub fn relaxation_rate(&self) -> &Expr {
        &self.relaxation_rate
    }

    /// Check if the equilibrium is compressible.
    pub fn compressible(&self) -> bool {
        self.compressible
    }

    /// Body force, if any.
    pub fn force(&self) -> Option<&[Expr]> {
        self.force.as_deref()
    }

    /// Spatial dimension.
    pub fn dim(&self) -> usize {
        self.stencil.dim()
    }

    /// Density symbol `rho`.
    pub fn density_symbol() -> Expr {
        Expr::symbol("rho")
    }

    /// Velocity symbols `u_0`, `u_1`[, `u_2`].
    pub fn velocity_symbols(&self) -> Vec<Expr> {
        (0..self.dim()).map(|i| Expr::symbol(format!("u_{}", i))).collect()
    }

    /// Momentum density symbols `md_0`, `md_1`[, `md_2`].
    pub fn momentum_density_symbols(&self) -> Vec<Expr> {
        (0..self.dim()).map(|i| Expr::symbol(format!("md_{}", i))).collect()
    }

    /// Pdf symbols `f_0` .. `f_{q-1}`.
    pub fn pdf_symbols(&self) -> Vec<Expr> {
        (0..self.stencil.len())
            .map(|i| Expr::symbol(format!("f_{}", i)))
            .collect()
    }

    /// Equilibrium per direction in `rho` and `u`.
    pub fn equilibrium_with(&self, rho: &Expr, u: &[Expr]) -> Vec<Expr> {
        let uu = Expr::sum(u.iter().map(|x| x.clone() * x.clone()));
        self.stencil
            .iter()
            .zip(&self.weights)
            .map(|(c, w)| {
                let cu = dot(c, u);
                let velocity_part = Expr::int(3) * cu.clone()
                    + Expr::rational(9, 2) * cu.clone() * cu
                    - Expr::rational(3, 2) * uu.clone();
                if self.compressible {
                    w.clone() * rho.clone() * (Expr::int(1) + velocity_part)
                } else {
                    w.clone() * rho.clone() + w.clone() * velocity_part
                }
            })
            .collect()
    }

    /// Equilibrium in the default `rho` / `u_i` symbols.
    pub fn equilibrium(&self) -> Vec<Expr> {
        self.equilibrium_with(&Self::density_symbol(), &self.velocity_symbols())
    }

    /// `rho = sum f_i`.
    pub fn density_equations(&self, pdfs: &[Expr]) -> Vec<Assignment> {
        vec![Assignment::new(
            Self::density_symbol(),
            Expr::sum(pdfs.iter().cloned()),
        )]
    }

    /// Density plus `md_i = sum c_i f_i`, shifted by half the force.
    pub fn momentum_density_equations(&self, pdfs: &[Expr]) -> Vec<Assignment> {
        let mut equations = self.density_equations(pdfs);
        for (axis, md) in self.momentum_density_symbols().into_iter().enumerate() {
            let mut momentum = Expr::sum(self.stencil.iter().zip(pdfs).filter_map(|(c, f)| {
                match c.component(axis) {
                    0 => None,
                    1 => Some(f.clone()),
                    -1 => Some(-f.clone()),
                    k => Some(Expr::int(k as i64) * f.clone()),
                }
            }));
            if let Some(force) = &self.force {
                if let Some(f) = force.get(axis) {
                    momentum = momentum + Expr::rational(1, 2) * f.clone();
                }
            }
            equations.push(Assignment::new(md, momentum));
        }
        equations
    }

    /// Momentum density, then `u_i = md_i / rho` (or `md_i` if incompressible).
    pub fn velocity_equations(&self, pdfs: &[Expr]) -> Vec<Assignment> {
        let mut equations = self.momentum_density_equations(pdfs);
        for (u, md) in self
            .velocity_symbols()
            .into_iter()
            .zip(self.momentum_density_symbols())
        {
            let rhs = if self.compressible {
                md / Self::density_symbol()
            } else {
                md
            };
            equations.push(Assignment::new(u, rhs));
        }
        equations
    }

    /// `rho = rho_in` and `u_i = u_in_i` for setting a cell from macroscopic values.
    pub fn equilibrium_input_from_init(&self, rho_in: &Expr, u_in: &[Expr]) -> Vec<Assignment> {
        let mut equations = vec![Assignment::new(Self::density_symbol(), rho_in.clone())];
        for (u, value) in self.velocity_symbols().into_iter().zip(u_in) {
            equations.push(Assignment::new(u, value.clone()));
        }
        equations
    }

    /// Shift of the macroscopic velocity caused by the force, `F / (2 rho)`.
    pub fn macroscopic_velocity_shift(&self, rho: &Expr) -> Option<Vec<Expr>> {
        self.force.as_ref().map(|force| {
            force
                .iter()
                .map(|f| f.clone() / (Expr::int(2) * rho.clone()))
                .collect()
        })
    }

    /// Post-collision populations given pre-collision ones and the local
    /// macroscopic values.
    pub fn collide(&self, pdfs: &[Expr], rho: &Expr, u: &[Expr]) -> Vec<Expr> {
        let omega = self.relaxation_rate.clone();
        let equilibrium = self.equilibrium_with(rho, u);
        self.stencil
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let f = pdfs[i].clone();
                let mut post = f.clone() - omega.clone() * (f - equilibrium[i].clone());
                if let Some(force) = &self.force {
                    let c_minus_u: Vec<Expr> = u
                        .iter()
                        .enumerate()
                        .map(|(axis, x)| Expr::int(c.component(axis) as i64) - x.clone())
                        .collect();
                    let term = Expr::int(3) * Expr::sum(c_minus_u.into_iter().zip(force).map(|(a, f)| a * f.clone()))
                        + Expr::int(9) * dot(c, u) * dot(c, force);
                    post = post
                        + (Expr::int(1) - omega.clone() / 2)
                            * self.weights[i].clone()
                            * term;
                }
                post
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(e: &Expr, values: &[(&str, f64)]) -> f64 {
        e.evaluate(&mut |leaf| match leaf {
            Expr::Symbol(s) => values.iter().find(|(n, _)| *n == s.name).map(|(_, v)| *v),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_weights_sum_to_one() {
        for stencil in [Stencil::d2q9(), Stencil::d3q15(), Stencil::d3q19(), Stencil::d3q27()] {
            let method = LbMethod::srt(stencil, Expr::symbol("omega")).unwrap();
            let total: f64 = method.weights().iter().map(|w| eval(w, &[])).sum();
            assert!((total - 1.0).abs() < 1e-12);
        }
        assert!(LbMethod::srt(Stencil::d3q7(), Expr::symbol("omega")).is_err());
    }

    #[test]
    fn test_equilibrium_moments() {
        let method = LbMethod::srt(Stencil::d3q19(), Expr::symbol("omega")).unwrap();
        let values = [("rho", 1.2), ("u_0", 0.05), ("u_1", -0.02), ("u_2", 0.01)];
        let feq: Vec<f64> = method.equilibrium().iter().map(|e| eval(e, &values)).collect();
        let rho: f64 = feq.iter().sum();
        assert!((rho - 1.2).abs() < 1e-12);
        let jx: f64 = method
            .stencil()
            .iter()
            .zip(&feq)
            .map(|(c, f)| c.component(0) as f64 * f)
            .sum();
        assert!((jx - 1.2 * 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_rest_state_is_fixed_point() {
        let method = LbMethod::srt(Stencil::d2q9(), Expr::symbol("omega")).unwrap();
        let pdfs = method.pdf_symbols();
        let post = method.collide(&pdfs, &LbMethod::density_symbol(), &method.velocity_symbols());
        // Populations at rest equilibrium with rho = 1 stay unchanged.
        let mut values: Vec<(String, f64)> = method
            .weights()
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("f_{}", i), eval(w, &[])))
            .collect();
        values.extend([("rho".to_string(), 1.0), ("u_0".into(), 0.0), ("u_1".into(), 0.0), ("omega".into(), 1.7)]);
        let lookup: Vec<(&str, f64)> = values.iter().map(|(n, v)| (n.as_str(), *v)).collect();
        for (i, p) in post.iter().enumerate() {
            assert!((eval(p, &lookup) - lookup[i].1).abs() < 1e-12);
        }
    }

    #[test]
    fn test_velocity_equations() {
        let method = LbMethod::srt(Stencil::d2q9(), Expr::symbol("omega")).unwrap();
        let eqs = method.velocity_equations(&method.pdf_symbols());
        let names: Vec<String> = eqs.iter().map(|e| e.lhs.to_string()).collect();
        assert_eq!(names, vec!["rho", "md_0", "md_1", "u_0", "u_1"]);
        assert_eq!(eqs[1].rhs.to_string(), "-f_3 + f_4 - f_5 + f_6 - f_7 + f_8");
    }

    #[test]
    fn test_velocity_shift() {
        let method = LbMethod::srt(Stencil::d2q9(), Expr::symbol("omega"))
            .unwrap()
            .with_force(vec![Expr::symbol("F_0"), Expr::symbol("F_1")]);
        let shift = method.macroscopic_velocity_shift(&LbMethod::density_symbol()).unwrap();
        assert_eq!(shift.len(), 2);
        let v = eval(&shift[0], &[("F_0", 0.2), ("rho", 2.0)]);
        assert!((v - 0.05).abs() < 1e-12);
        assert!(LbMethod::srt(Stencil::d2q9(), Expr::symbol("omega"))
            .unwrap()
            .macroscopic_velocity_shift(&LbMethod::density_symbol())
            .is_none());
    }
}
