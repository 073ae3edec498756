//! Parameter scaling on refined grid levels.

use haloforge_ir::{Expr, Field, FieldAccess, ScalarType};
use serde::Serialize;

use crate::error::Result;
use crate::lowering::{lower, SubstitutionContext};

/// Storage of a scaled parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingKind {
    /// Scalar member.
    Normal,
    /// Field without index dimensions, scaled per cell.
    FieldXyz,
    /// Field with an index dimension, scaled per cell and component `f`.
    FieldWithF,
}

/// Parameter a scaling rule applies to.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingParameter {
    /// Scalar parameter.
    Symbol(String),
    /// Every value of a field.
    Field(Field),
    /// One field access.
    Access(FieldAccess),
}

impl From<&str> for ScalingParameter {
    fn from(name: &str) -> Self {
        ScalingParameter::Symbol(name.to_string())
    }
}

/// One scaling rule.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingEntry {
    /// Storage kind.
    pub kind: ScalingKind,
    /// Parameter name.
    pub name: String,
    /// Scaled value.
    pub expr: Expr,
}

/// Lowered scaling rule, as used by the templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalingInfo {
    /// Storage kind.
    pub kind: ScalingKind,
    /// Member name (parameter name plus `_`).
    pub name: String,
    /// Scaled value in C.
    pub expr: String,
}

/// `omega / (omega / 2 + level_scale_factor * (1 - omega / 2))`
pub fn relaxation_rate_scaling(omega: Expr, level_scale_factor: Expr) -> Expr {
    omega.clone()
        / (omega.clone() / 2 + level_scale_factor * (Expr::int(1) - omega / 2))
}

/// Rules for scaling parameters on refined levels.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefinementScaling {
    entries: Vec<ScalingEntry>,
}

impl RefinementScaling {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbol for how much finer a level is than the coarsest one.
    pub fn level_scale_factor() -> Expr {
        Expr::symbol("level_scale_factor")
    }

    /// Add a rule `scaled = rule(parameter, level_scale_factor)`.
    pub fn add_scaling<F>(&mut self, parameter: ScalingParameter, rule: F)
    where
        F: Fn(Expr, Expr) -> Expr,
    {
        let factor = Self::level_scale_factor();
        let (kind, name, value) = match parameter {
            ScalingParameter::Symbol(name) => (ScalingKind::Normal, name.clone(), Expr::symbol(name)),
            ScalingParameter::Field(field) if field.index_dimensions() > 0 => (
                ScalingKind::FieldWithF,
                field.name.clone(),
                // The component index stays symbolic.
                Expr::symbol(format!("{}->get(x,y,z,f)", field.name)),
            ),
            ScalingParameter::Field(field) => (
                ScalingKind::FieldXyz,
                field.name.clone(),
                Expr::from(field.center(Vec::<usize>::new())),
            ),
            ScalingParameter::Access(fa) => {
                (ScalingKind::FieldXyz, fa.field.name.clone(), Expr::from(fa))
            }
        };
        self.entries.push(ScalingEntry {
            kind,
            name,
            expr: rule(value, factor),
        });
    }

    /// Standard viscosity-preserving scaling of a relaxation rate.
    pub fn add_standard_relaxation_rate_scaling(&mut self, parameter: ScalingParameter) {
        self.add_scaling(parameter, relaxation_rate_scaling);
    }

    /// Force scaling `F / level_scale_factor`.
    pub fn add_force_scaling(&mut self, parameter: ScalingParameter) {
        self.add_scaling(parameter, |p, factor| p * (Expr::int(1) / factor));
    }

    /// Rules in insertion order.
    pub fn entries(&self) -> &[ScalingEntry] {
        &self.entries
    }

    /// Check if no rule was added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lower every rule; parameter names turn into member names.
    pub fn lowered(&self, dtype: ScalarType) -> Result<Vec<ScalingInfo>> {
        let ctx = SubstitutionContext::new("", dtype);
        self.entries
            .iter()
            .map(|e| {
                let member = format!("{}_", e.name);
                let code = lower(&e.expr, &ctx)?.replace(&e.name, &member);
                Ok(ScalingInfo {
                    kind: e.kind,
                    name: member,
                    expr: code,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relaxation_rate_scaling() {
        let mut scaling = RefinementScaling::new();
        scaling.add_standard_relaxation_rate_scaling("omega".into());
        let info = scaling.lowered(ScalarType::F64).unwrap();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].kind, ScalingKind::Normal);
        assert_eq!(info[0].name, "omega_");
        assert!(info[0].expr.starts_with("omega_ / ("));
        assert!(info[0].expr.contains("level_scale_factor"));
        assert!(!info[0].expr.contains("omega * "));

        let e = &scaling.entries()[0].expr;
        let v = e
            .evaluate(&mut |leaf| match leaf {
                Expr::Symbol(s) if s.name == "omega" => Some(1.8),
                Expr::Symbol(s) if s.name == "level_scale_factor" => Some(1.0),
                _ => None,
            })
            .unwrap();
        // No refinement leaves the rate unchanged.
        assert!((v - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_field_kinds() {
        let mut scaling = RefinementScaling::new();
        let force = Field::new("force", 3, ScalarType::F64).with_index_shape([3]);
        let phi = Field::new("phi", 3, ScalarType::F64);
        scaling.add_force_scaling(ScalingParameter::Field(force));
        scaling.add_force_scaling(ScalingParameter::Field(phi));
        let info = scaling.lowered(ScalarType::F32).unwrap();
        assert_eq!(info[0].kind, ScalingKind::FieldWithF);
        assert!(info[0].expr.starts_with("force_->get(x,y,z,f)"));
        assert_eq!(info[1].kind, ScalingKind::FieldXyz);
        assert!(info[1].expr.starts_with("phi_->get(x,y,z)"));
    }
}
