//! Expression lowering.
//!
//! Turns symbolic expressions into C source text for a specific embedding:
//! member-variable prefixes, block-framework field accessors and a target
//! numeric type.

use std::collections::BTreeSet;

use haloforge_ir::{Assignment, CPrinter, Expr, ScalarType};
use serde::{Deserialize, Serialize};

use crate::error::{CodegenError, Result};

/// Per-call lowering settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstitutionContext {
    /// Prefix prepended to symbol and field names (`lm.` for member access).
    pub variable_prefix: String,
    /// Names left unprefixed.
    pub variables_without_prefix: BTreeSet<String>,
    /// Numeric type literals and symbols are coerced to.
    pub dtype: ScalarType,
}

impl Default for SubstitutionContext {
    fn default() -> Self {
        Self {
            variable_prefix: "lm.".to_string(),
            variables_without_prefix: BTreeSet::new(),
            dtype: ScalarType::F64,
        }
    }
}

impl SubstitutionContext {
    /// Create a context with a prefix and a target type.
    pub fn new(variable_prefix: impl Into<String>, dtype: ScalarType) -> Self {
        Self {
            variable_prefix: variable_prefix.into(),
            variables_without_prefix: BTreeSet::new(),
            dtype,
        }
    }

    /// Exclude names from prefixing.
    pub fn without_prefix<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables_without_prefix
            .extend(names.into_iter().map(Into::into));
        self
    }

    fn postfix(prefix: &str) -> &'static str {
        if prefix.ends_with('.') {
            "_"
        } else {
            ""
        }
    }

    fn is_excluded(&self, name: &str) -> bool {
        self.variables_without_prefix.contains(name)
    }

    fn prefixed(&self, name: &str) -> String {
        format!(
            "{}{}{}",
            self.variable_prefix,
            name,
            Self::postfix(&self.variable_prefix)
        )
    }
}

/// Replace field accesses by accessor calls and prefix free symbols.
///
/// A field access becomes `<prefix><name>[_]->get(x,y,z)` (one index
/// dimension appends the component). Excluded fields carry neither prefix
/// nor postfix.
pub fn field_and_symbol_substitute(expr: &Expr, ctx: &SubstitutionContext) -> Result<Expr> {
    for fa in expr.field_accesses() {
        if fa.field.index_dimensions() > 1 {
            return Err(CodegenError::UnsupportedFieldShape {
                field: fa.field.name.clone(),
                index_dimensions: fa.field.index_dimensions(),
            });
        }
    }

    Ok(expr.map_leaves(&mut |leaf| match leaf {
        Expr::Access(fa) => {
            let name = if ctx.is_excluded(&fa.field.name) {
                fa.field.name.clone()
            } else {
                ctx.prefixed(&fa.field.name)
            };
            let call = match fa.index.first() {
                None => format!("{}->get(x,y,z)", name),
                Some(i) => format!("{}->get(x,y,z,{})", name, i),
            };
            Some(Expr::typed_symbol(call, fa.field.dtype))
        }
        Expr::Symbol(s) if !ctx.is_excluded(&s.name) => {
            let mut renamed = s.clone();
            renamed.name = ctx.prefixed(&s.name);
            Some(Expr::Symbol(renamed))
        }
        Expr::Indexed { base, index } if !ctx.is_excluded(&base.name) => {
            let mut renamed = base.clone();
            renamed.name = ctx.prefixed(&base.name);
            Some(Expr::Indexed {
                base: renamed,
                index: *index,
            })
        }
        _ => None,
    }))
}

/// Coerce rational and float literals to `dtype` and retype free symbols.
pub fn type_expr(expr: &Expr, dtype: ScalarType) -> Expr {
    expr.map_leaves(&mut |leaf| match leaf {
        Expr::Rational(..) | Expr::Float(_) => Some(Expr::TypedNumber {
            value: leaf.as_number().unwrap_or(f64::NAN),
            dtype,
        }),
        Expr::Symbol(s) => Some(Expr::Symbol(s.with_dtype(dtype))),
        _ => None,
    })
}

/// Lower an expression to C source text.
///
/// Literals are coerced to the context type first, then fields and symbols
/// are substituted.
pub fn lower(expr: &Expr, ctx: &SubstitutionContext) -> Result<String> {
    let typed = type_expr(expr, ctx.dtype);
    let substituted = field_and_symbol_substitute(&typed, ctx)?;
    Ok(CPrinter::typed(ctx.dtype).print(&substituted))
}

/// Lower an expression with coercion only (no prefixing or accessor calls).
pub fn print_typed(expr: &Expr, dtype: ScalarType) -> String {
    CPrinter::typed(dtype).print(&type_expr(expr, dtype))
}

fn lhs_name(lhs: &Expr) -> Result<String> {
    match lhs {
        Expr::Symbol(s) => Ok(s.name.clone()),
        Expr::Indexed { base, index } => Ok(format!("{}_{}", base.name, index)),
        other => Err(CodegenError::InvalidInput(format!(
            "left-hand side '{}' of a declaration must be a symbol",
            other
        ))),
    }
}

/// Lower equations to `const <dtype> <lhs> = <rhs>;` declarations.
///
/// Every left-hand-side name is excluded from prefixing on all right-hand
/// sides, so later equations can refer to earlier results.
pub fn equations_to_code(equations: &[Assignment], ctx: &SubstitutionContext) -> Result<String> {
    let names = equations
        .iter()
        .map(|eq| lhs_name(&eq.lhs))
        .collect::<Result<Vec<_>>>()?;
    let rhs_ctx = ctx.clone().without_prefix(names.iter().cloned());

    let mut lines = Vec::with_capacity(equations.len());
    for (eq, name) in equations.iter().zip(&names) {
        let rhs = lower(&eq.rhs, &rhs_ctx)?;
        lines.push(format!("const {} {} = {};", ctx.dtype.c_name(), name, rhs));
    }
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use haloforge_ir::{Direction, Field};

    #[test]
    fn test_member_prefix_and_postfix() {
        let ctx = SubstitutionContext::default();
        let e = Expr::symbol("omega") * Expr::symbol("rho");
        assert_eq!(lower(&e, &ctx).unwrap(), "lm.omega_ * lm.rho_");

        let plain = SubstitutionContext::new("p_", ScalarType::F64);
        assert_eq!(lower(&Expr::symbol("omega"), &plain).unwrap(), "p_omega");
    }

    #[test]
    fn test_excluded_names() {
        let ctx = SubstitutionContext::default().without_prefix(["rho"]);
        let e = Expr::symbol("rho") + Expr::indexed("u", 1);
        assert_eq!(lower(&e, &ctx).unwrap(), "rho + lm.u_[1]");
    }

    #[test]
    fn test_field_accessors() {
        let force = Field::new("force", 3, ScalarType::F64).with_index_shape([3]);
        let scalar = Field::new("phi", 3, ScalarType::F64);
        let ctx = SubstitutionContext::default().without_prefix(["phi"]);
        let e = Expr::from(force.center([2])) + Expr::from(scalar.center(vec![]));
        assert_eq!(
            lower(&e, &ctx).unwrap(),
            "lm.force_->get(x,y,z,2) + phi->get(x,y,z)"
        );
    }

    #[test]
    fn test_tensor_field_rejected() {
        let tensor = Field::new("t", 3, ScalarType::F64).with_index_shape([3, 3]);
        let e = Expr::from(tensor.access(Direction::zero(3), [0, 1]));
        assert!(matches!(
            lower(&e, &SubstitutionContext::default()),
            Err(CodegenError::UnsupportedFieldShape {
                index_dimensions: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_literal_typing() {
        let e = Expr::rational(1, 2) * Expr::symbol("x") + Expr::float(0.25);
        let double = SubstitutionContext::new("", ScalarType::F64);
        assert_eq!(lower(&e, &double).unwrap(), "0.5 * x + 0.25");
        let single = SubstitutionContext::new("", ScalarType::F32);
        assert_eq!(lower(&e, &single).unwrap(), "0.5f * x + 0.25f");
    }

    #[test]
    fn test_coercion_before_substitution() {
        let force = Field::new("force", 3, ScalarType::F32).with_index_shape([3]);
        let e = Expr::from(force.center([2])) + Expr::symbol("omega") + Expr::float(0.25);
        let ctx = SubstitutionContext::new("lm.", ScalarType::F32);

        let substituted = field_and_symbol_substitute(&type_expr(&e, ctx.dtype), &ctx).unwrap();
        assert!(substituted
            .symbols()
            .iter()
            .all(|s| s.dtype == Some(ScalarType::F32)));
        assert_eq!(
            lower(&e, &ctx).unwrap(),
            "lm.force_->get(x,y,z,2) + lm.omega_ + 0.25f"
        );
    }

    #[test]
    fn test_lower_is_pure() {
        let e = Expr::symbol("a") + Expr::float(1.5);
        let before = e.clone();
        let _ = lower(&e, &SubstitutionContext::default()).unwrap();
        assert_eq!(e, before);
    }

    #[test]
    fn test_equations_to_code() {
        let eqs = vec![
            Assignment::new(Expr::symbol("rho"), Expr::symbol("f_0") + Expr::symbol("f_1")),
            Assignment::new(
                Expr::symbol("u_0"),
                Expr::symbol("md") / Expr::symbol("rho"),
            ),
        ];
        let ctx = SubstitutionContext::default().without_prefix(["f_0", "f_1"]);
        let code = equations_to_code(&eqs, &ctx).unwrap();
        assert_eq!(
            code,
            "const double rho = f_0 + f_1;\nconst double u_0 = lm.md_ / rho;"
        );
    }
}
