//! Direction switch statements.

use haloforge_ir::{Expr, ScalarType, Stencil};

use crate::error::{CodegenError, Result};
use crate::lowering::print_typed;

/// Build a C++ `switch( direction )` returning one value per stencil direction.
///
/// Values pair with directions positionally; case labels are the canonical
/// direction names. Unknown directions abort.
pub fn build_switch(stencil: &Stencil, values: &[Expr], dtype: ScalarType) -> Result<String> {
    if stencil.len() != values.len() {
        return Err(CodegenError::StencilLengthMismatch {
            stencil: stencil.len(),
            values: values.len(),
        });
    }

    let mut lines = vec![
        "using namespace stencil;".to_string(),
        "switch( direction ) {".to_string(),
    ];
    for (direction, value) in stencil.iter().zip(values) {
        lines.push(format!(
            "    case {}: return {};",
            direction.name(),
            print_typed(value, dtype)
        ));
    }
    lines.push("    default:".to_string());
    lines.push("        WALBERLA_ABORT(\"Invalid Direction\");".to_string());
    lines.push("}".to_string());
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cases_follow_stencil_order() {
        let stencil = Stencil::d2q9();
        let values: Vec<Expr> = (0..9).map(Expr::int).collect();
        let code = build_switch(&stencil, &values, ScalarType::F64).unwrap();
        let cases: Vec<&str> = code
            .lines()
            .filter(|l| l.trim_start().starts_with("case"))
            .collect();
        assert_eq!(cases.len(), 9);
        assert_eq!(cases[0].trim(), "case C: return 0;");
        assert_eq!(cases[6].trim(), "case NE: return 6;");
        assert!(code.contains("WALBERLA_ABORT(\"Invalid Direction\");"));
        assert!(code.starts_with("using namespace stencil;"));
    }

    #[test]
    fn test_typed_values() {
        let stencil = Stencil::d2q9();
        let values: Vec<Expr> = (0..9).map(|_| Expr::rational(1, 4)).collect();
        let code = build_switch(&stencil, &values, ScalarType::F32).unwrap();
        assert!(code.contains("case N: return 0.25f;"));
    }

    #[test]
    fn test_length_mismatch() {
        let err = build_switch(&Stencil::d3q19(), &[Expr::int(1)], ScalarType::F64).unwrap_err();
        assert!(matches!(
            err,
            CodegenError::StencilLengthMismatch {
                stencil: 19,
                values: 1
            }
        ));
    }
}
