//! C expression printer.
//!
//! Produces C / C++ / CUDA source text for expression trees.

use crate::{Assignment, Expr, ScalarType};

/// Binding strength of a printed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Add,
    Mul,
    Unary,
    Atom,
}

/// C expression printer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CPrinter {
    dtype: Option<ScalarType>,
}

impl CPrinter {
    /// Create a printer without a target type.
    pub fn new() -> Self {
        Self { dtype: None }
    }

    /// Create a printer whose synthesized literals use `dtype`.
    pub fn typed(dtype: ScalarType) -> Self {
        Self { dtype: Some(dtype) }
    }

    /// Print an expression.
    pub fn print(&self, expr: &Expr) -> String {
        self.print_expr(expr)
    }

    /// Print an assignment statement (`lhs = rhs;`).
    pub fn print_assignment(&self, assignment: &Assignment) -> String {
        format!(
            "{} = {};",
            self.print_expr(&assignment.lhs),
            self.print_expr(&assignment.rhs)
        )
    }

    fn one(&self) -> String {
        match self.dtype {
            Some(ScalarType::F32) => "1.0f".to_string(),
            _ => "1.0".to_string(),
        }
    }

    fn precedence(expr: &Expr) -> Precedence {
        match expr {
            Expr::Add(_) => Precedence::Add,
            Expr::Rational(..) => Precedence::Mul,
            Expr::Mul(_) => Precedence::Mul,
            Expr::Neg(_) => Precedence::Unary,
            Expr::Pow(_, exp) if exp.is_negative_number() => Precedence::Mul,
            e if e.is_negative_number() => Precedence::Unary,
            _ => Precedence::Atom,
        }
    }

    fn wrapped(&self, expr: &Expr, min: Precedence) -> String {
        let text = self.print_expr(expr);
        if Self::precedence(expr) < min {
            format!("({})", text)
        } else {
            text
        }
    }

    fn print_expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Integer(n) => n.to_string(),
            Expr::Rational(p, q) => format!("{}.0 / {}.0", p, q),
            Expr::Float(v) => format_f64(*v),
            Expr::TypedNumber { value, dtype } => format_typed(*value, *dtype),
            Expr::Symbol(s) => s.name.clone(),
            Expr::Indexed { base, index } => format!("{}[{}]", base.name, index),
            Expr::Access(fa) => fa.to_string(),
            Expr::Add(terms) => self.print_add(terms),
            Expr::Mul(factors) => self.print_mul(factors),
            Expr::Pow(base, exp) => self.print_pow(base, exp),
            Expr::Neg(inner) => format!("-{}", self.wrapped(inner, Precedence::Atom)),
            Expr::Call(name, args) => {
                let args: Vec<String> = args.iter().map(|a| self.print_expr(a)).collect();
                format!("{}({})", name, args.join(", "))
            }
            Expr::Cast(inner, dtype) => {
                format!("(({})({}))", dtype.c_name(), self.print_expr(inner))
            }
        }
    }

    fn print_add(&self, terms: &[Expr]) -> String {
        let mut out = String::new();
        for (i, term) in terms.iter().enumerate() {
            if i == 0 {
                out.push_str(&self.print_expr(term));
                continue;
            }
            match term {
                Expr::Neg(inner) => {
                    out.push_str(" - ");
                    out.push_str(&self.wrapped(inner, Precedence::Mul));
                }
                e if e.is_negative_number() => {
                    out.push_str(" - ");
                    out.push_str(&self.print_expr(&-e.clone()));
                }
                e => {
                    out.push_str(" + ");
                    out.push_str(&self.print_expr(e));
                }
            }
        }
        out
    }

    fn print_mul(&self, factors: &[Expr]) -> String {
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        for factor in factors {
            match factor {
                Expr::Pow(base, exp) if matches!(exp.as_ref(), Expr::Integer(-1)) => {
                    denominator.push(base.as_ref())
                }
                other => numerator.push(other),
            }
        }
        let mut out = if numerator.is_empty() {
            self.one()
        } else {
            numerator
                .iter()
                .map(|f| self.wrapped(f, Precedence::Atom))
                .collect::<Vec<_>>()
                .join(" * ")
        };
        for den in denominator {
            out.push_str(" / ");
            out.push_str(&self.wrapped(den, Precedence::Atom));
        }
        out
    }

    fn print_pow(&self, base: &Expr, exp: &Expr) -> String {
        if let Expr::Integer(n) = exp {
            let n = *n;
            if n == 1 {
                return self.print_expr(base);
            }
            if (2..=8).contains(&n.abs()) {
                let b = self.wrapped(base, Precedence::Atom);
                let product = vec![b; n.unsigned_abs() as usize].join(" * ");
                return if n > 0 {
                    format!("({})", product)
                } else {
                    format!("{} / ({})", self.one(), product)
                };
            }
            if n == -1 {
                return format!("{} / {}", self.one(), self.wrapped(base, Precedence::Atom));
            }
        }
        match exp.as_number() {
            Some(v) if v == 0.5 => format!("sqrt({})", self.print_expr(base)),
            Some(v) if v == -0.5 => format!("{} / sqrt({})", self.one(), self.print_expr(base)),
            _ => format!("pow({}, {})", self.print_expr(base), self.print_expr(exp)),
        }
    }
}

/// Shortest round-tripping spelling of a double, always with a decimal
/// point or exponent.
fn format_f64(value: f64) -> String {
    format!("{:?}", value)
}

fn format_typed(value: f64, dtype: ScalarType) -> String {
    match dtype {
        ScalarType::F64 => format_f64(value),
        ScalarType::F32 => format!("{:?}f", value as f32),
        ScalarType::Bool => (if value != 0.0 { "true" } else { "false" }).to_string(),
        _ => (value.trunc() as i64).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn y() -> Expr {
        Expr::symbol("y")
    }

    #[test]
    fn test_sums_and_products() {
        let p = CPrinter::new();
        assert_eq!(p.print(&(x() + y())), "x + y");
        assert_eq!(p.print(&(x() - y())), "x - y");
        assert_eq!(p.print(&((x() + y()) * x())), "(x + y) * x");
        assert_eq!(p.print(&(x() - (x() + y()))), "x - (x + y)");
        assert_eq!(p.print(&(x() + Expr::int(-3))), "x - 3");
        assert_eq!(p.print(&(-x() * y())), "(-x) * y");
    }

    #[test]
    fn test_division() {
        let p = CPrinter::new();
        assert_eq!(p.print(&(x() / y())), "x / y");
        assert_eq!(p.print(&(x() / (x() + y()))), "x / (x + y)");
        assert_eq!(p.print(&y().pow(-1)), "1.0 / y");
        assert_eq!(CPrinter::typed(ScalarType::F32).print(&y().pow(-1)), "1.0f / y");
    }

    #[test]
    fn test_powers() {
        let p = CPrinter::new();
        assert_eq!(p.print(&x().pow(2)), "(x * x)");
        assert_eq!(p.print(&(x() + y()).pow(3)), "((x + y) * (x + y) * (x + y))");
        assert_eq!(p.print(&x().sqrt()), "sqrt(x)");
        assert_eq!(p.print(&x().pow(12)), "pow(x, 12)");
        assert_eq!(p.print(&x().pow(Expr::float(1.5))), "pow(x, 1.5)");
    }

    #[test]
    fn test_typed_literals() {
        let half = |dtype| Expr::TypedNumber { value: 0.5, dtype };
        let p = CPrinter::new();
        assert_eq!(p.print(&half(ScalarType::F64)), "0.5");
        assert_eq!(p.print(&half(ScalarType::F32)), "0.5f");
        assert_eq!(
            p.print(&Expr::TypedNumber {
                value: 1.0,
                dtype: ScalarType::F64
            }),
            "1.0"
        );
        assert_eq!(p.print(&x().cast(ScalarType::F64)), "((double)(x))");
    }

    #[test]
    fn test_calls_and_indexed() {
        let p = CPrinter::new();
        let e = Expr::call("fmax", vec![Expr::indexed("u", 1), Expr::float(0.0)]);
        assert_eq!(p.print(&e), "fmax(u[1], 0.0)");
        let a = Assignment::new(Expr::symbol("rho"), x() * y());
        assert_eq!(p.print_assignment(&a), "rho = x * y;");
    }
}
