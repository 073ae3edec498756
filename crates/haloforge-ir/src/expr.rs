//! Symbolic expression trees.
//!
//! Expressions are immutable values. Every transformation (`substitute`,
//! `map_leaves`, `expand`, ...) returns a new tree and leaves the input
//! untouched, so one tree can be lowered with several contexts.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

use crate::{CPrinter, FieldAccess, ScalarType};

/// A named scalar symbol, optionally carrying a type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Symbol {
    /// Symbol name as printed.
    pub name: String,
    /// Declared type, if any.
    #[serde(default)]
    pub dtype: Option<ScalarType>,
}

impl Symbol {
    /// Untyped symbol.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
        }
    }

    /// Typed symbol.
    pub fn typed(name: impl Into<String>, dtype: ScalarType) -> Self {
        Self {
            name: name.into(),
            dtype: Some(dtype),
        }
    }

    /// The same symbol with a new type.
    pub fn with_dtype(&self, dtype: ScalarType) -> Self {
        Self {
            name: self.name.clone(),
            dtype: Some(dtype),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Integer literal.
    Integer(i64),
    /// Exact rational literal `p / q`, normalized with `q > 1`.
    Rational(i64, i64),
    /// Untyped floating point literal.
    Float(f64),
    /// Literal coerced to a concrete type.
    TypedNumber {
        /// Numeric value.
        value: f64,
        /// Target type of the literal.
        dtype: ScalarType,
    },
    /// Scalar symbol.
    Symbol(Symbol),
    /// Element of an array symbol (`base[index]`).
    Indexed {
        /// Array symbol.
        base: Symbol,
        /// Element index.
        index: usize,
    },
    /// Relative field access.
    Access(FieldAccess),
    /// Sum of terms.
    Add(Vec<Expr>),
    /// Product of factors.
    Mul(Vec<Expr>),
    /// `base ^ exponent`.
    Pow(Box<Expr>, Box<Expr>),
    /// Negation.
    Neg(Box<Expr>),
    /// Function call.
    Call(String, Vec<Expr>),
    /// Explicit type conversion.
    Cast(Box<Expr>, ScalarType),
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl Expr {
    /// Integer literal.
    pub fn int(value: i64) -> Self {
        Expr::Integer(value)
    }

    /// Rational literal, reduced to lowest terms.
    ///
    /// A zero denominator yields a NaN float literal.
    pub fn rational(numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Expr::Float(f64::NAN);
        }
        let g = gcd(numerator, denominator).max(1);
        let sign = if denominator < 0 { -1 } else { 1 };
        let (p, q) = (sign * numerator / g, sign * denominator / g);
        if q == 1 {
            Expr::Integer(p)
        } else {
            Expr::Rational(p, q)
        }
    }

    /// Untyped float literal.
    pub fn float(value: f64) -> Self {
        Expr::Float(value)
    }

    /// Untyped symbol.
    pub fn symbol(name: impl Into<String>) -> Self {
        Expr::Symbol(Symbol::new(name))
    }

    /// Typed symbol.
    pub fn typed_symbol(name: impl Into<String>, dtype: ScalarType) -> Self {
        Expr::Symbol(Symbol::typed(name, dtype))
    }

    /// Array element `base[index]`.
    pub fn indexed(base: impl Into<String>, index: usize) -> Self {
        Expr::Indexed {
            base: Symbol::new(base),
            index,
        }
    }

    /// Function call.
    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call(name.into(), args)
    }

    /// Square root.
    pub fn sqrt(self) -> Self {
        Expr::Pow(Box::new(self), Box::new(Expr::Rational(1, 2)))
    }

    /// Power.
    pub fn pow(self, exponent: impl Into<Expr>) -> Self {
        Expr::Pow(Box::new(self), Box::new(exponent.into()))
    }

    /// Type conversion.
    pub fn cast(self, dtype: ScalarType) -> Self {
        Expr::Cast(Box::new(self), dtype)
    }

    /// Sum of terms, flattening nested sums. An empty sum is `0`.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for term in terms {
            match term {
                Expr::Add(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Integer(0),
            1 => flat.remove(0),
            _ => Expr::Add(flat),
        }
    }

    /// Product of factors, flattening nested products. An empty product is `1`.
    pub fn product(factors: impl IntoIterator<Item = Expr>) -> Self {
        let mut flat = Vec::new();
        for factor in factors {
            match factor {
                Expr::Mul(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expr::Integer(1),
            1 => flat.remove(0),
            _ => Expr::Mul(flat),
        }
    }

    /// Check if this node has no children.
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Expr::Integer(_)
                | Expr::Rational(..)
                | Expr::Float(_)
                | Expr::TypedNumber { .. }
                | Expr::Symbol(_)
                | Expr::Indexed { .. }
                | Expr::Access(_)
        )
    }

    /// Numeric value of a literal node.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Expr::Integer(n) => Some(*n as f64),
            Expr::Rational(p, q) => Some(*p as f64 / *q as f64),
            Expr::Float(v) => Some(*v),
            Expr::TypedNumber { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// Check if this is a literal with a negative value.
    pub fn is_negative_number(&self) -> bool {
        self.as_number().map(|v| v < 0.0).unwrap_or(false)
    }

    fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Add(items) | Expr::Mul(items) | Expr::Call(_, items) => items.iter().collect(),
            Expr::Pow(base, exp) => vec![base.as_ref(), exp.as_ref()],
            Expr::Neg(inner) | Expr::Cast(inner, _) => vec![inner.as_ref()],
            _ => Vec::new(),
        }
    }

    fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        f(self);
        for child in self.children() {
            child.visit(f);
        }
    }

    /// Free scalar symbols (not `Indexed` bases).
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut result = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Symbol(s) = e {
                result.insert(s.clone());
            }
        });
        result
    }

    /// Field accesses, ordered.
    pub fn field_accesses(&self) -> BTreeSet<FieldAccess> {
        let mut result = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Access(fa) = e {
                result.insert(fa.clone());
            }
        });
        result
    }

    /// Rebuild the tree top-down. Where `f` returns a replacement the
    /// subtree is replaced and not visited further.
    pub fn transform<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Add(terms) => Expr::Add(terms.iter().map(|t| t.transform(f)).collect()),
            Expr::Mul(factors) => Expr::Mul(factors.iter().map(|t| t.transform(f)).collect()),
            Expr::Pow(base, exp) => {
                Expr::Pow(Box::new(base.transform(f)), Box::new(exp.transform(f)))
            }
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.transform(f))),
            Expr::Call(name, args) => {
                Expr::Call(name.clone(), args.iter().map(|a| a.transform(f)).collect())
            }
            Expr::Cast(inner, dtype) => Expr::Cast(Box::new(inner.transform(f)), *dtype),
            leaf => leaf.clone(),
        }
    }

    /// Rebuild the tree with `f` applied to every leaf.
    pub fn map_leaves<F>(&self, f: &mut F) -> Expr
    where
        F: FnMut(&Expr) -> Option<Expr>,
    {
        self.transform(&mut |e| if e.is_leaf() { f(e) } else { None })
    }

    /// Replace every subtree equal to `from` with `to`.
    pub fn substitute(&self, from: &Expr, to: &Expr) -> Expr {
        self.transform(&mut |e| if e == from { Some(to.clone()) } else { None })
    }

    /// Apply several substitutions at once (first match wins).
    pub fn substitute_all(&self, rules: &[(Expr, Expr)]) -> Expr {
        self.transform(&mut |e| {
            rules
                .iter()
                .find(|(from, _)| from == e)
                .map(|(_, to)| to.clone())
        })
    }

    /// Evaluate numerically. `leaf` supplies values for symbols, indexed
    /// symbols and field accesses; `None` anywhere yields `None`.
    pub fn evaluate<F>(&self, leaf: &mut F) -> Option<f64>
    where
        F: FnMut(&Expr) -> Option<f64>,
    {
        if let Some(v) = self.as_number() {
            return Some(v);
        }
        match self {
            Expr::Symbol(_) | Expr::Indexed { .. } | Expr::Access(_) => leaf(self),
            Expr::Add(terms) => terms.iter().try_fold(0.0, |acc, t| Some(acc + t.evaluate(leaf)?)),
            Expr::Mul(factors) => factors
                .iter()
                .try_fold(1.0, |acc, t| Some(acc * t.evaluate(leaf)?)),
            Expr::Pow(base, exp) => Some(base.evaluate(leaf)?.powf(exp.evaluate(leaf)?)),
            Expr::Neg(inner) => Some(-inner.evaluate(leaf)?),
            Expr::Cast(inner, dtype) => {
                let v = inner.evaluate(leaf)?;
                Some(match dtype {
                    ScalarType::F32 => v as f32 as f64,
                    ScalarType::F64 => v,
                    ScalarType::Bool => (v != 0.0) as i64 as f64,
                    _ => v.trunc(),
                })
            }
            Expr::Call(name, args) => {
                let values: Option<Vec<f64>> = args.iter().map(|a| a.evaluate(leaf)).collect();
                let values = values?;
                match (name.as_str(), values.as_slice()) {
                    ("sqrt", [x]) => Some(x.sqrt()),
                    ("exp", [x]) => Some(x.exp()),
                    ("log", [x]) => Some(x.ln()),
                    ("fabs" | "abs", [x]) => Some(x.abs()),
                    ("sin", [x]) => Some(x.sin()),
                    ("cos", [x]) => Some(x.cos()),
                    ("min" | "fmin", [a, b]) => Some(a.min(*b)),
                    ("max" | "fmax", [a, b]) => Some(a.max(*b)),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Distribute products over sums. Like terms are not collected.
    pub fn expand(&self) -> Expr {
        Expr::sum(self.expand_terms())
    }

    fn expand_terms(&self) -> Vec<Expr> {
        match self {
            Expr::Add(terms) => terms.iter().flat_map(Expr::expand_terms).collect(),
            Expr::Neg(inner) => inner.expand_terms().into_iter().map(negate).collect(),
            Expr::Mul(factors) => {
                let expanded: Vec<Vec<Expr>> = factors.iter().map(Expr::expand_terms).collect();
                cartesian_products(&expanded)
            }
            Expr::Pow(base, exp) => match exp.as_ref() {
                Expr::Integer(n) if (2..=8).contains(n) => {
                    let base_terms = base.expand_terms();
                    if base_terms.len() < 2 {
                        return vec![Expr::Pow(Box::new(Expr::sum(base_terms)), exp.clone())];
                    }
                    let copies: Vec<Vec<Expr>> = (0..*n).map(|_| base_terms.clone()).collect();
                    cartesian_products(&copies)
                }
                _ => vec![Expr::Pow(Box::new(base.expand()), Box::new(exp.expand()))],
            },
            Expr::Call(name, args) => {
                vec![Expr::Call(name.clone(), args.iter().map(Expr::expand).collect())]
            }
            Expr::Cast(inner, dtype) => vec![Expr::Cast(Box::new(inner.expand()), *dtype)],
            leaf => vec![leaf.clone()],
        }
    }

    /// Split into the parts that are even and odd under negation of
    /// `variables` (leaf expressions such as symbols or indexed symbols).
    ///
    /// Returns `(even, odd)` with `self == even + odd`.
    pub fn parity_split(&self, variables: &[Expr]) -> (Expr, Expr) {
        let mut even = Vec::new();
        let mut odd = Vec::new();
        for term in self.expand_terms() {
            match degree_in(&term, variables) {
                Some(d) if d % 2 == 0 => even.push(term),
                Some(_) => odd.push(term),
                None => {
                    let flipped = term.transform(&mut |e| {
                        variables.contains(e).then(|| negate(e.clone()))
                    });
                    let half = Expr::Rational(1, 2);
                    even.push(Expr::product([
                        half.clone(),
                        Expr::sum([term.clone(), flipped.clone()]),
                    ]));
                    odd.push(Expr::product([half, Expr::sum([term, negate(flipped)])]));
                }
            }
        }
        (Expr::sum(even), Expr::sum(odd))
    }
}

fn negate(expr: Expr) -> Expr {
    -expr
}

/// Every product of one term from each group, negations pulled outward.
fn cartesian_products(groups: &[Vec<Expr>]) -> Vec<Expr> {
    let mut combos: Vec<Vec<Expr>> = vec![Vec::new()];
    for group in groups {
        combos = combos
            .into_iter()
            .flat_map(|prefix| {
                group.iter().map(move |term| {
                    let mut combo = prefix.clone();
                    combo.push(term.clone());
                    combo
                })
            })
            .collect();
    }
    combos
        .into_iter()
        .map(|factors| {
            let mut negative = false;
            let stripped: Vec<Expr> = factors
                .into_iter()
                .map(|f| match f {
                    Expr::Neg(inner) => {
                        negative = !negative;
                        *inner
                    }
                    other => other,
                })
                .collect();
            let product = Expr::product(stripped);
            if negative {
                negate(product)
            } else {
                product
            }
        })
        .collect()
}

/// Polynomial degree of a product term in `variables`; `None` when a
/// variable occurs in a non-polynomial position.
fn degree_in(term: &Expr, variables: &[Expr]) -> Option<u32> {
    if variables.contains(term) {
        return Some(1);
    }
    match term {
        Expr::Mul(factors) => factors.iter().try_fold(0, |acc, f| Some(acc + degree_in(f, variables)?)),
        Expr::Neg(inner) => degree_in(inner, variables),
        Expr::Pow(base, exp) => {
            let base_degree = degree_in(base, variables)?;
            if base_degree == 0 {
                return (!contains_any(exp, variables)).then_some(0);
            }
            match exp.as_ref() {
                Expr::Integer(n) if *n >= 0 => Some(base_degree * (*n as u32)),
                _ => None,
            }
        }
        other if contains_any(other, variables) => None,
        _ => Some(0),
    }
}

fn contains_any(expr: &Expr, variables: &[Expr]) -> bool {
    let mut found = false;
    expr.visit(&mut |e| {
        if variables.contains(e) {
            found = true;
        }
    });
    found
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", CPrinter::new().print(self))
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Integer(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Integer(value as i64)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Float(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Symbol(symbol)
    }
}

impl From<FieldAccess> for Expr {
    fn from(access: FieldAccess) -> Self {
        Expr::Access(access)
    }
}

impl<T: Into<Expr>> Add<T> for Expr {
    type Output = Expr;

    fn add(self, rhs: T) -> Expr {
        Expr::sum([self, rhs.into()])
    }
}

impl<T: Into<Expr>> Sub<T> for Expr {
    type Output = Expr;

    fn sub(self, rhs: T) -> Expr {
        Expr::sum([self, -rhs.into()])
    }
}

impl<T: Into<Expr>> Mul<T> for Expr {
    type Output = Expr;

    fn mul(self, rhs: T) -> Expr {
        Expr::product([self, rhs.into()])
    }
}

impl<T: Into<Expr>> Div<T> for Expr {
    type Output = Expr;

    fn div(self, rhs: T) -> Expr {
        let reciprocal = match rhs.into() {
            Expr::Integer(n) => Expr::rational(1, n),
            Expr::Rational(p, q) => Expr::rational(q, p),
            other => Expr::Pow(Box::new(other), Box::new(Expr::Integer(-1))),
        };
        Expr::product([self, reciprocal])
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        match self {
            Expr::Neg(inner) => *inner,
            Expr::Integer(n) => Expr::Integer(-n),
            Expr::Rational(p, q) => Expr::Rational(-p, q),
            Expr::Float(v) => Expr::Float(-v),
            other => Expr::Neg(Box::new(other)),
        }
    }
}

/// A single update `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Target: a field access or a symbol.
    pub lhs: Expr,
    /// Value.
    pub rhs: Expr,
}

impl Assignment {
    /// Create an assignment.
    pub fn new(lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self {
            lhs: lhs.into(),
            rhs: rhs.into(),
        }
    }

    /// Field accesses read by the right-hand side.
    pub fn reads(&self) -> BTreeSet<FieldAccess> {
        self.rhs.field_accesses()
    }

    /// Field accesses written by the left-hand side.
    pub fn writes(&self) -> BTreeSet<FieldAccess> {
        self.lhs.field_accesses()
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, Field};

    fn x() -> Expr {
        Expr::symbol("x")
    }

    fn y() -> Expr {
        Expr::symbol("y")
    }

    fn values(e: &Expr) -> Option<f64> {
        match e {
            Expr::Symbol(s) if s.name == "x" => Some(3.0),
            Expr::Symbol(s) if s.name == "y" => Some(-2.0),
            _ => None,
        }
    }

    #[test]
    fn test_flattening() {
        let e = x() + y() + Expr::int(1);
        assert!(matches!(&e, Expr::Add(terms) if terms.len() == 3));
        let e = x() * y() * x();
        assert!(matches!(&e, Expr::Mul(factors) if factors.len() == 3));
    }

    #[test]
    fn test_rational_normalization() {
        assert_eq!(Expr::rational(2, 4), Expr::Rational(1, 2));
        assert_eq!(Expr::rational(3, -9), Expr::Rational(-1, 3));
        assert_eq!(Expr::rational(4, 2), Expr::Integer(2));
        assert_eq!(x() / 2, Expr::Mul(vec![x(), Expr::Rational(1, 2)]));
    }

    #[test]
    fn test_evaluate() {
        let e = (x() + y()) * x() - y() / x();
        let v = e.evaluate(&mut values).unwrap();
        assert!((v - (3.0 + 2.0 / 3.0)).abs() < 1e-12);
        let unknown = Expr::symbol("z") + x();
        assert_eq!(unknown.evaluate(&mut values), None);
        let call = Expr::call("sqrt", vec![Expr::int(16)]);
        assert_eq!(call.evaluate(&mut values), Some(4.0));
    }

    #[test]
    fn test_substitute_is_pure() {
        let e = x() * y();
        let replaced = e.substitute(&x(), &Expr::int(5));
        assert_eq!(replaced, Expr::Mul(vec![Expr::int(5), y()]));
        assert_eq!(e, x() * y());
    }

    #[test]
    fn test_expand_preserves_value() {
        let e = (x() + Expr::int(1)) * (y() - Expr::int(2)) - (x() - y()).pow(2);
        let expanded = e.expand();
        assert!(matches!(&expanded, Expr::Add(_)));
        let a = e.evaluate(&mut values).unwrap();
        let b = expanded.evaluate(&mut values).unwrap();
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_parity_split() {
        // 1 + x + x*y + x^2 with respect to x
        let e = Expr::int(1) + x() + x() * y() + x().pow(2);
        let (even, odd) = e.parity_split(&[x()]);
        let ev = even.evaluate(&mut values).unwrap();
        let od = odd.evaluate(&mut values).unwrap();
        assert!((ev - 10.0).abs() < 1e-12);
        assert!((od - (3.0 - 6.0)).abs() < 1e-12);
    }

    #[test]
    fn test_parity_split_non_polynomial() {
        let e = Expr::call("exp", vec![x()]);
        let (even, odd) = e.parity_split(&[x()]);
        let ev = even.evaluate(&mut values).unwrap();
        let od = odd.evaluate(&mut values).unwrap();
        assert!((ev - 3.0f64.cosh()).abs() < 1e-9);
        assert!((od - 3.0f64.sinh()).abs() < 1e-9);
    }

    #[test]
    fn test_assignment_reads_writes() {
        let src = Field::new("src", 2, ScalarType::F64).with_index_shape([9]);
        let dst = Field::new("dst", 2, ScalarType::F64).with_index_shape([9]);
        let a = Assignment::new(
            dst.center([1]),
            Expr::from(src.access(Direction::from([0, -1]), [1])) * Expr::float(0.5),
        );
        assert_eq!(a.writes().len(), 1);
        let reads: Vec<_> = a.reads().into_iter().collect();
        assert_eq!(reads[0].offset, Direction::from([0, -1]));
        assert_eq!(a.writes().into_iter().next().unwrap().field_name(), "dst");
    }

    #[test]
    fn test_symbols_and_accesses() {
        let f = Field::new("f", 3, ScalarType::F64);
        let e = x() * Expr::from(f.center(vec![])) + Expr::indexed("u", 0);
        let names: Vec<String> = e.symbols().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["x"]);
        assert_eq!(e.field_accesses().len(), 1);
    }
}
