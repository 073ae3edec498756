//! Integration tests for the direction algebra against the builtin stencils.

use std::collections::BTreeSet;

use haloforge_ir::{comm_directions, Direction, Expr, Field, ScalarType, Stencil};

#[test]
fn test_every_stencil_direction_fans_out_inside_the_neighborhood() {
    for stencil in [Stencil::d2q9(), Stencil::d3q19(), Stencil::d3q27()] {
        let neighborhood: BTreeSet<Direction> =
            Stencil::full_neighborhood(stencil.dim()).iter().cloned().collect();
        for d in &stencil {
            let dirs = comm_directions(d).unwrap();
            if d.is_zero() {
                assert_eq!(dirs, vec![d.clone()]);
                continue;
            }
            for c in &dirs {
                assert!(neighborhood.contains(c), "{} not in neighborhood", c);
                assert!(!c.is_zero());
            }
            // Fan-out of an inverse is the inverse of the fan-out.
            let inverse: BTreeSet<Direction> =
                comm_directions(&d.inverse()).unwrap().into_iter().collect();
            let mirrored: BTreeSet<Direction> = dirs.iter().map(Direction::inverse).collect();
            assert_eq!(inverse, mirrored);
        }
    }
}

#[test]
fn test_corner_fan_out_order() {
    let names: Vec<String> = comm_directions(&Direction::from([1, 1, 1]))
        .unwrap()
        .iter()
        .map(Direction::name)
        .collect();
    assert_eq!(names, ["T", "N", "TN", "E", "TE", "NE", "TNE"]);
}

#[test]
fn test_inverse_index_is_involution() {
    for stencil in [
        Stencil::d2q9(),
        Stencil::d3q7(),
        Stencil::d3q15(),
        Stencil::d3q19(),
        Stencil::d3q27(),
    ] {
        for i in 0..stencil.len() {
            let inv = stencil.inverse_index(i).unwrap();
            assert_eq!(stencil.inverse_index(inv), Some(i));
        }
    }
}

#[test]
fn test_streaming_expression_accesses() {
    let stencil = Stencil::d2q9();
    let src = Field::new("src", 2, ScalarType::F64).with_index_shape([9]);
    let sum = Expr::sum(
        stencil
            .iter()
            .enumerate()
            .map(|(i, d)| Expr::from(src.access(d.inverse(), [i]))),
    );
    let accesses = sum.field_accesses();
    assert_eq!(accesses.len(), 9);
    assert!(accesses.iter().all(|fa| fa.offset.is_first_neighborhood()));
}
