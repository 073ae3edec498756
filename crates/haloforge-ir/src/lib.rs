//! haloforge symbolic layer
//!
//! Typed fields, relative field accesses, lattice stencils, the direction
//! algebra used to derive ghost-layer communication, and an immutable
//! expression tree with a C printer.
//!
//! # Architecture
//!
//! ```text
//! Field / Stencil / Direction → Expr + Assignment → CPrinter → C/C++/CUDA text
//! ```
//!
//! # Example
//!
//! ```
//! use haloforge_ir::{comm_directions, Direction, Expr, Field, ScalarType};
//!
//! let pdfs = Field::new("pdfs", 3, ScalarType::F64).with_index_shape([19]);
//! let east = pdfs.access(Direction::from([1, 0, 0]), [4]);
//! assert_eq!(east.to_string(), "pdfs_E^4");
//!
//! // A diagonal read must travel through two faces and one edge.
//! let dirs = comm_directions(&Direction::from([1, 1, 0])).unwrap();
//! assert_eq!(dirs.len(), 3);
//!
//! let e = Expr::from(east) * Expr::rational(1, 2);
//! assert_eq!(e.field_accesses().len(), 1);
//! ```

#![warn(missing_docs)]

mod direction;
mod error;
mod expr;
mod field;
mod printer;
mod stencil;
mod types;

pub use direction::{comm_directions, direction_name, Direction};
pub use error::{IrError, IrResult};
pub use expr::{Assignment, Expr, Symbol};
pub use field::{Field, FieldAccess, FieldKind};
pub use printer::CPrinter;
pub use stencil::Stencil;
pub use types::ScalarType;
