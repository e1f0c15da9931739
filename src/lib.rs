//! **bspline-kernel** is a geometry kernel for B-spline curves and tensor-product surfaces based on
//! [nalgebra].
//!
//! ## Features
//! - [Basis function][basis::Basis] evaluation with derivatives by the Cox–de Boor recursion.
//! - [Curves][curve::Curve] and [surfaces][surface::Surface] with homogeneous control points,
//!   derivatives, isocurves and bounding boxes.
//! - [Knot manipulation][manipulation]
//!   - [knot insertion][manipulation::insert]
//!   - [knot removal][manipulation::remove]
//!   - [splitting][manipulation::split]
//!   - [combination][manipulation::combine]
//!   - [common-knot refinement][manipulation::compatible]
//! - [Interpolation and lofting][fitting::interpolation]
//! - [Constrained least-squares approximation][fitting::approximation], optionally penalized and
//!   guided by curves
//! - [Point inversion and projection][projection] by Newton iterations
//! - [Gordon surfaces][gordon] through curve networks
//!
//! All dense linear systems are delegated to a [`LinearAlgebra`][linalg::LinearAlgebra] backend
//! held by a [`NumericContext`][linalg::NumericContext]. The default backend uses nalgebra's
//! decompositions.
//!
//! The crate logs through the [log] facade and never installs a logger itself.
//!
//! ## Literature:
//! |            |                                                                                                                                    |
//! |-----------:|:-----------------------------------------------------------------------------------------------------------------------------------|
//! | Piegl1997  | Piegl, L., Tiller, W. The NURBS Book. Monographs in Visual Communication. Springer, Berlin, Heidelberg, 2nd ed., 1997.             |
//! | Eilers1996 | Eilers, P. H. C., Marx, B. D., Flexible smoothing with B -splines and penalties, Stat. Sci., 11(2) (1996) 89–121.                  |

pub mod basis;
pub mod curve;
pub mod diagnostics;
pub mod fitting;
pub mod gordon;
pub mod linalg;
pub mod manipulation;
pub mod projection;
pub mod surface;
pub mod types;
