//! Page geometry: boxes and the transforms between them

use lopdf::Object;
use crate::error::{Error, Result};

/// Boxes closer than this (in points) on every edge are treated as equal.
const BOX_TOLERANCE: f64 = 0.01;

/// A page boundary rectangle `[llx lly urx ury]` in PDF user space
///
/// The coordinate system has origin at bottom-left of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    /// Create a box from its lower-left and upper-right corners
    pub fn new(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self { llx, lly, urx, ury }.normalized()
    }

    /// US Letter size (8.5" × 11") at the origin
    pub fn letter() -> Self {
        Self::new(0.0, 0.0, 612.0, 792.0)
    }

    /// Parse a box from a resolved PDF array of four numbers
    pub fn from_object(object: &Object) -> Result<Self> {
        let values = match object {
            Object::Array(values) if values.len() == 4 => values,
            other => {
                return Err(Error::General(format!(
                    "Page box is not an array of four numbers: {:?}",
                    other
                )))
            }
        };

        let mut coords = [0.0f64; 4];
        for (slot, value) in coords.iter_mut().zip(values) {
            *slot = match value {
                Object::Integer(n) => *n as f64,
                Object::Real(r) => *r as f64,
                other => {
                    return Err(Error::General(format!(
                        "Page box coordinate is not a number: {:?}",
                        other
                    )))
                }
            };
        }

        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }

    /// Serialize back to a PDF array
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            number(self.llx),
            number(self.lly),
            number(self.urx),
            number(self.ury),
        ])
    }

    /// Corners may be given in any order; make lower-left actually lower-left
    fn normalized(self) -> Self {
        Self {
            llx: self.llx.min(self.urx),
            lly: self.lly.min(self.ury),
            urx: self.llx.max(self.urx),
            ury: self.lly.max(self.ury),
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// Check whether two boxes describe the same rectangle
    pub fn approx_eq(&self, other: &PageBox) -> bool {
        (self.llx - other.llx).abs() < BOX_TOLERANCE
            && (self.lly - other.lly).abs() < BOX_TOLERANCE
            && (self.urx - other.urx).abs() < BOX_TOLERANCE
            && (self.ury - other.ury).abs() < BOX_TOLERANCE
    }

    /// Affine matrix `[a b c d e f]` mapping this box exactly onto `target`
    ///
    /// Width and height are scaled independently, so the result covers the
    /// whole target even when the aspect ratios differ slightly.
    pub fn fit_onto(&self, target: &PageBox) -> Transform {
        let sx = if self.width() > 0.0 { target.width() / self.width() } else { 1.0 };
        let sy = if self.height() > 0.0 { target.height() / self.height() } else { 1.0 };

        Transform {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            e: target.llx - self.llx * sx,
            f: target.lly - self.lly * sy,
        }
    }
}

impl std::fmt::Display for PageBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} {} {} {}]", self.llx, self.lly, self.urx, self.ury)
    }
}

/// A PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    /// Identity matrix (no transformation)
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    /// Apply the matrix to a point
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Serialize as a `/Matrix` array
    pub fn to_object(&self) -> Object {
        Object::Array(vec![
            number(self.a),
            number(self.b),
            number(self.c),
            number(self.d),
            number(self.e),
            number(self.f),
        ])
    }
}

/// Integers stay integers so untouched geometry round-trips cleanly
fn number(value: f64) -> Object {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value as f32)
    }
}
