//! Point abstraction shared by every registration routine.

use nalgebra::Vector2;

/// Trait for objects that can be located in a 2D Cartesian coordinate system.
///
/// Point sets handed to the registrar are slices of any type implementing
/// this trait, so detected stars can be registered without copying them
/// into an intermediate representation.
pub trait Locatable2d {
    /// Returns the x-coordinate of the object.
    fn x(&self) -> f64;

    /// Returns the y-coordinate of the object.
    fn y(&self) -> f64;

    /// Position as an nalgebra column vector.
    fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x(), self.y())
    }

    /// Euclidean distance to another locatable object.
    fn distance_to<L: Locatable2d + ?Sized>(&self, other: &L) -> f64 {
        (self.x() - other.x()).hypot(self.y() - other.y())
    }
}

/// Implement Locatable for `nalgebra::Vector2<f64>`
impl Locatable2d for Vector2<f64> {
    fn x(&self) -> f64 {
        self.x
    }

    fn y(&self) -> f64 {
        self.y
    }
}

impl Locatable2d for (f64, f64) {
    fn x(&self) -> f64 {
        self.0
    }

    fn y(&self) -> f64 {
        self.1
    }
}

impl<L: Locatable2d + ?Sized> Locatable2d for &L {
    fn x(&self) -> f64 {
        (**self).x()
    }

    fn y(&self) -> f64 {
        (**self).y()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_tuple_and_vector_agree() {
        let a = (1.0, 2.0);
        let b = Vector2::new(4.0, 6.0);
        assert_relative_eq!(a.distance_to(&b), 5.0, epsilon = 1e-12);
        assert_relative_eq!(b.distance_to(&a), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reference_forwards() {
        let p = (0.5, 1.5);
        let r = &p;
        assert_eq!(r.position(), Vector2::new(0.5, 1.5));
    }
}
