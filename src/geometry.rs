//! Geometric value types shared by discovery, layout, and animation.

use serde::{Deserialize, Serialize};

/// A point in 2D space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self { Self { x, y } }
}

/// A rectangle defined by origin point and size.
///
/// Coordinates follow the window server convention: the origin is the
/// top-left corner and `y` grows downward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// X coordinate of the origin (top-left corner).
    pub x: f64,
    /// Y coordinate of the origin (top-left corner).
    pub y: f64,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
}

impl Rect {
    /// Creates a new rectangle.
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Returns the center point of the rectangle.
    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Returns whether a point is inside the rectangle.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    /// Returns whether two rectangles overlap.
    ///
    /// Touching edges do not count as an intersection; a window parked
    /// exactly against a screen edge belongs to the neighbouring display.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Returns the rectangle shrunk by `amount` on each side.
    #[must_use]
    pub fn inset(&self, amount: f64) -> Self {
        Self {
            x: self.x + amount,
            y: self.y + amount,
            width: (self.width - amount * 2.0).max(0.0),
            height: (self.height - amount * 2.0).max(0.0),
        }
    }

    /// Returns the rectangle with every component rounded to integer points.
    #[must_use]
    pub fn rounded(&self) -> Self {
        Self {
            x: self.x.round(),
            y: self.y.round(),
            width: self.width.round(),
            height: self.height.round(),
        }
    }

    /// Returns whether every component differs by less than `tolerance`.
    #[must_use]
    pub fn approx_eq(&self, other: &Self, tolerance: f64) -> bool {
        (self.x - other.x).abs() < tolerance
            && (self.y - other.y).abs() < tolerance
            && (self.width - other.width).abs() < tolerance
            && (self.height - other.height).abs() < tolerance
    }

    /// Returns the largest component-wise distance to `other`, considering
    /// both origin and size.
    #[must_use]
    pub fn chebyshev_distance(&self, other: &Self) -> f64 {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        let dw = (self.width - other.width).abs();
        let dh = (self.height - other.height).abs();
        dx.max(dy).max(dw).max(dh)
    }

    /// Returns the area of the rectangle.
    #[must_use]
    pub fn area(&self) -> f64 { self.width * self.height }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_new() {
        let p = Point::new(10.0, 20.0);
        assert!((p.x - 10.0).abs() < f64::EPSILON);
        assert!((p.y - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_center() {
        let r = Rect::new(0.0, 0.0, 100.0, 200.0);
        let center = r.center();
        assert!((center.x - 50.0).abs() < f64::EPSILON);
        assert!((center.y - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_contains() {
        let r = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert!(r.contains(Point::new(50.0, 50.0)));
        assert!(r.contains(Point::new(0.0, 0.0)));
        assert!(r.contains(Point::new(100.0, 100.0)));
        assert!(!r.contains(Point::new(-1.0, 50.0)));
        assert!(!r.contains(Point::new(101.0, 50.0)));
    }

    #[test]
    fn test_rect_intersects_overlapping() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 50.0, 100.0, 100.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
    }

    #[test]
    fn test_rect_intersects_disjoint() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(200.0, 0.0, 100.0, 100.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_rect_intersects_touching_edges_do_not_count() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(100.0, 0.0, 100.0, 100.0);
        assert!(!a.intersects(&b));
    }

    #[test]
    fn test_rect_inset() {
        let r = Rect::new(0.0, 0.0, 1440.0, 900.0).inset(12.0);
        assert!((r.x - 12.0).abs() < f64::EPSILON);
        assert!((r.y - 12.0).abs() < f64::EPSILON);
        assert!((r.width - 1416.0).abs() < f64::EPSILON);
        assert!((r.height - 876.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_inset_never_negative() {
        let r = Rect::new(0.0, 0.0, 10.0, 10.0).inset(12.0);
        assert!((r.width - 0.0).abs() < f64::EPSILON);
        assert!((r.height - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_rounded() {
        let r = Rect::new(100.3, 100.7, 400.1, 399.5).rounded();
        assert_eq!(r, Rect::new(100.0, 101.0, 400.0, 400.0));
    }

    #[test]
    fn test_rect_approx_eq() {
        let a = Rect::new(100.0, 100.0, 400.0, 400.0);
        let b = Rect::new(100.3, 100.7, 400.1, 400.2);
        assert!(a.approx_eq(&b, 1.0));
        assert!(!a.approx_eq(&b, 0.5));
    }

    #[test]
    fn test_rect_chebyshev_distance() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(3.0, 1.0, 98.0, 105.0);
        assert!((a.chebyshev_distance(&b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_area() {
        let r = Rect::new(0.0, 0.0, 100.0, 200.0);
        assert!((r.area() - 20000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rect_serialization_round_trip() {
        let r = Rect::new(12.0, 12.0, 708.0, 876.0);
        let json = serde_json::to_string(&r).unwrap();
        let back: Rect = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
