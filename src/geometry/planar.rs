//! Planar predicates and overlay helpers.
//!
//! Thin wrappers over `geo` so the pipeline names the operations it relies on
//! (validity, area, union, intersection, buffered containment) in one place.

use geo::{
    Area, BooleanOps, BoundingRect, Buffer, Intersects, MultiPolygon, Polygon, Relate,
    Validation,
};

/// Whether a polygon is simple, well-formed and has positive area.
pub fn is_valid(polygon: &Polygon<f64>) -> bool {
    polygon.is_valid() && polygon.unsigned_area() > 0.0
}

/// Unsigned area of a polygon.
pub fn area(polygon: &Polygon<f64>) -> f64 {
    polygon.unsigned_area()
}

/// Cheap rejection test on axis-aligned bounding boxes.
pub fn bounds_intersect(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => ra.intersects(&rb),
        _ => false,
    }
}

/// Overlay intersection of two polygons.
///
/// Returns an empty multipolygon when the bounding boxes are disjoint.
pub fn intersection(a: &Polygon<f64>, b: &Polygon<f64>) -> MultiPolygon<f64> {
    if !bounds_intersect(a, b) {
        return MultiPolygon::new(Vec::new());
    }
    a.intersection(b)
}

/// Area shared by two polygons.
pub fn intersection_area(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    intersection(a, b).unsigned_area()
}

/// Area of `polygon` lying outside `cover`.
pub fn uncovered_area(polygon: &Polygon<f64>, cover: &MultiPolygon<f64>) -> f64 {
    MultiPolygon::new(vec![polygon.clone()])
        .difference(cover)
        .unsigned_area()
}

/// Union of a set of polygons.
pub fn union_all<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> MultiPolygon<f64> {
    geo::unary_union(polygons)
}

/// Grow a multipolygon outward by `distance`.
pub fn buffered(geometry: &MultiPolygon<f64>, distance: f64) -> MultiPolygon<f64> {
    geometry.buffer(distance)
}

/// Exact containment: no point of `inner` lies outside `outer`.
pub fn contains(outer: &Polygon<f64>, inner: &Polygon<f64>) -> bool {
    outer.relate(inner).is_contains()
}

/// Containment after growing `outer` by `distance`.
pub fn contains_buffered(outer: &Polygon<f64>, inner: &Polygon<f64>, distance: f64) -> bool {
    outer.buffer(distance).relate(inner).is_contains()
}

/// Whether a multipolygon contains a polygon.
pub fn multi_contains(outer: &MultiPolygon<f64>, inner: &Polygon<f64>) -> bool {
    outer.relate(inner).is_contains()
}
