//! Easing curves mapping normalized progress `[0, 1]` onto `[0, 1]`.

/// Shape of a tween's rate of change.
pub type Ease = fn(f64) -> f64;

pub fn linear(t: f64) -> f64 {
    t
}

/// Cubic ease-in for the first half, cubic ease-out for the second.
pub fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        (t - 1.0) * (2.0 * t - 2.0) * (2.0 * t - 2.0) + 1.0
    }
}
