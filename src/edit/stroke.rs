//! Screen-space polyline math for the stroke gesture.

use glam::DVec2;

/// Minimum pixel spacing between recorded stroke points.
pub const STROKE_POINT_SPACING: f64 = 20.0;

/// How many keys moving away from the stroke end are tolerated before the
/// capture walk gives up.
pub const MAX_SKIPPED: usize = 5;

/// Which way along the key sequence the stroke was drawn.
///
/// Compares the stroke's mean direction against the directions toward the
/// previous and next key on screen; `0` means the stroke runs away from both
/// neighbors and cannot be matched.
#[must_use]
pub fn stroke_direction(
    directional: DVec2,
    keys_screen: &[DVec2],
    selected_index: usize,
) -> i32 {
    if keys_screen.is_empty() || selected_index >= keys_screen.len() {
        return 0;
    }

    let pos = keys_screen[selected_index];
    let pp = if selected_index == 0 {
        DVec2::ZERO
    } else {
        (keys_screen[selected_index - 1] - pos).normalize_or_zero()
    };
    let ap = if selected_index == keys_screen.len() - 1 {
        DVec2::ZERO
    } else {
        (keys_screen[selected_index + 1] - pos).normalize_or_zero()
    };

    let dot1 = pp.dot(directional);
    let dot2 = ap.dot(directional);

    if dot1 == 0.0 && dot2 < 0.0 {
        return 0;
    }
    if dot2 == 0.0 && dot1 < 0.0 {
        return 0;
    }

    if dot1 > dot2 { -1 } else { 1 }
}

/// Closest point to `q` on the stroke polyline.
#[must_use]
pub fn closest_point_on_polyline(points: &[DVec2], q: DVec2) -> DVec2 {
    let Some(&first) = points.first() else {
        return q;
    };

    let mut final_t = 0.0;
    let mut index = 0;

    let mut b = first;
    let mut dbq = b - q;
    let mut dist = dbq.length_squared();

    for (i, &point) in points.iter().enumerate().skip(1) {
        let a = b;
        let daq = dbq;

        b = point;
        dbq = b - q;

        let dab = a - b;
        let sqrlen = dab.length_squared();
        if sqrlen <= f64::EPSILON {
            continue;
        }

        let t = dab.dot(daq) / sqrlen;
        if t < 0.0 {
            continue;
        }

        let current_dist = if t <= 1.0 {
            let cross = dab.x * dbq.y - dab.y * dbq.x;
            cross * cross / sqrlen
        } else {
            dbq.length_squared()
        };

        if current_dist < dist {
            dist = current_dist;
            final_t = t.min(1.0);
            index = i;
        }
    }

    if final_t == 0.0 && index == 0 {
        points[0]
    } else {
        points[index] * final_t + points[index - 1] * (1.0 - final_t)
    }
}

/// Per-segment lengths of the stroke and their sum.
///
/// The final segment is deliberately left out of the sum so spread
/// placement never lands exactly on the stroke end, which is reserved for
/// the last key.
#[must_use]
pub fn segment_lengths(points: &[DVec2]) -> (Vec<f64>, f64) {
    let stroke_num = points.len().saturating_sub(1);
    let mut lengths = vec![0.0; stroke_num];
    let mut total = 0.0;
    for i in 1..stroke_num {
        lengths[i - 1] = (points[i] - points[i - 1]).length();
        total += lengths[i - 1];
    }
    (lengths, total)
}

/// Point at proportional arc length `(i + 1) / point_count` along the
/// stroke; the last key snaps to the stroke end.
#[must_use]
pub fn spread_point_on_polyline(
    points: &[DVec2],
    i: usize,
    point_count: usize,
    stroke_length: f64,
    lengths: &[f64],
) -> DVec2 {
    if i == point_count - 1 {
        return points[points.len() - 1];
    }

    let tl = ((i + 1) as f64 / point_count as f64) * stroke_length;

    let mut segment = 0;
    let mut covered = 0.0;
    for (j, &len) in lengths.iter().enumerate() {
        if tl > covered && tl < covered + len {
            segment = j;
            break;
        }
        covered += len;
    }

    let t = if lengths[segment] > f64::EPSILON {
        (tl - covered) / lengths[segment]
    } else {
        0.0
    };
    points[segment + 1] * t + points[segment] * (1.0 - t)
}
