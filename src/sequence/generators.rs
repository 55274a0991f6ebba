//! Segment constructors.
//!
//! Every function here is pure: the same parameters always expand into the
//! same tree, and composite patterns come back as [`Segment::List`].

use super::{FadeDirection, Segment};
use crate::{constants::MESSAGE_FADE_SECS, landmarks::Point2D, utils::grid_fraction};

#[must_use]
pub const fn wait(duration: f64) -> Segment {
    Segment::Wait { duration }
}

#[must_use]
pub const fn pulse(x: f64, y: f64, duration: f64) -> Segment {
    Segment::Pulse { x, y, duration }
}

#[must_use]
pub const fn fade_in(x: f64, y: f64, duration: f64) -> Segment {
    Segment::Fade {
        x,
        y,
        duration,
        direction: FadeDirection::In,
    }
}

#[must_use]
pub const fn fade_out(x: f64, y: f64, duration: f64) -> Segment {
    Segment::Fade {
        x,
        y,
        duration,
        direction: FadeDirection::Out,
    }
}

#[must_use]
pub const fn sweep(start: Point2D, end: Point2D, duration: f64) -> Segment {
    Segment::Move { start, end, duration }
}

/// Text held for `time` seconds with a fade at either end
#[must_use]
pub fn message(text: &str, time: f64, show_elapsed: bool) -> Segment {
    Segment::Message {
        text: text.to_string(),
        duration: time + 2.0 * MESSAGE_FADE_SECS,
        show_elapsed,
    }
}

/// `size²` pulses of `time` seconds, row by row across the unit square
#[must_use]
pub fn grid(size: usize, time: f64) -> Segment {
    let mut children = Vec::with_capacity(size * size);
    for row in 0..size {
        let y = grid_fraction(row, size);
        for col in 0..size {
            children.push(pulse(grid_fraction(col, size), y, time));
        }
    }
    Segment::list(children)
}

/// One horizontal sweep per row: fade in at the left edge, sweep to the
/// right over `scan_time`, pulse, fade out.
#[must_use]
pub fn scan_x(size: usize, scan_time: f64, pulse_time: f64) -> Segment {
    let children = (0..size)
        .flat_map(|row| {
            let y = grid_fraction(row, size);
            scan_line(Point2D::new(0.0, y), Point2D::new(1.0, y), scan_time, pulse_time)
        })
        .collect();
    Segment::list(children)
}

/// One vertical sweep per column, top to bottom
#[must_use]
pub fn scan_y(size: usize, scan_time: f64, pulse_time: f64) -> Segment {
    let children = (0..size)
        .flat_map(|col| {
            let x = grid_fraction(col, size);
            scan_line(Point2D::new(x, 0.0), Point2D::new(x, 1.0), scan_time, pulse_time)
        })
        .collect();
    Segment::list(children)
}

fn scan_line(start: Point2D, end: Point2D, scan_time: f64, pulse_time: f64) -> [Segment; 4] {
    let edge = pulse_time / 2.0;
    [
        fade_in(start.x, start.y, edge),
        sweep(start, end, scan_time),
        pulse(end.x, end.y, pulse_time),
        fade_out(end.x, end.y, edge),
    ]
}

/// Left-to-right rows joined by diagonal returns.
///
/// Each row pulses at every grid column with short sweeps in between. The
/// diagonal back to the next row start is stretched by its extra length.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Grid sizes are tiny
pub fn zigzag(size: usize, scan_time: f64, pulse_time: f64) -> Segment {
    let edge = pulse_time / 2.0;
    let step_time = if size > 1 { scan_time / (size - 1) as f64 } else { scan_time };
    let diagonal_time = scan_time * (1.0 + (1.0 / size.max(1) as f64).powi(2)).sqrt();
    let at = |col: usize, row: usize| Point2D::new(grid_fraction(col, size), grid_fraction(row, size));

    let mut children = vec![fade_in(at(0, 0).x, at(0, 0).y, edge)];
    for row in 0..size {
        let start = at(0, row);
        children.push(pulse(start.x, start.y, pulse_time));
        for col in 1..size {
            let from = at(col - 1, row);
            let to = at(col, row);
            children.push(sweep(from, to, step_time));
            children.push(pulse(to.x, to.y, pulse_time));
        }
        if row + 1 < size {
            children.push(sweep(at(size - 1, row), at(0, row + 1), diagonal_time));
        }
    }
    let last = at(size.saturating_sub(1), size.saturating_sub(1));
    children.push(fade_out(last.x, last.y, edge));
    Segment::list(children)
}
