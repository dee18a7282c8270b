//! Per-font space-width estimation

/// Guess used when a font offers no calibration glyphs
pub(crate) const DEFAULT_SPACE_WIDTH: f64 = 280.0;

const MIN_SPACE_WIDTH: f64 = 200.0;
const MAX_SPACE_WIDTH: f64 = 1000.0;

const BIAS_SLOPE: f64 = 1.366239;
const BIAS_INTERCEPT: f64 = -139.183703;

/// Reference glyphs with `(intercept, slope)` fits of space width against
/// glyph width, in thousandths of text space
const CALIBRATION: &[(char, f64, f64)] = &[
    ('a', 139.0, 0.25),
    ('e', 139.0, 0.25),
    ('s', 152.0, 0.252),
    ('n', 0.0, 0.5),
    ('o', 0.0, 0.5),
    ('h', 0.0, 0.5),
    ('0', 0.0, 0.5),
    ('1', 0.0, 0.5),
    ('2', 0.0, 0.5),
    ('5', 0.0, 0.5),
];

/// Estimate a font's space width from its `(character, glyph width)` metrics.
///
/// Every calibration glyph with a positive width contributes one guess; the
/// median of those guesses and [`DEFAULT_SPACE_WIDTH`] is bias-corrected and
/// clamped to `[200, 1000]`.
pub(crate) fn estimate_space_width<I>(metrics: I) -> f64
where
    I: IntoIterator<Item = (char, f64)>,
{
    let mut guesses = vec![DEFAULT_SPACE_WIDTH];
    for (ch, width) in metrics {
        if width <= 0.0 || !width.is_finite() {
            continue;
        }
        if let Some((_, intercept, slope)) = CALIBRATION.iter().find(|(c, _, _)| *c == ch) {
            guesses.push(intercept + slope * width);
        }
    }

    let corrected = BIAS_SLOPE * median(&mut guesses) + BIAS_INTERCEPT;
    corrected.clamp(MIN_SPACE_WIDTH, MAX_SPACE_WIDTH)
}

/// Median of a non-empty sample; even counts average the two middle values
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
