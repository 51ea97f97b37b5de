//! Pure calculation functions for image dimensions and crop placement.
//!
//! All functions here are pure and testable without any I/O or images.

/// Greatest common divisor (Euclid).
fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

/// Reduce `width:height` to its lowest terms.
///
/// # Examples
/// ```
/// # use adcanvas::imaging::reduce_ratio;
/// assert_eq!(reduce_ratio(1080, 1920), (9, 16));
/// assert_eq!(reduce_ratio(1200, 628), (300, 157));
/// ```
pub fn reduce_ratio(width: u32, height: u32) -> (u32, u32) {
    match gcd(width, height) {
        0 => (0, 0),
        d => (width / d, height / d),
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while maintaining
/// the source aspect ratio. One dimension will match exactly, the other may exceed.
///
/// # Arguments
/// * `source` - Original image dimensions (width, height)
/// * `target` - Target area dimensions (width, height)
///
/// # Returns
/// * `(width, height)` - Fill dimensions (at least one matches target)
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).max(tgt_w);
        (w, h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).max(tgt_h);
        (w, h)
    }
}

/// Calculate dimensions that fit entirely inside a target area (resize before pad).
///
/// The inverse of [`calculate_fill_dimensions`]: one dimension matches the
/// target exactly, the other is smaller or equal. Never returns a zero edge.
pub fn calculate_fit_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: width matches, height shrinks
        let w = tgt_w;
        let h = ((w as f64 / src_aspect).round() as u32).clamp(1, tgt_h);
        (w, h)
    } else {
        // Source is taller: height matches, width shrinks
        let h = tgt_h;
        let w = ((h as f64 * src_aspect).round() as u32).clamp(1, tgt_w);
        (w, h)
    }
}

/// Offset that centres `inner` within `outer` (rounded down).
pub fn centered_offset(outer: u32, inner: u32) -> u32 {
    outer.saturating_sub(inner) / 2
}

/// Choose where a crop window of `window` cells should start along one axis.
///
/// `profile[i]` is the visual energy (edge density) of row or column `i`.
/// Returns the start offset whose window has the highest total energy. When
/// several windows tie, the one closest to centre wins, so a flat image
/// degrades to a plain centre crop.
///
/// # Examples
/// ```
/// # use adcanvas::imaging::best_window_offset;
/// // All energy sits on the right edge
/// assert_eq!(best_window_offset(&[0, 0, 0, 0, 9, 9], 2), 4);
/// // Flat profile → centre
/// assert_eq!(best_window_offset(&[1, 1, 1, 1, 1, 1], 2), 2);
/// ```
pub fn best_window_offset(profile: &[u64], window: usize) -> usize {
    if window == 0 || window >= profile.len() {
        return 0;
    }
    let last = profile.len() - window;
    let center = last / 2;

    let mut sum: u64 = profile[..window].iter().sum();
    let mut best = (sum, 0usize);

    for start in 1..=last {
        sum = sum - profile[start - 1] + profile[start + window - 1];
        let closer = start.abs_diff(center) < best.1.abs_diff(center);
        if sum > best.0 || (sum == best.0 && closer) {
            best = (sum, start);
        }
    }

    best.1
}

/// Render safe-zone margins as a short human description for prompts.
pub fn describe_margins(top: u32, bottom: u32, left: u32, right: u32) -> String {
    if top == 0 && bottom == 0 && left == 0 && right == 0 {
        return "the full frame".to_string();
    }
    format!("{top}px from the top, {bottom}px from the bottom, {left}px from the left and {right}px from the right")
}
