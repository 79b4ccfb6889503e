//! Frame enumeration, sampling, and interpolation.
//!
//! Pure functions: everything here is testable without I/O.

use veri_models::{FrameClass, FrameRef};

/// Screening window cap: one frame per second, at most five minutes worth.
pub const MAX_FRAMES: usize = 300;

/// Upper bound on frames sent to the authenticity provider per asset.
pub const MAX_AUTH_SAMPLES: usize = 30;

/// The safety classifier sees every Nth frame.
pub const SAFETY_STRIDE: usize = 10;

/// Confidence attenuation for frames extrapolated from a single neighbor.
pub const EDGE_DECAY: f64 = 0.9;

/// One frame reference per second of duration, capped at `MAX_FRAMES`.
pub fn enumerate_frames(playback_id: &str, duration_secs: f64, url_base: &str) -> Vec<FrameRef> {
    let count = (duration_secs.max(0.0).ceil() as usize).min(MAX_FRAMES);
    (0..count)
        .map(|i| {
            FrameRef::new(
                i,
                format!("{url_base}/{playback_id}/thumbnail.jpg?time={i}"),
            )
        })
        .collect()
}

/// Evenly spaced sample of at most `max_samples` indices out of `total`.
pub fn sample_indices(total: usize, max_samples: usize) -> Vec<usize> {
    if total == 0 || max_samples == 0 {
        return Vec::new();
    }
    if total <= max_samples {
        return (0..total).collect();
    }

    let step = total as f64 / max_samples as f64;
    (0..max_samples)
        .map(|k| (((k as f64 + 0.5) * step) as usize).min(total - 1))
        .collect()
}

/// Indices the safety classifier samples: every `SAFETY_STRIDE`th frame.
pub fn safety_indices(total: usize) -> Vec<usize> {
    (0..total).step_by(SAFETY_STRIDE).collect()
}

/// Expand a sparse, index-sorted sample set to a classification per frame.
///
/// Frames bracketed by two samples blend confidence linearly and take the
/// nearer sample's boolean (midpoint ties go to the earlier sample). Edge
/// frames with a single bracketing sample reuse its classification with
/// confidence attenuated by `EDGE_DECAY`.
pub fn interpolate(samples: &[(usize, FrameClass)], total: usize) -> Vec<FrameClass> {
    if samples.is_empty() {
        return vec![FrameClass::new(false, 0.0); total];
    }

    let mut out = Vec::with_capacity(total);
    for i in 0..total {
        match samples.binary_search_by_key(&i, |(idx, _)| *idx) {
            Ok(pos) => out.push(samples[pos].1),
            Err(pos) => {
                let prev = pos.checked_sub(1).map(|p| &samples[p]);
                let next = samples.get(pos);
                let class = match (prev, next) {
                    (Some(&(pi, pc)), Some(&(ni, nc))) => {
                        let t = (i - pi) as f64 / (ni - pi) as f64;
                        let confidence = pc.confidence * (1.0 - t) + nc.confidence * t;
                        let is_ai = if i - pi <= ni - i {
                            pc.is_ai_generated
                        } else {
                            nc.is_ai_generated
                        };
                        FrameClass::new(is_ai, confidence)
                    }
                    (Some(&(_, pc)), None) => {
                        FrameClass::new(pc.is_ai_generated, pc.confidence * EDGE_DECAY)
                    }
                    (None, Some(&(_, nc))) => {
                        FrameClass::new(nc.is_ai_generated, nc.confidence * EDGE_DECAY)
                    }
                    (None, None) => unreachable!("samples is non-empty"),
                };
                out.push(class);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_is_min_of_duration_and_cap() {
        for duration in [0u32, 1, 60, 120, 299, 300, 301, 7200] {
            let frames = enumerate_frames("play_1", duration as f64, "https://f.example");
            assert_eq!(frames.len(), (duration as usize).min(300), "duration {duration}");
        }
    }

    #[test]
    fn frame_urls_index_into_playback() {
        let frames = enumerate_frames("play_1", 3.0, "https://f.example");
        assert_eq!(frames[2].url, "https://f.example/play_1/thumbnail.jpg?time=2");
        assert_eq!(frames[2].index, 2);
    }

    #[test]
    fn sample_indices_bounded_and_increasing() {
        let indices = sample_indices(300, 30);
        assert_eq!(indices.len(), 30);
        assert!(indices.windows(2).all(|w| w[0] < w[1]));
        assert!(*indices.last().unwrap() < 300);
    }

    #[test]
    fn small_inputs_are_sampled_fully() {
        assert_eq!(sample_indices(5, 30), vec![0, 1, 2, 3, 4]);
        assert!(sample_indices(0, 30).is_empty());
    }

    #[test]
    fn safety_indices_take_every_tenth() {
        assert_eq!(safety_indices(25), vec![0, 10, 20]);
        assert_eq!(safety_indices(1), vec![0]);
    }

    #[test]
    fn interpolated_confidence_blends_between_brackets() {
        let samples = vec![
            (0, FrameClass::new(true, 1.0)),
            (4, FrameClass::new(false, 0.0)),
        ];
        let full = interpolate(&samples, 5);

        assert_eq!(full.len(), 5);
        assert_eq!(full[0].confidence, 1.0);
        assert!((full[1].confidence - 0.75).abs() < 1e-9);
        assert!((full[2].confidence - 0.5).abs() < 1e-9);
        assert!((full[3].confidence - 0.25).abs() < 1e-9);
        assert_eq!(full[4].confidence, 0.0);

        // nearer sample decides the boolean; the midpoint goes to the earlier one
        assert!(full[1].is_ai_generated);
        assert!(full[2].is_ai_generated);
        assert!(!full[3].is_ai_generated);
    }

    #[test]
    fn interpolated_confidence_stays_in_unit_interval() {
        let samples = vec![
            (2, FrameClass::new(true, 0.9)),
            (7, FrameClass::new(true, 0.6)),
            (13, FrameClass::new(false, 0.8)),
        ];
        for class in interpolate(&samples, 16) {
            assert!((0.0..=1.0).contains(&class.confidence));
        }
    }

    #[test]
    fn edge_frames_decay_from_single_neighbor() {
        let samples = vec![(2, FrameClass::new(true, 0.8))];
        let full = interpolate(&samples, 5);

        // frames before the only sample
        assert!(full[0].is_ai_generated);
        assert!((full[0].confidence - 0.72).abs() < 1e-9);
        assert!((full[1].confidence - 0.72).abs() < 1e-9);
        // the sample itself is untouched
        assert_eq!(full[2].confidence, 0.8);
        // frames after it
        assert!((full[4].confidence - 0.72).abs() < 1e-9);
    }

    #[test]
    fn empty_sample_set_yields_neutral_frames() {
        let full = interpolate(&[], 3);
        assert_eq!(full.len(), 3);
        assert!(full.iter().all(|c| !c.is_ai_generated && c.confidence == 0.0));
    }
}
