use crate::bbox::BBox;

/// Candidate boxes on concentric rings around `bb`, the centre sample
/// first. Used when updating the learner.
pub fn radial_samples(bb: &BBox, radius: f32, rings: usize, segments: usize) -> Vec<BBox> {
    let mut out = Vec::with_capacity(1 + rings * segments);
    out.push(*bb);

    let step_r = radius / rings as f32;
    let step_t = 2.0 * std::f32::consts::PI / segments as f32;

    for ring in 1..=rings {
        let r = ring as f32 * step_r;
        for seg in 0..segments {
            let t = seg as f32 * step_t;
            out.push(bb.translated(r * t.cos(), r * t.sin()));
        }
    }
    out
}

/// Candidate boxes at every integer translation within `radius`, the
/// centre sample first. Used when scoring a new frame.
pub fn pixel_samples(bb: &BBox, radius: f32) -> Vec<BBox> {
    let r = radius.floor() as i32;
    let r2 = radius * radius;
    let mut out = Vec::new();
    out.push(*bb);

    for dy in -r..=r {
        for dx in -r..=r {
            if dx == 0 && dy == 0 {
                continue;
            }
            if (dx * dx + dy * dy) as f32 > r2 {
                continue;
            }
            out.push(bb.translated(dx as f32, dy as f32));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radial_samples_start_at_centre() {
        let bb = BBox::new(10.0, 10.0, 8.0, 8.0);
        let samples = radial_samples(&bb, 30.0, 5, 16);
        assert_eq!(samples.len(), 81);
        assert_eq!(samples[0], bb);
    }

    #[test]
    fn radial_samples_stay_within_radius() {
        let bb = BBox::new(0.0, 0.0, 8.0, 8.0);
        for s in radial_samples(&bb, 20.0, 5, 16) {
            assert!(s.relative_to(&bb).translation_len() <= 20.0 + 1e-4);
        }
    }

    #[test]
    fn pixel_samples_form_a_disc() {
        let bb = BBox::new(0.0, 0.0, 4.0, 4.0);
        let samples = pixel_samples(&bb, 2.0);
        assert_eq!(samples[0], bb);
        // centre + 12 offsets with dx^2 + dy^2 <= 4
        assert_eq!(samples.len(), 13);
        for s in &samples {
            assert!(s.relative_to(&bb).translation_len() <= 2.0);
        }
    }
}
