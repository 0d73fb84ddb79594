//! Offline scoring of tracking runs against ground truth.
//!
//! Both inputs are CSV files with one `x_min,y_min,width,height` record
//! per frame, the format the track binary writes.

use std::path::Path;

use crate::bbox::BBox;
use crate::error::Error;

/// Intersection over union of two boxes; 0 when they do not intersect
/// or their union has no area.
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    a.overlap(b)
}

/// Parse a CSV box file. Blank lines are skipped.
pub fn load_boxes<P: AsRef<Path>>(path: P) -> Result<Vec<BBox>, Error> {
    let contents = std::fs::read_to_string(path)?;
    parse_boxes(&contents)
}

pub fn parse_boxes(contents: &str) -> Result<Vec<BBox>, Error> {
    let mut boxes = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<f32> = line
            .split(',')
            .map(|f| f.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| Error::MalformedRecord(line.to_string()))?;
        if fields.len() != 4 {
            return Err(Error::MalformedRecord(line.to_string()));
        }
        boxes.push(BBox::new(fields[0], fields[1], fields[2], fields[3]));
    }
    Ok(boxes)
}

/// One IoU per paired record; extra records in the longer list are
/// ignored.
pub fn calculate_ious(results: &[BBox], ground_truth: &[BBox]) -> Vec<f32> {
    results
        .iter()
        .zip(ground_truth.iter())
        .map(|(r, g)| iou(r, g))
        .collect()
}

/// Per-line IoU values followed by a minimum/maximum/average summary.
pub fn report(ious: &[f32]) -> String {
    if ious.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for v in ious {
        out.push_str(&fmt_float(*v));
        out.push('\n');
    }

    let min = ious.iter().copied().fold(f32::INFINITY, f32::min);
    let max = ious.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mean = ious.iter().sum::<f32>() / ious.len() as f32;

    out.push_str(&format!(
        "minimum: {}\nmaximum: {}\naverage: {}",
        fmt_float(min),
        fmt_float(max),
        fmt_float(mean)
    ));
    out
}

/// Render with a trailing `.0` when the value is integral, so a perfect
/// score reads `1.0` rather than `1`.
fn fmt_float(v: f32) -> String {
    if v.is_finite() && v == v.floor() {
        format!("{:.1}", v)
    } else {
        format!("{}", v)
    }
}

/// One CSV record in the on-disk format.
pub fn format_box(bb: &BBox) -> String {
    format!("{},{},{},{}", bb.x_min, bb.y_min, bb.width, bb.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_a_box_with_itself_is_one() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn iou_is_symmetric() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 5.0, 10.0, 10.0);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn disjoint_boxes_score_zero() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn self_comparison_report_is_all_ones() {
        let boxes = "0,0,10,10\n5,5,10,10\n";
        let parsed = parse_boxes(boxes).unwrap();
        let ious = calculate_ious(&parsed, &parsed);
        assert_eq!(
            report(&ious),
            "1.0\n1.0\nminimum: 1.0\nmaximum: 1.0\naverage: 1.0"
        );
    }

    #[test]
    fn report_keeps_fractional_values_verbatim() {
        assert_eq!(report(&[0.15625]), "0.15625\nminimum: 0.15625\nmaximum: 0.15625\naverage: 0.15625");
    }

    #[test]
    fn parse_rejects_short_records() {
        assert!(parse_boxes("1,2,3\n").is_err());
        assert!(parse_boxes("1,2,3,x\n").is_err());
    }

    #[test]
    fn parse_and_format_round_trip() {
        let bb = BBox::new(1.5, 2.0, 10.0, 20.5);
        let parsed = parse_boxes(&format_box(&bb)).unwrap();
        assert_eq!(parsed[0], bb);
    }

    #[test]
    fn mismatched_lengths_use_the_shorter_list() {
        let a = parse_boxes("0,0,10,10\n0,0,10,10\n").unwrap();
        let b = parse_boxes("0,0,10,10\n").unwrap();
        assert_eq!(calculate_ious(&a, &b).len(), 1);
    }
}
