use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;

use strack::analyze::format_box;
use strack::{BBox, Config, Image, Tracker};

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load_from_file(&config_path)?;

    if config.sequence_name.is_empty() {
        anyhow::bail!("no sequence_name in {}", config_path);
    }

    let sequence_dir = PathBuf::from(&config.sequence_base_path).join(&config.sequence_name);

    // frames file: "start,end"
    let frames_text =
        std::fs::read_to_string(sequence_dir.join(format!("{}_frames.txt", config.sequence_name)))?;
    let (start_frame, end_frame) = parse_frame_range(&frames_text)?;

    // first ground truth record is the initial box
    let gt_path = sequence_dir.join(format!("{}_gt.txt", config.sequence_name));
    let ground_truth = strack::analyze::load_boxes(&gt_path)?;
    let init_bb = *ground_truth
        .first()
        .ok_or_else(|| anyhow::anyhow!("empty ground truth file {}", gt_path.display()))?;

    let first = load_frame(&sequence_dir, start_frame)?;
    let scale_w = config.frame_width as f32 / first.width() as f32;
    let scale_h = config.frame_height as f32 / first.height() as f32;
    let init_bb = BBox::new(
        init_bb.x_min * scale_w,
        init_bb.y_min * scale_h,
        init_bb.width * scale_w,
        init_bb.height * scale_h,
    );

    let mut out = if config.results_path.is_empty() {
        None
    } else {
        Some(BufWriter::new(File::create(&config.results_path)?))
    };

    let quiet = config.quiet_mode;
    let debug = config.debug_mode;
    let (frame_w, frame_h) = (config.frame_width as usize, config.frame_height as usize);
    let mut tracker = Tracker::new(config)?;

    for frame_index in start_frame..=end_frame {
        let frame = load_frame(&sequence_dir, frame_index)?.resized(frame_w, frame_h);

        if frame_index == start_frame {
            tracker.init(&frame, init_bb)?;
        } else {
            tracker.track(&frame)?;
        }

        if debug {
            log::debug!(
                "frame {frame_index}: {} support vectors over {} patterns",
                tracker.learner().support_vector_count(),
                tracker.learner().support_pattern_count()
            );
        }

        if let Some(out) = out.as_mut() {
            let bb = tracker.bb();
            let unscaled = BBox::new(
                bb.x_min / scale_w,
                bb.y_min / scale_h,
                bb.width / scale_w,
                bb.height / scale_h,
            );
            writeln!(out, "{}", format_box(&unscaled))?;
        }

        if !quiet {
            print!(".");
            std::io::stdout().flush()?;
        }
    }

    if !quiet {
        println!();
    }
    Ok(())
}

fn parse_frame_range(text: &str) -> Result<(usize, usize), anyhow::Error> {
    let line = text.lines().next().unwrap_or("").trim();
    let (start, end) = line
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("frames file must contain \"start,end\""))?;
    Ok((start.trim().parse()?, end.trim().parse()?))
}

fn load_frame(sequence_dir: &std::path::Path, index: usize) -> Result<Image, anyhow::Error> {
    let path = sequence_dir.join("imgs").join(format!("img{index:05}.pgm"));
    let mut bytes = Vec::new();
    File::open(&path)?.read_to_end(&mut bytes)?;
    parse_pgm(&bytes).map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))
}

/// Minimal binary PGM (P5, 8-bit) reader.
fn parse_pgm(bytes: &[u8]) -> Result<Image, String> {
    let mut pos = 0;

    let mut token = |bytes: &[u8]| -> Result<String, String> {
        // skip whitespace and # comments
        loop {
            while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < bytes.len() && bytes[pos] == b'#' {
                while pos < bytes.len() && bytes[pos] != b'\n' {
                    pos += 1;
                }
            } else {
                break;
            }
        }
        let begin = pos;
        while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if begin == pos {
            return Err("truncated header".to_string());
        }
        Ok(String::from_utf8_lossy(&bytes[begin..pos]).into_owned())
    };

    if token(bytes)? != "P5" {
        return Err("not a binary PGM".to_string());
    }
    let width: usize = token(bytes)?.parse().map_err(|_| "bad width")?;
    let height: usize = token(bytes)?.parse().map_err(|_| "bad height")?;
    let maxval: usize = token(bytes)?.parse().map_err(|_| "bad maxval")?;
    if maxval != 255 {
        return Err(format!("unsupported maxval {maxval}"));
    }

    let data_start = pos + 1; // single whitespace byte after maxval
    let expected = width * height;
    let data = bytes
        .get(data_start..data_start + expected)
        .ok_or("truncated pixel data")?;

    Ok(Image::from_luma8(width, height, data))
}
