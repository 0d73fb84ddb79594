use strack::analyze::{calculate_ious, load_boxes, report};

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let (results_path, gt_path) = match (args.next(), args.next()) {
        (Some(r), Some(g)) => (r, g),
        _ => anyhow::bail!("usage: analyze <results.csv> <ground_truth.csv>"),
    };

    let results = load_boxes(&results_path)?;
    let ground_truth = load_boxes(&gt_path)?;

    if results.len() != ground_truth.len() {
        eprintln!(
            "warning: {} result boxes vs {} ground truth boxes; scoring the first {}",
            results.len(),
            ground_truth.len(),
            results.len().min(ground_truth.len())
        );
    }

    let ious = calculate_ious(&results, &ground_truth);
    println!("{}", report(&ious));
    Ok(())
}
