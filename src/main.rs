//! gamepilot CLI - desktop testing entry point
//!
//! Runs the perception-decision pipeline against saved screenshots without an
//! emulator attached. Pass one or more PNG paths to see how each frame would
//! be classified and what the pilot would do.

use gamepilot::config::PilotConfig;
use gamepilot::vision::{Frame, TemplateLibrary};
use gamepilot::Pilot;

fn main() {
    env_logger::init();

    println!("gamepilot - heuristic screen automation");
    println!("=======================================");
    println!();

    let config = PilotConfig::default();
    let paths: Vec<String> = std::env::args().skip(1).collect();

    if paths.is_empty() {
        println!("Usage: pilot <screenshot.png> [more.png ...]");
        println!();
        println!("Current configuration:");
        println!(
            "  - Classification rules: {}",
            config.classifier.rules.len()
        );
        println!(
            "  - Segmentation bands: {:?}",
            config
                .locator
                .segment_bands
                .iter()
                .map(|b| b.tag.as_str())
                .collect::<Vec<_>>()
        );
        println!(
            "  - Template threshold: {:.2}",
            config.locator.template.score_threshold
        );
        println!("  - Fallback policy: {:?}", config.decision.fallback);
        return;
    }

    let pilot = Pilot::new(&config, TemplateLibrary::new());

    for path in paths {
        println!("{path}:");
        let image = match image::open(&path) {
            Ok(image) => image,
            Err(e) => {
                eprintln!("  failed to open: {e}");
                continue;
            }
        };

        let frame = Frame::new(image.to_rgba8());
        let observation = pilot.process_frame(&frame);

        println!(
            "  state: {:?} ({:?})",
            observation.classification.state, observation.classification.confidence
        );
        for (name, count) in &observation.classification.report.band_pixels {
            println!("    {name}: {count}");
        }
        println!(
            "    circles: {}",
            observation.classification.report.circles
        );

        let (color, template, edge) = observation.candidates.counts();
        println!("  candidates: {color} color, {template} template, {edge} edge");
        println!(
            "  decision: {:?} (tier {}, {})",
            observation.decision.action, observation.decision.tier, observation.decision.rationale
        );
        println!();
    }
}
