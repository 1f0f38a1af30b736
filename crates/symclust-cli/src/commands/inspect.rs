use crate::cli::InspectArgs;
use crate::error::Result;
use crate::input;
use symclust::core::models::ensemble::FrameStore;
use symclust::core::models::selection::SelectionQuery;
use symclust::engine::selection_index::SelectionIndex;
use tracing::info;

pub fn run(args: InspectArgs) -> Result<()> {
    let ensemble = input::load_ensemble(&args.ensemble)?;
    let topology = ensemble.topology();

    let index = SelectionIndex::build(topology, &[SelectionQuery::all()])?;
    info!(
        "Built selection index with {} group(s).",
        index.groups().len()
    );

    println!("Ensemble: {}", args.ensemble.display());
    println!("  Frames:        {}", ensemble.len());
    println!("  Points:        {}", topology.len());
    println!("  Rigid bodies:  {}", topology.rigid_bodies().len());

    let scored = (0..ensemble.len())
        .filter(|&i| ensemble.score(i).is_some())
        .count();
    println!("  Scored frames: {}", scored);

    println!("Molecule groups:");
    for group in index.groups() {
        let marker = if group.is_symmetric() { " (symmetric)" } else { "" };
        println!(
            "  {:<20} {} cop(ies) x {} point(s){}",
            group.key().to_string(),
            group.copy_count(),
            group.points_per_copy(),
            marker
        );
    }
    Ok(())
}
