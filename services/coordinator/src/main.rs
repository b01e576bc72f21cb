use allocation_engine::AllocationEngine;
use coordinator::{AllotmentDesk, CoordinatorConfig, JsonFileSource, TriggerOutcome};
use persistence::ResultStore;
use std::sync::Arc;

fn main() -> Result<(), anyhow::Error> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = CoordinatorConfig::from_env()?;
    tracing::info!(snapshot = %config.snapshot_path.display(), "Starting allotment coordinator");

    let store = match config.journal_config() {
        Some(journal) => {
            tracing::info!(dir = %journal.dir.display(), "Using journal-backed result store");
            ResultStore::open(journal)?
        }
        None => ResultStore::in_memory(),
    };

    let desk = AllotmentDesk::new(
        Box::new(JsonFileSource::new(&config.snapshot_path)),
        AllocationEngine::new(config.engine.clone()),
        Arc::new(store),
    );

    match desk.run_matching_now()? {
        TriggerOutcome::Completed {
            result_id,
            matched,
            unmatched,
            unfilled,
            malformed,
        } => {
            println!("result    {}", result_id);
            println!("matched   {}", matched);
            println!("unmatched {}", unmatched);
            println!("unfilled  {}", unfilled);
            if malformed > 0 {
                println!("skipped   {} preference entries naming unknown branches", malformed);
            }
            for fill in desk.branch_fills()? {
                println!("  {:<8} {:>4}/{:<4} seats filled", fill.branch.to_string(), fill.filled(), fill.seats);
            }
        }
        TriggerOutcome::NoRun(reason) => {
            println!("no run: {}", reason);
        }
    }

    Ok(())
}
