//! Commit and push command implementations.

use super::Context;
use gitfeed_sync::CommitSelector;

/// Commits pending changes, optionally restricted by `only` selectors,
/// and pushes.
pub fn run(
    context: &Context,
    message: &str,
    only: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let selector = parse_selectors(only)?;
    let producer = context.producer()?;
    let version = producer.commit(message, &selector)?;
    println!("{version}");
    Ok(())
}

/// Force-pushes the producer branch.
pub fn push(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let producer = context.producer()?;
    if !producer.push()? {
        eprintln!("no push url configured");
    }
    Ok(())
}

fn parse_selectors(only: &[String]) -> Result<CommitSelector, Box<dyn std::error::Error>> {
    let mut selector = CommitSelector::All;
    for arg in only {
        if let CommitSelector::Only(map) = arg.parse::<CommitSelector>()? {
            for (category, ids) in map {
                selector = selector.and(category, ids);
            }
        }
    }
    Ok(selector)
}
