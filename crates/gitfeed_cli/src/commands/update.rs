//! Update command implementation.

use super::{print_json, Context, CycleSummary};

/// Brings the consumer up to date. Record handlers are registered by
/// the embedding application, so from the command line this fetches and
/// advances the version pointer.
pub fn run(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let consumer = context.consumer()?;
    let report = consumer.update()?;
    print_json(&CycleSummary::from(&report))
}
