//! Rollback command implementation.

use super::{print_json, Context, CycleSummary};

/// Undoes the last producer commit and pushes.
pub fn run(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let producer = context.producer()?;
    let report = producer.rollback()?;
    print_json(&CycleSummary::from(&report))
}
