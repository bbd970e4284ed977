//! Status command implementation.

use super::{print_json, Context};
use gitfeed_sync::Producer;
use std::sync::Arc;

/// Prints the producer's uncommitted changes.
pub fn run(context: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let producer = Producer::with_store(Arc::clone(&context.config), context.open_store()?);
    let changes = producer.latest_changes()?;
    if changes.is_empty() {
        eprintln!("nothing to commit");
    }
    print_json(&changes)
}
