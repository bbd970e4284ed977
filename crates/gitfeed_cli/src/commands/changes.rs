//! Changes command implementation.

use super::{print_json, Context};
use gitfeed_core::{classify, Category, VersionPointer, VersionedStore};

/// Prints the changes between two versions, classified through the
/// configured mappings. Categories without a mapping are shown under
/// their own name.
pub fn run(context: &Context, from: &str, to: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = context.open_store()?;
    let entries = store.diff(&VersionPointer::from(from), &VersionPointer::from(to))?;

    let mappings = context.config.mappings();
    let resolve = |category: &Category| match mappings.get(category.as_str()) {
        [] => vec![category.clone()],
        consumers => consumers.to_vec(),
    };
    let changes = classify(&entries, context.config.format(), &resolve);

    print_json(&changes)
}
