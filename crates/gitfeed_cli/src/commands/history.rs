//! History command implementation.

use super::Context;
use gitfeed_core::VersionedStore;
use gitfeed_store::WalkOrder;

/// Prints up to `limit` commit ids, newest first.
pub fn run(context: &Context, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let store = context.open_store()?;
    let commits = store.list_commits(context.config.branch(), limit, 0, WalkOrder::NewestFirst)?;
    for commit in commits {
        println!("{commit}");
    }
    Ok(())
}
