//! Validators. They read the enriched graph and report issues.

pub(crate) mod eval_ban;
pub(crate) mod unresolved_calls;

use crate::context::{IssueSpec, PluginContext};
use crate::error::Result;
use crate::plugin::PluginKind;
use crate::report::PluginOutcome;
use sylva_graph::GraphStore;

pub(crate) async fn run(kind: PluginKind, ctx: &PluginContext) -> Result<PluginOutcome> {
    let mut outcome = PluginOutcome::new();
    let issues: Vec<IssueSpec> = {
        let store = ctx.store.read().await;
        let store: &dyn GraphStore = store.as_ref();
        match kind {
            PluginKind::EvalBanValidator => eval_ban::check(store, &mut outcome),
            PluginKind::UnresolvedCallValidator => unresolved_calls::check(store, &mut outcome),
            _ => Vec::new(),
        }
    };
    let reported = ctx.report_issues(issues).await?;
    outcome.add("issues", reported.len());
    Ok(outcome)
}
