//! 2.6 audit: the evidence trail is the structured log stream itself.

use tracing::info;

use crate::context::CaseContext;
use crate::error::CaseResult;
use crate::registry::Scenario;

/// 2.6.1: emit a closing summary so the reviewer finds the catalogue's
/// counters next to the per-case evidence lines.
pub struct LogReview;

impl Scenario for LogReview {
    fn id(&self) -> &'static str {
        "2.6.1"
    }

    fn title(&self) -> &'static str {
        "audit log review"
    }

    fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        let snapshot = ctx.monitor().snapshot();
        info!(
            active = snapshot.active,
            session_connected = ctx.driver().is_connected(),
            "engine state for the audit record"
        );
        info!(
            order_count = snapshot.metrics.order_count,
            cancel_count = snapshot.metrics.cancel_count,
            rejection_count = snapshot.metrics.rejection_count,
            repeat_order_count = snapshot.metrics.repeat_order_count,
            repeat_cancel_count = snapshot.metrics.repeat_cancel_count,
            "session counters for the audit record"
        );
        info!("per-case evidence lives in the structured log stream above");
        Ok(())
    }
}
