//! Narrative markdown for one archived vision.

use super::types::VisionRecord;

/// Render the human-readable report stored next to each payload
pub fn render_vision_markdown(record: &VisionRecord) -> String {
    let request = &record.request;
    let enriched = &record.enriched;
    let meta = &record.metadata;

    let mut out = String::new();
    out.push_str(&format!("# Vision {}\n\n", request.id));
    out.push_str(&format!("> {}\n\n", request.trigger_reason));

    out.push_str("## Request\n\n");
    out.push_str(&format!("- **Project:** {}\n", enriched.project));
    out.push_str(&format!("- **Trigger:** {}\n", request.trigger));
    out.push_str(&format!("- **Priority:** {}\n", request.priority));
    out.push_str(&format!("- **Requester:** {}\n", request.requester));
    out.push_str(&format!(
        "- **Requested:** {}\n",
        request.timestamp.format("%Y-%m-%d %H:%M UTC")
    ));
    if let Some(source) = &request.source_intel {
        out.push_str(&format!("- **Source intel:** {source}\n"));
    }
    if !request.context_notes.is_empty() {
        out.push_str(&format!("\n{}\n", request.context_notes));
    }
    out.push('\n');

    if !enriched.focus_areas.is_empty() {
        out.push_str(&format!(
            "**Focus areas:** {}\n\n",
            enriched.focus_areas.join(", ")
        ));
    }

    out.push_str(&record.forecast.to_markdown());
    out.push('\n');

    out.push_str("## Archive\n\n");
    out.push_str(&format!("- **Archive id:** {}\n", meta.archive_id));
    out.push_str(&format!(
        "- **Archived:** {}\n",
        meta.archived_at.format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&format!("- **Context:** `{}`\n", short(&enriched.context_fingerprint)));
    out.push_str(&format!("- **Disposition:** {}\n", meta.disposition));
    if !meta.related_visions.is_empty() {
        out.push_str("\n### Related Visions\n\n");
        for id in &meta.related_visions {
            out.push_str(&format!("- {id}\n"));
        }
    }
    out
}

fn short(fingerprint: &str) -> &str {
    fingerprint.get(..12).unwrap_or(fingerprint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RepositoryContext;
    use crate::governor::{ManualClock, ResourceBudget, ResourceGovernor};
    use crate::oracle::{Oracle, enrich_context};
    use crate::vision::{ArchiveMetadata, Disposition, VisionRequest, VisionTrigger};
    use chrono::Utc;

    #[test]
    fn test_render_includes_request_forecast_and_links() {
        let ctx = RepositoryContext::new("demo");
        let fingerprint = ctx.fingerprint().expect("fp");
        let mut request = VisionRequest::new(VisionTrigger::Manual, "Plan the service split")
            .with_source_intel("demo:DOC-003")
            .with_notes("Architecture keeps coming up in reviews");
        request.id = "VIS-20261018-12345678".to_string();
        let enriched = enrich_context(&ctx, &fingerprint, &request);
        let mut governor =
            ResourceGovernor::with_clock(ResourceBudget::default(), Box::new(ManualClock::new()));
        let forecast =
            Oracle::default().forecast_uncached(&ctx, &fingerprint, Some(&enriched), &mut governor);

        let record = VisionRecord {
            request,
            enriched,
            forecast,
            metadata: ArchiveMetadata {
                archive_id: "ARC-20261018-101500-abcdef".to_string(),
                data_path: "2026/10/ARC-20261018-101500-abcdef.json".to_string(),
                report_path: "2026/10/ARC-20261018-101500-abcdef.md".to_string(),
                archived_at: Utc::now(),
                disposition: Disposition::Pending,
                disposition_reason: None,
                resulting_changes: Vec::new(),
                disposition_updated_at: None,
                related_visions: vec!["VIS-20261001-87654321".to_string()],
            },
        };

        let md = render_vision_markdown(&record);
        assert!(md.starts_with("# Vision VIS-20261018-12345678"));
        assert!(md.contains("- **Source intel:** demo:DOC-003"));
        assert!(md.contains("**Focus areas:** architecture"));
        assert!(md.contains("## Forecast"));
        assert!(md.contains("**Trajectory:**\n1. "));
        assert!(md.contains("### Related Visions"));
        assert!(md.contains("VIS-20261001-87654321"));
    }
}
