//! Status transition planning.
//!
//! Pure rules shared by every [`AppealStore`](crate::store::AppealStore)
//! implementation: which transitions produce a history entry, what the entry
//! says, and how `closed_at` evolves.

use chrono::{DateTime, Utc};

use crate::entities::appeal::AppealStatus;

/// Action text for a manual assignment to an already-assigned appeal.
pub const ASSIGNED_ACTION: &str = "Appeal assigned to service";

/// Action text prefix for classifier-driven routing.
pub const AUTO_ROUTED_ACTION: &str = "Appeal automatically routed to service";

/// History entry about to be written, without storage-assigned fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDraft {
    pub old_status: Option<String>,
    pub new_status: String,
    pub action: String,
    pub comment: Option<String>,
}

/// Render a status token through the fixed label table.
///
/// Unknown tokens come back unchanged.
#[must_use]
pub fn status_label(token: &str) -> &str {
    match AppealStatus::from_token(token) {
        Some(status) => status.label(),
        None => token,
    }
}

/// "Status changed from X to Y" with labelled statuses.
#[must_use]
pub fn describe_status_change(old: &str, new: &str) -> String {
    format!(
        "Status changed from {} to {}",
        status_label(old),
        status_label(new)
    )
}

/// Blank comments are not stored.
fn normalize_comment(comment: Option<String>) -> Option<String> {
    comment
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// Decide the history entry for a raw `old -> new` transition.
///
/// Returns `None` when nothing changes.
#[must_use]
pub fn record_transition(
    old: Option<&str>,
    new: &str,
    comment: Option<String>,
) -> Option<HistoryDraft> {
    if old == Some(new) {
        return None;
    }

    let action = match old {
        Some(old) => describe_status_change(old, new),
        None => format!("Status set to {}", status_label(new)),
    };

    Some(HistoryDraft {
        old_status: old.map(str::to_string),
        new_status: new.to_string(),
        action,
        comment: normalize_comment(comment),
    })
}

/// History entry for `UpdateStatus`, or `None` for a same-status resubmit.
#[must_use]
pub fn plan_status_change(
    current: AppealStatus,
    target: AppealStatus,
    comment: Option<String>,
) -> Option<HistoryDraft> {
    record_transition(Some(current.as_str()), target.as_str(), comment)
}

/// History entry for `Assign`. Always exactly one.
///
/// Reassigning an appeal that is already `assigned` records only the
/// reassignment, never an "Assigned to Assigned" status change.
#[must_use]
pub fn plan_assignment(current: AppealStatus) -> HistoryDraft {
    let action = if current == AppealStatus::Assigned {
        ASSIGNED_ACTION.to_string()
    } else {
        format!(
            "{ASSIGNED_ACTION}. {}",
            describe_status_change(current.as_str(), AppealStatus::Assigned.as_str())
        )
    };

    HistoryDraft {
        old_status: Some(current.as_str().to_string()),
        new_status: AppealStatus::Assigned.as_str().to_string(),
        action,
        comment: None,
    }
}

/// History entry for classifier-driven routing of a fresh appeal.
#[must_use]
pub fn plan_auto_route() -> HistoryDraft {
    HistoryDraft {
        old_status: Some(AppealStatus::New.as_str().to_string()),
        new_status: AppealStatus::Assigned.as_str().to_string(),
        action: format!(
            "{AUTO_ROUTED_ACTION}. {}",
            describe_status_change(AppealStatus::New.as_str(), AppealStatus::Assigned.as_str())
        ),
        comment: None,
    }
}

/// `closed_at` after entering `target`.
///
/// Closing statuses stamp `now`; every other status keeps the previous value.
#[must_use]
pub fn closed_at_after(
    target: AppealStatus,
    previous: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    if target.is_closing() {
        Some(now)
    } else {
        previous
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_labels_known_statuses() {
        assert_eq!(status_label("in_progress"), "In Progress");
        assert_eq!(status_label("new"), "New");
        assert_eq!(status_label("rejected"), "Rejected");
    }

    #[test]
    fn test_unknown_status_falls_back_to_raw_token() {
        assert_eq!(status_label("archived"), "archived");
        assert_eq!(
            describe_status_change("archived", "closed"),
            "Status changed from archived to Closed"
        );
    }

    #[test]
    fn test_same_status_produces_no_entry() {
        assert!(plan_status_change(AppealStatus::Assigned, AppealStatus::Assigned, None).is_none());
        assert!(record_transition(Some("legacy"), "legacy", Some("x".into())).is_none());
    }

    #[test]
    fn test_status_change_entry() {
        let draft = plan_status_change(
            AppealStatus::InProgress,
            AppealStatus::Completed,
            Some("  Pothole filled  ".into()),
        )
        .unwrap();

        assert_eq!(draft.old_status.as_deref(), Some("in_progress"));
        assert_eq!(draft.new_status, "completed");
        assert_eq!(draft.action, "Status changed from In Progress to Completed");
        assert_eq!(draft.comment.as_deref(), Some("Pothole filled"));
    }

    #[test]
    fn test_blank_comment_is_dropped() {
        let draft = plan_status_change(AppealStatus::New, AppealStatus::Rejected, Some("   ".into()))
            .unwrap();
        assert!(draft.comment.is_none());
    }

    #[test]
    fn test_missing_old_status() {
        let draft = record_transition(None, "new", None).unwrap();
        assert!(draft.old_status.is_none());
        assert_eq!(draft.action, "Status set to New");
    }

    #[test]
    fn test_reassignment_does_not_claim_status_change() {
        let draft = plan_assignment(AppealStatus::Assigned);
        assert_eq!(draft.action, ASSIGNED_ACTION);
        assert!(!draft.action.contains("Status changed"));
        assert_eq!(draft.old_status.as_deref(), Some("assigned"));
        assert_eq!(draft.new_status, "assigned");
    }

    #[test]
    fn test_first_assignment_mentions_status_change() {
        let draft = plan_assignment(AppealStatus::New);
        assert_eq!(
            draft.action,
            "Appeal assigned to service. Status changed from New to Assigned"
        );
    }

    #[test]
    fn test_assignment_from_in_progress_regresses_to_assigned() {
        let draft = plan_assignment(AppealStatus::InProgress);
        assert_eq!(draft.old_status.as_deref(), Some("in_progress"));
        assert_eq!(draft.new_status, "assigned");
    }

    #[test]
    fn test_closed_at_is_stamped_and_kept() {
        let now = Utc::now();
        let earlier = now - Duration::days(3);

        assert_eq!(closed_at_after(AppealStatus::Completed, None, now), Some(now));
        assert_eq!(closed_at_after(AppealStatus::Closed, Some(earlier), now), Some(now));
        assert_eq!(
            closed_at_after(AppealStatus::InProgress, Some(earlier), now),
            Some(earlier)
        );
        assert_eq!(closed_at_after(AppealStatus::Rejected, None, now), None);
    }
}
