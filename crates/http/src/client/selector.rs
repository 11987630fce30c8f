//! Credential selection for outgoing requests

use campus_core::{RequestContext, Role, Sessions, StoreResult, StoredCredential};
use tracing::debug;

/// Pick the credential to attach to a request for `path`.
///
/// An explicit role in the context always wins. Otherwise the first match of
/// faculty page, admin route and student record (current then legacy key) is
/// used. `None` means the request goes out unauthenticated.
pub fn select(
    sessions: &Sessions,
    ctx: &RequestContext,
    path: &str,
) -> StoreResult<Option<StoredCredential>> {
    if let Some(role) = ctx.role {
        let stored = sessions.locate(role)?;
        trace_selection(stored.as_ref(), "explicit");
        return Ok(stored);
    }

    if is_faculty_page(ctx.page_path()) {
        if let Some(stored) = sessions.locate(Role::Faculty)? {
            trace_selection(Some(&stored), "faculty page");
            return Ok(Some(stored));
        }
    }

    if is_admin_route(path) {
        if let Some(stored) = sessions.locate(Role::Admin)? {
            trace_selection(Some(&stored), "admin route");
            return Ok(Some(stored));
        }
    }

    let stored = sessions.locate(Role::Student)?;
    trace_selection(stored.as_ref(), "student fallback");
    Ok(stored)
}

fn trace_selection(stored: Option<&StoredCredential>, reason: &str) {
    match stored {
        Some(stored) => debug!(
            role = %stored.role,
            key = stored.source_key,
            reason,
            "Selected credential"
        ),
        None => debug!(reason, "No credential selected"),
    }
}

pub fn is_faculty_page(page_path: &str) -> bool {
    page_path.contains("/faculty")
}

/// `/admin`, `/admin/...` or `/admin?...`, with or without a leading `api/` segment
pub fn is_admin_route(path: &str) -> bool {
    let path = path.trim_start_matches('/');
    let path = path.strip_prefix("api/").unwrap_or(path);
    path.strip_prefix("admin")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
}
