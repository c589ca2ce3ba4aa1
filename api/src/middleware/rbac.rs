use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use common::models::UserClaims;

use crate::handlers::ErrorResponse;
use crate::state::AppState;

/// RBAC middleware that checks permissions and writes the audit trail
#[tracing::instrument(skip_all)]
pub async fn rbac_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    // Get user claims from request extensions (set by auth middleware)
    let Some(claims) = req.extensions().get::<UserClaims>().cloned() else {
        return ErrorResponse::new("unauthorized", "Authentication required").into_response();
    };

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    if let Some(permission) = required_permission(&path, &method) {
        if !claims.has_permission(permission) {
            tracing::warn!(
                user = %claims.username,
                required_permission = %permission,
                "User lacks required permission"
            );
            return ErrorResponse::new(
                "forbidden",
                format!("Insufficient permissions: required {}", permission),
            )
            .into_response();
        }
    }

    let response = next.run(req).await;
    let status = response.status().as_u16();

    tracing::info!(
        user_id = %claims.sub,
        username = %claims.username,
        org_id = ?claims.org_id,
        method = %method,
        path = %path,
        status = status,
        "API operation"
    );

    if let Err(e) = state
        .services
        .repos
        .audit
        .record(claims.org_id, claims.user_id(), method.as_str(), &path, status)
        .await
    {
        tracing::warn!(error = %e, "Failed to write audit log entry");
    }

    response
}

fn by_method(method: &Method, read: &'static str, write: &'static str, delete: &'static str) -> &'static str {
    match *method {
        Method::GET | Method::HEAD => read,
        Method::DELETE => delete,
        _ => write,
    }
}

/// Determine the required permission based on request path and method
///
/// `None` means any authenticated user may call the route.
pub fn required_permission(path: &str, method: &Method) -> Option<&'static str> {
    let is_read = matches!(*method, Method::GET | Method::HEAD);

    // Organization listing, creation and switching need no active org
    if path.starts_with("/api/orgs") || path.starts_with("/api/auth") {
        return None;
    }

    if path.starts_with("/api/org") {
        return Some(match *method {
            Method::GET | Method::HEAD => "org:read",
            Method::DELETE if path == "/api/org" => "org:delete",
            _ => "org:manage",
        });
    }

    if ["/api/contacts", "/api/deals", "/api/activities"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return Some(by_method(method, "crm:read", "crm:write", "crm:delete"));
    }

    if ["/api/projects", "/api/templates", "/api/onboarding", "/api/tasks"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return Some(by_method(method, "onboarding:read", "onboarding:write", "onboarding:write"));
    }

    if ["/api/mailboxes", "/api/emails", "/api/threads", "/api/screening"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
    {
        return Some(by_method(method, "email:read", "email:write", "email:write"));
    }

    if path.starts_with("/api/campaigns") {
        return Some(by_method(method, "campaign:read", "campaign:write", "campaign:delete"));
    }

    if path.starts_with("/api/billing") {
        return Some(if is_read { "billing:read" } else { "billing:manage" });
    }

    if path.starts_with("/api/reminders") || path.starts_with("/api/notifications") {
        return Some(by_method(method, "reminder:read", "reminder:write", "reminder:write"));
    }

    // Server-rendered pages
    if path.starts_with("/app/mail") || path.starts_with("/app/screener") {
        return Some(if is_read { "email:read" } else { "email:write" });
    }
    if path.starts_with("/app/onboarding") {
        return Some(if is_read { "onboarding:read" } else { "onboarding:write" });
    }
    if path.starts_with("/app") {
        return Some("org:read");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::OrgRole;

    fn allowed(role: OrgRole, path: &str, method: Method) -> bool {
        match required_permission(path, &method) {
            Some(permission) => role.permissions().iter().any(|p| p == permission),
            None => true,
        }
    }

    #[test]
    fn test_crm_permissions_follow_method() {
        assert_eq!(required_permission("/api/contacts", &Method::GET), Some("crm:read"));
        assert_eq!(required_permission("/api/deals/1/stage", &Method::PUT), Some("crm:write"));
        assert_eq!(required_permission("/api/activities/1", &Method::DELETE), Some("crm:delete"));
    }

    #[test]
    fn test_viewer_cannot_write() {
        assert!(allowed(OrgRole::Viewer, "/api/contacts", Method::GET));
        assert!(!allowed(OrgRole::Viewer, "/api/contacts", Method::POST));
        assert!(!allowed(OrgRole::Viewer, "/api/screening/decisions", Method::POST));
    }

    #[test]
    fn test_member_cannot_delete_or_manage() {
        assert!(allowed(OrgRole::Member, "/api/deals", Method::POST));
        assert!(!allowed(OrgRole::Member, "/api/deals/1", Method::DELETE));
        assert!(!allowed(OrgRole::Member, "/api/org/members", Method::POST));
        assert!(!allowed(OrgRole::Member, "/api/billing/usage", Method::GET));
    }

    #[test]
    fn test_only_owner_changes_plan_or_deletes_org() {
        assert!(!allowed(OrgRole::Admin, "/api/billing/plan", Method::PUT));
        assert!(allowed(OrgRole::Owner, "/api/billing/plan", Method::PUT));
        assert!(allowed(OrgRole::Admin, "/api/billing/usage", Method::GET));
        assert!(!allowed(OrgRole::Admin, "/api/org", Method::DELETE));
        assert!(allowed(OrgRole::Owner, "/api/org", Method::DELETE));
        assert_eq!(required_permission("/api/org/members/1", &Method::DELETE), Some("org:manage"));
    }

    #[test]
    fn test_org_less_routes_need_no_permission() {
        assert_eq!(required_permission("/api/orgs", &Method::POST), None);
        assert_eq!(required_permission("/api/auth/switch", &Method::POST), None);
    }

    #[test]
    fn test_pages() {
        assert_eq!(required_permission("/app/dashboard", &Method::GET), Some("org:read"));
        assert_eq!(required_permission("/app/mail/imbox", &Method::GET), Some("email:read"));
        assert_eq!(required_permission("/app/screener/decide", &Method::POST), Some("email:write"));
        assert_eq!(required_permission("/app/onboarding/1", &Method::POST), Some("onboarding:write"));
    }
}
