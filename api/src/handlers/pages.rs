use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use chrono::Utc;
use common::crm::compute_sales_metrics;
use common::models::{
    FieldKind, FormField, OnboardingStep, Placement, ScreeningBucket, SessionStatus,
};
use common::errors::OnboardingError;
use common::onboarding::{responses_map, visible_fields, visible_step_indices};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tera::Context;
use uuid::Uuid;

use crate::handlers::auth::auth_cookie;
use crate::handlers::contacts::page_from;
use crate::handlers::{ErrorResponse, Scope};
use crate::state::AppState;
use crate::templates::render;

const STEP_KEY: &str = "_step";
const COMPLETE_KEY: &str = "_complete";

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    pub org_slug: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MailQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DecisionForm {
    pub sender: String,
    pub bucket: ScreeningBucket,
}

#[derive(Debug, Deserialize)]
pub struct StepQuery {
    pub step: Option<usize>,
    pub missing: Option<String>,
}

/// A form field with the value to pre-fill
#[derive(Debug, Serialize)]
pub struct FieldContext {
    pub id: String,
    pub label: String,
    pub kind: &'static str,
    pub required: bool,
    pub options: Vec<String>,
    pub value: String,
    pub checked: bool,
    pub selected: Vec<String>,
    pub missing: bool,
}

pub async fn root() -> Redirect {
    Redirect::to("/app/dashboard")
}

#[tracing::instrument(skip_all)]
pub async fn login_page(Query(query): Query<LoginQuery>) -> Result<Html<String>, ErrorResponse> {
    let mut context = Context::new();
    context.insert("error", &query.error.unwrap_or_default());
    render("login.html", &context)
}

/// Form login: sets the auth cookie and lands on the dashboard
#[tracing::instrument(skip(state, jar, form), fields(username = %form.username))]
pub async fn login_submit(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Response {
    let org_slug = form.org_slug.as_deref().map(str::trim).filter(|s| !s.is_empty());
    match state
        .services
        .auth
        .login(&form.username, &form.password, org_slug)
        .await
    {
        Ok(outcome) => {
            let hours = state.services.auth.jwt().expiration_hours();
            let jar = jar.add(auth_cookie(&state.config.auth.cookie_name, outcome.token, hours));
            (jar, Redirect::to("/app/dashboard")).into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Form login failed");
            Redirect::to("/login?error=Invalid%20username%20or%20password").into_response()
        }
    }
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.remove(Cookie::build((state.config.auth.cookie_name.clone(), "")).path("/"));
    (jar, Redirect::to("/login"))
}

/// Sales metrics, upcoming reminders and unread notifications
#[tracing::instrument(skip(state))]
pub async fn dashboard(State(state): State<AppState>, scope: Scope) -> Result<Html<String>, ErrorResponse> {
    let org = state.services.organizations.get(scope.org_id).await?;
    let deals = state.services.repos.deals.list(scope.org_id, None).await?;
    let reminders = state
        .services
        .reminders
        .list_upcoming(scope.org_id, scope.user_id, 10)
        .await?;
    let notifications = state
        .services
        .reminders
        .notifications(scope.org_id, scope.user_id, true)
        .await?;
    let mailboxes = state
        .services
        .email
        .list_mailboxes(scope.org_id, scope.user_id)
        .await?;

    let mut context = Context::new();
    context.insert("active_page", "dashboard");
    context.insert("org", &org);
    context.insert("username", &scope.username);
    context.insert("metrics", &compute_sales_metrics(&deals, Utc::now()));
    context.insert("reminders", &reminders);
    context.insert("notifications", &notifications);
    context.insert("mailboxes", &mailboxes);
    render("dashboard.html", &context)
}

/// One mail bucket; the Screener view lists senders awaiting a decision
#[tracing::instrument(skip(state))]
pub async fn mail(
    State(state): State<AppState>,
    scope: Scope,
    Path(placement): Path<String>,
    Query(query): Query<MailQuery>,
) -> Result<Html<String>, ErrorResponse> {
    let placement: Placement = placement
        .parse()
        .map_err(|_| ErrorResponse::new("not_found", "Unknown mail view"))?;
    let page = page_from(query.limit, query.offset);

    let messages = state
        .services
        .email
        .list_by_placement(scope.org_id, scope.user_id, placement, page)
        .await?;
    let queue = if placement == Placement::Screener {
        state
            .services
            .screening
            .screener_queue(scope.org_id, scope.user_id)
            .await?
    } else {
        Vec::new()
    };

    let mut context = Context::new();
    context.insert("active_page", placement.as_str());
    context.insert("username", &scope.username);
    context.insert("placement", placement.as_str());
    context.insert("messages", &messages);
    context.insert("queue", &queue);
    context.insert("buckets", &ScreeningBucket::ALL.iter().map(|b| b.as_str()).collect::<Vec<_>>());
    context.insert("offset", &page.offset);
    context.insert("limit", &page.limit);
    render("mail.html", &context)
}

#[tracing::instrument(skip(state, form), fields(bucket = %form.bucket))]
pub async fn screener_decide(
    State(state): State<AppState>,
    scope: Scope,
    Form(form): Form<DecisionForm>,
) -> Result<Redirect, ErrorResponse> {
    state
        .services
        .screening
        .record_decision(scope.org_id, scope.user_id, &form.sender, form.bucket)
        .await?;
    Ok(Redirect::to("/app/mail/screener"))
}

/// Responses for one step from submitted form pairs
///
/// Checkboxes are `false` when absent, multiselects collect every value and
/// numbers are stored as JSON numbers when they parse.
pub fn form_responses(step: &OnboardingStep, pairs: &[(String, String)]) -> Map<String, Value> {
    let values = |id: &str| -> Vec<&str> {
        pairs
            .iter()
            .filter(|(key, _)| key == id)
            .map(|(_, value)| value.trim())
            .collect()
    };

    let mut responses = Map::new();
    for field in &step.fields {
        let submitted = values(&field.id);
        let value = match field.kind {
            FieldKind::Checkbox => Value::Bool(
                submitted
                    .iter()
                    .any(|v| matches!(*v, "on" | "true" | "1" | "yes")),
            ),
            FieldKind::Multiselect => {
                if submitted.is_empty() {
                    Value::Array(Vec::new())
                } else {
                    Value::Array(
                        submitted
                            .iter()
                            .filter(|v| !v.is_empty())
                            .map(|v| Value::String(v.to_string()))
                            .collect(),
                    )
                }
            }
            FieldKind::Number => match submitted.first() {
                None => continue,
                Some(raw) => number_value(raw),
            },
            _ => match submitted.first() {
                None => continue,
                Some(raw) => Value::String(raw.to_string()),
            },
        };
        responses.insert(field.id.clone(), value);
    }
    responses
}

fn number_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

fn field_context(field: &FormField, responses: &Map<String, Value>, missing: &[&str]) -> FieldContext {
    let current = responses.get(&field.id);
    let value = match current {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let selected = match current {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    FieldContext {
        id: field.id.clone(),
        label: field.label.clone(),
        kind: field.kind.as_str(),
        required: field.required,
        options: field.options.clone(),
        value,
        checked: matches!(current, Some(Value::Bool(true))),
        selected,
        missing: missing.contains(&field.id.as_str()),
    }
}

/// Render the requested (or current) visible step of a session
#[tracing::instrument(skip(state))]
pub async fn onboarding_page(
    State(state): State<AppState>,
    scope: Scope,
    Path(session_id): Path<Uuid>,
    Query(query): Query<StepQuery>,
) -> Result<Html<String>, ErrorResponse> {
    let session = state
        .services
        .onboarding
        .load_session(scope.org_id, session_id)
        .await?;
    let template = state
        .services
        .onboarding
        .load_template(scope.org_id, session.template_id)
        .await?;
    let responses = responses_map(&session)?;
    let visible = visible_step_indices(&template, &responses);

    let wanted = query.step.unwrap_or(session.current_step.max(0) as usize);
    let step_index = visible.iter().copied().find(|i| *i >= wanted);
    let missing_raw = query.missing.unwrap_or_default();
    let missing: Vec<&str> = missing_raw.split(',').filter(|s| !s.is_empty()).collect();

    let mut context = Context::new();
    context.insert("active_page", "onboarding");
    context.insert("username", &scope.username);
    context.insert("session", &session);
    context.insert("template_name", &template.name);
    context.insert("completed", &(session.status == SessionStatus::Completed));
    context.insert(
        "steps",
        &visible
            .iter()
            .filter_map(|i| template.steps.get(*i).map(|s| (i, s.title.as_str())))
            .map(|(i, title)| serde_json::json!({ "index": i, "title": title }))
            .collect::<Vec<_>>(),
    );

    match step_index.and_then(|i| template.steps.get(i).map(|s| (i, s))) {
        Some((index, step)) => {
            let fields: Vec<FieldContext> = visible_fields(step, &responses)
                .into_iter()
                .map(|f| field_context(f, &responses, &missing))
                .collect();
            context.insert("step_index", &index);
            context.insert("step_title", &step.title);
            context.insert("step_description", &step.description);
            context.insert("fields", &fields);
            context.insert("has_step", &true);
        }
        None => {
            context.insert("has_step", &false);
        }
    }

    render("onboarding_step.html", &context)
}

/// Save a step from the HTML form, or complete the session
#[tracing::instrument(skip(state, pairs))]
pub async fn onboarding_submit(
    State(state): State<AppState>,
    scope: Scope,
    Path(session_id): Path<Uuid>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect, ErrorResponse> {
    let page = format!("/app/onboarding/{}", session_id);

    if pairs.iter().any(|(key, _)| key == COMPLETE_KEY) {
        return match state
            .services
            .onboarding
            .complete_session(scope.org_id, session_id, Utc::now().date_naive())
            .await
        {
            Ok(_) => Ok(Redirect::to(&page)),
            Err(OnboardingError::MissingFields(missing)) => {
                Ok(Redirect::to(&format!("{}?step=0&missing={}", page, missing.join(","))))
            }
            Err(e) => Err(e.into()),
        };
    }

    let step_index = pairs
        .iter()
        .find(|(key, _)| key == STEP_KEY)
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .ok_or_else(|| ErrorResponse::new("validation_error", "Missing step index"))?;

    let session = state
        .services
        .onboarding
        .load_session(scope.org_id, session_id)
        .await?;
    let template = state
        .services
        .onboarding
        .load_template(scope.org_id, session.template_id)
        .await?;
    let step = template
        .steps
        .get(step_index)
        .ok_or(OnboardingError::StepOutOfRange(step_index))?;

    match state
        .services
        .onboarding
        .save_step(scope.org_id, session_id, step_index, form_responses(step, &pairs))
        .await
    {
        Ok(progress) if progress.finished => Ok(Redirect::to(&page)),
        Ok(progress) => Ok(Redirect::to(&format!("{}?step={}", page, progress.next_step))),
        Err(OnboardingError::MissingFields(missing)) => Ok(Redirect::to(&format!(
            "{}?step={}&missing={}",
            page,
            step_index,
            missing.join(",")
        ))),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(id: &str, kind: FieldKind) -> FormField {
        FormField {
            id: id.to_string(),
            label: id.to_string(),
            kind,
            required: false,
            options: vec![],
            condition: None,
        }
    }

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_form_responses_by_kind() {
        let step = OnboardingStep {
            id: "s".to_string(),
            title: "Step".to_string(),
            description: None,
            fields: vec![
                field("company", FieldKind::Text),
                field("seats", FieldKind::Number),
                field("nda", FieldKind::Checkbox),
                field("channels", FieldKind::Multiselect),
                field("notes", FieldKind::Textarea),
            ],
            condition: None,
        };

        let responses = form_responses(
            &step,
            &pairs(&[
                ("_step", "0"),
                ("company", " Acme "),
                ("seats", "12"),
                ("channels", "email"),
                ("channels", "phone"),
            ]),
        );

        assert_eq!(responses["company"], json!("Acme"));
        assert_eq!(responses["seats"], json!(12));
        assert_eq!(responses["nda"], json!(false));
        assert_eq!(responses["channels"], json!(["email", "phone"]));
        assert!(!responses.contains_key("notes"));
        assert!(!responses.contains_key("_step"));
    }

    #[test]
    fn test_number_value_falls_back_to_string() {
        assert_eq!(number_value("2.5"), json!(2.5));
        assert_eq!(number_value("many"), json!("many"));
    }

    #[test]
    fn test_field_context_prefills_values() {
        let mut responses = Map::new();
        responses.insert("channels".to_string(), json!(["email"]));
        responses.insert("nda".to_string(), json!(true));

        let multi = field_context(&field("channels", FieldKind::Multiselect), &responses, &["channels"]);
        assert_eq!(multi.selected, vec!["email".to_string()]);
        assert!(multi.missing);

        let checkbox = field_context(&field("nda", FieldKind::Checkbox), &responses, &[]);
        assert!(checkbox.checked);
        assert!(!checkbox.missing);
    }
}
