use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tracing::warn;
use url::Url;

use crate::auth;
use crate::config::Config;
use crate::db::{ArticleQuery, Database, Feedback, SortField, SortOrder, TimeWindow};
use crate::render;

const RSS_PAGE_SIZE: i64 = 50;

pub struct AppState {
    pub db: Arc<Database>,
    pub config: Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/rss.xml", get(rss_xml))
        .route("/sitemap.xml", get(sitemap_xml))
        .route("/auth", get(auth_form).post(auth_submit))
        .route("/feedback", get(feedback_page).post(feedback_submit))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(state)
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub articles: Vec<ListingItem>,
    pub total: i64,
    pub page: i64,
    pub keyword: String,
    pub source: String,
    pub window: String,
    pub sort: String,
    pub order: String,
    pub prev_url: Option<String>,
    pub next_url: Option<String>,
    pub error: Option<String>,
}

pub struct ListingItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub host: String,
    pub published: String,
}

#[derive(Template)]
#[template(path = "auth.html")]
pub struct AuthTemplate {
    pub message: Option<String>,
    pub error: Option<String>,
}

#[derive(Template)]
#[template(path = "feedback.html")]
pub struct FeedbackTemplate {
    pub entries: Vec<Feedback>,
    pub message: Option<String>,
    pub error: Option<String>,
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error: {}", self.0),
        )
            .into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize, Default)]
pub struct ListingParams {
    pub page: Option<i64>,
    pub keyword: Option<String>,
    pub source: Option<String>,
    pub window: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

impl ListingParams {
    /// Unknown sort fields, orders, and time windows are hard errors, never
    /// silently replaced with a default.
    fn to_query(&self, page_size: i64) -> Result<ArticleQuery, String> {
        let sort = match self.sort.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => SortField::parse(s).map_err(|e| e.to_string())?,
            None => SortField::default(),
        };
        let order = match self.order.as_deref().filter(|s| !s.is_empty()) {
            Some("asc") => SortOrder::Asc,
            Some("desc") | None => SortOrder::Desc,
            Some(other) => return Err(format!("invalid order: {}", other)),
        };
        let time_window = match self.window.as_deref().filter(|s| !s.is_empty()) {
            Some(w) => Some(TimeWindow::parse(w).ok_or_else(|| format!("invalid time window: {}", w))?),
            None => None,
        };

        Ok(ArticleQuery {
            page: self.page.unwrap_or(1),
            page_size,
            sort,
            order,
            keyword: self.keyword.clone(),
            source: self.source.clone(),
            time_window,
        })
    }

    fn page_url(&self, page: i64) -> String {
        let mut parts = vec![format!("page={}", page)];
        for (key, value) in [
            ("keyword", &self.keyword),
            ("source", &self.source),
            ("window", &self.window),
            ("sort", &self.sort),
            ("order", &self.order),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                parts.push(format!("{}={}", key, urlencode(v)));
            }
        }
        format!("/?{}", parts.join("&"))
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => {
                use std::fmt::Write as _;
                let _ = write!(&mut out, "%{:02X}", b);
            }
        }
    }
    out
}

fn listing_item(article: &crate::db::Article) -> ListingItem {
    let host = Url::parse(&article.original_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default();
    let published = article
        .published_at
        .as_deref()
        .map(|p| p.chars().take(10).collect())
        .unwrap_or_default();
    ListingItem {
        title: article.title.clone(),
        url: article.original_url.clone(),
        summary: article.summary.clone().unwrap_or_default(),
        host,
        published,
    }
}

// Route handlers
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListingParams>,
) -> Result<Response, AppError> {
    let page_size = state.config.page_size;
    let query = match params.to_query(page_size) {
        Ok(q) => q,
        Err(msg) => return Ok((StatusCode::BAD_REQUEST, msg).into_response()),
    };

    let (articles, total, error) = match state.db.fetch_articles(&query).await {
        Ok(page) => (page.data, page.total, None),
        Err(e) if state.config.lenient_queries => {
            warn!(error = %e, "article query failed, serving empty listing");
            (Vec::new(), 0, Some(e.to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let has_next = query.page * page_size < total;
    let template = IndexTemplate {
        articles: articles.iter().map(listing_item).collect(),
        total,
        page: query.page,
        keyword: params.keyword.clone().unwrap_or_default(),
        source: params.source.clone().unwrap_or_default(),
        window: params.window.clone().unwrap_or_default(),
        sort: params.sort.clone().unwrap_or_default(),
        order: params.order.clone().unwrap_or_default(),
        prev_url: (query.page > 1).then(|| params.page_url(query.page - 1)),
        next_url: has_next.then(|| params.page_url(query.page + 1)),
        error,
    };
    Ok(HtmlTemplate(template).into_response())
}

fn xml_response(body: String, cache_control: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/xml; charset=utf-8"),
            (header::CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response()
}

/// Never fails the HTTP response: empty results and store errors both fall
/// back to a minimal valid channel with a shorter cache lifetime.
pub async fn rss_xml(State(state): State<Arc<AppState>>) -> Response {
    let query = ArticleQuery {
        page_size: RSS_PAGE_SIZE,
        ..Default::default()
    };

    match state.db.fetch_articles(&query).await {
        Ok(page) if !page.data.is_empty() => xml_response(
            render::rss_channel(&state.config.site_url, &page.data),
            "public, max-age=1800, s-maxage=3600",
        ),
        Ok(_) => xml_response(
            render::rss_fallback(&state.config.site_url),
            "public, max-age=300",
        ),
        Err(e) => {
            warn!(error = %e, "RSS query failed, serving fallback channel");
            xml_response(
                render::rss_fallback(&state.config.site_url),
                "public, max-age=300",
            )
        }
    }
}

pub async fn sitemap_xml(State(state): State<Arc<AppState>>) -> Response {
    xml_response(
        render::sitemap(&state.config.site_url),
        "public, max-age=3600",
    )
}

pub async fn auth_form() -> impl IntoResponse {
    HtmlTemplate(AuthTemplate {
        message: None,
        error: None,
    })
}

#[derive(Deserialize)]
pub struct AuthSubmit {
    pub email: String,
    pub password: String,
    pub action: String,
}

pub async fn auth_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<AuthSubmit>,
) -> impl IntoResponse {
    let result = match form.action.as_str() {
        "signup" => auth::sign_up(&state.db, &form.email, &form.password).await,
        _ => auth::sign_in(&state.db, &form.email, &form.password).await,
    };

    // Outcome is rendered inline in the form, never a crash page
    match result {
        Ok(message) => HtmlTemplate(AuthTemplate {
            message: Some(message),
            error: None,
        }),
        Err(e) => HtmlTemplate(AuthTemplate {
            message: None,
            error: Some(e.to_string()),
        }),
    }
}

pub async fn feedback_page(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.db.recent_feedback(20).await?;
    Ok(HtmlTemplate(FeedbackTemplate {
        entries,
        message: None,
        error: None,
    }))
}

#[derive(Deserialize)]
pub struct FeedbackSubmit {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub contact: String,
}

pub async fn feedback_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<FeedbackSubmit>,
) -> Result<impl IntoResponse, AppError> {
    let (message, error) = if form.title.trim().is_empty() {
        (None, Some("标题不能为空".to_string()))
    } else {
        state
            .db
            .add_feedback(
                form.title.trim(),
                Some(form.content.trim()).filter(|c| !c.is_empty()),
                Some(form.contact.trim()).filter(|c| !c.is_empty()),
            )
            .await?;
        (Some("感谢反馈！".to_string()), None)
    };

    let entries = state.db.recent_feedback(20).await?;
    Ok(HtmlTemplate(FeedbackTemplate {
        entries,
        message,
        error,
    }))
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}
