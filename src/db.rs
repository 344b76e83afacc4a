use chrono::{DateTime, Duration, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, QueryBuilder, Sqlite, SqlitePool};

use crate::config::SourceConfig;
use crate::dedup::dedup_hash;

/// Typed store error. Duplicate writes are classified structurally from the
/// driver's unique-violation kind, never by matching message text.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violation")]
    ConstraintViolation,
    #[error("invalid sort field: {0}")]
    InvalidSort(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid article: {0}")]
    InvalidArticle(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::ConstraintViolation;
            }
        }
        StoreError::Database(err)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub homepage_url: String,
    pub rss_url: Option<String>,
    pub language: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Article {
    pub id: i64,
    pub source_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub original_url: String,
    pub cover_image_url: Option<String>,
    pub published_at: Option<String>,
    pub hash_dedup: String,
    pub popularity_score: Option<f64>,
    pub growth_score: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct IngestionJob {
    pub id: i64,
    pub job_date: String,
    pub status: String,
    pub total_fetched: i64,
    pub total_inserted: i64,
    pub total_duplicated: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct IngestionLog {
    pub id: i64,
    pub job_id: i64,
    pub source_id: Option<i64>,
    pub level: String,
    pub message: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Feedback {
    pub id: i64,
    pub title: String,
    pub content: Option<String>,
    pub contact: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub created_at: String,
}

/// One parsed feed entry, ready to be written.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub summary: Option<String>,
    pub original_url: String,
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Duplicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    PublishedAt,
    PopularityScore,
    GrowthScore,
}

impl SortField {
    /// Rejects unknown fields outright; there is no silent fallback.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "published_at" => Ok(SortField::PublishedAt),
            "popularity_score" => Ok(SortField::PopularityScore),
            "growth_score" => Ok(SortField::GrowthScore),
            other => Err(StoreError::InvalidSort(other.to_string())),
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            SortField::PublishedAt => "published_at",
            SortField::PopularityScore => "popularity_score",
            SortField::GrowthScore => "growth_score",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    Day,
    Week,
    Month,
}

impl TimeWindow {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "24h" => Some(TimeWindow::Day),
            "7d" => Some(TimeWindow::Week),
            "30d" => Some(TimeWindow::Month),
            _ => None,
        }
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let days = match self {
            TimeWindow::Day => 1,
            TimeWindow::Week => 7,
            TimeWindow::Month => 30,
        };
        now - Duration::days(days)
    }
}

#[derive(Debug, Clone)]
pub struct ArticleQuery {
    pub page: i64,
    pub page_size: i64,
    pub sort: SortField,
    pub order: SortOrder,
    pub keyword: Option<String>,
    pub source: Option<String>,
    pub time_window: Option<TimeWindow>,
}

impl Default for ArticleQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            sort: SortField::default(),
            order: SortOrder::default(),
            keyword: None,
            source: None,
            time_window: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub data: Vec<Article>,
    pub total: i64,
}

/// Timestamp format used for every TEXT timestamp column, so that
/// lexicographic comparison matches chronological order.
pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                homepage_url TEXT NOT NULL UNIQUE,
                rss_url TEXT,
                language TEXT NOT NULL DEFAULT 'zh'
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY,
                source_id INTEGER NOT NULL REFERENCES sources(id),
                title TEXT NOT NULL,
                summary TEXT,
                author TEXT,
                original_url TEXT NOT NULL UNIQUE,
                cover_image_url TEXT,
                published_at TEXT,
                hash_dedup TEXT NOT NULL,
                popularity_score REAL,
                growth_score REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_articles_published
            ON articles(published_at DESC)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingestion_jobs (
                id INTEGER PRIMARY KEY,
                job_date TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('running', 'success', 'failed')),
                total_fetched INTEGER NOT NULL DEFAULT 0,
                total_inserted INTEGER NOT NULL DEFAULT 0,
                total_duplicated INTEGER NOT NULL DEFAULT 0,
                error_message TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingestion_logs (
                id INTEGER PRIMARY KEY,
                job_id INTEGER NOT NULL REFERENCES ingestion_jobs(id),
                source_id INTEGER REFERENCES sources(id),
                level TEXT NOT NULL CHECK (level IN ('warn', 'error')),
                message TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feedback (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                content TEXT,
                contact TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent lookup-or-insert keyed by homepage URL.
    pub async fn ensure_source(&self, config: &SourceConfig) -> Result<i64, StoreError> {
        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM sources WHERE homepage_url = ?")
                .bind(&config.homepage)
                .fetch_optional(&self.pool)
                .await?;

        if let Some((id,)) = existing {
            return Ok(id);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO sources (name, homepage_url, rss_url, language)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&config.name)
        .bind(&config.homepage)
        .bind(&config.rss)
        .bind(&config.language)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_source(&self, source_id: i64) -> Result<Option<Source>, StoreError> {
        let source = sqlx::query_as::<_, Source>("SELECT * FROM sources WHERE id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(source)
    }

    pub async fn get_all_sources(&self) -> Result<Vec<Source>, StoreError> {
        let sources = sqlx::query_as::<_, Source>("SELECT * FROM sources ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sources)
    }

    /// Writes one article. A pre-existing row with the same `original_url`
    /// gets its fields overwritten and the write reports `Duplicated`.
    pub async fn upsert_article(
        &self,
        source_id: i64,
        article: &NewArticle,
    ) -> Result<UpsertOutcome, StoreError> {
        let hash = dedup_hash(&article.title, &article.original_url)
            .map_err(|e| StoreError::InvalidArticle(e.to_string()))?;
        let published = article.published_at.map(timestamp);

        let inserted = sqlx::query(
            r#"
            INSERT INTO articles (source_id, title, summary, original_url, published_at, hash_dedup)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(source_id)
        .bind(&article.title)
        .bind(&article.summary)
        .bind(&article.original_url)
        .bind(&published)
        .bind(&hash)
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(UpsertOutcome::Inserted),
            Err(e) => match StoreError::from(e) {
                StoreError::ConstraintViolation => {
                    sqlx::query(
                        r#"
                        UPDATE articles
                        SET source_id = ?, title = ?, summary = ?, published_at = ?, hash_dedup = ?
                        WHERE original_url = ?
                        "#,
                    )
                    .bind(source_id)
                    .bind(&article.title)
                    .bind(&article.summary)
                    .bind(&published)
                    .bind(&hash)
                    .bind(&article.original_url)
                    .execute(&self.pool)
                    .await?;
                    Ok(UpsertOutcome::Duplicated)
                }
                other => Err(other),
            },
        }
    }

    pub async fn create_job(&self, job_date: &str) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO ingestion_jobs (job_date, status) VALUES (?, 'running')")
            .bind(job_date)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn finish_job(
        &self,
        job_id: i64,
        total_fetched: i64,
        total_inserted: i64,
        total_duplicated: i64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE ingestion_jobs
            SET status = 'success', total_fetched = ?, total_inserted = ?, total_duplicated = ?
            WHERE id = ?
            "#,
        )
        .bind(total_fetched)
        .bind(total_inserted)
        .bind(total_duplicated)
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_job(&self, job_id: i64, message: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE ingestion_jobs SET status = 'failed', error_message = ? WHERE id = ?")
            .bind(message)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_job(&self, job_id: i64) -> Result<Option<IngestionJob>, StoreError> {
        let job = sqlx::query_as::<_, IngestionJob>("SELECT * FROM ingestion_jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn append_log(
        &self,
        job_id: i64,
        source_id: Option<i64>,
        level: LogLevel,
        message: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO ingestion_logs (job_id, source_id, level, message) VALUES (?, ?, ?, ?)")
            .bind(job_id)
            .bind(source_id)
            .bind(level.as_str())
            .bind(message)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_logs_for_job(&self, job_id: i64) -> Result<Vec<IngestionLog>, StoreError> {
        let logs = sqlx::query_as::<_, IngestionLog>(
            "SELECT * FROM ingestion_logs WHERE job_id = ? ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    fn push_article_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &ArticleQuery) {
        builder.push(" WHERE 1 = 1");
        if let Some(keyword) = query.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            builder.push(" AND LOWER(title) LIKE ");
            builder.push_bind(format!("%{}%", keyword.to_lowercase()));
        }
        // Substring match against the stored URL, an approximation for a
        // source join carried over from the original listing behavior.
        if let Some(source) = query.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            builder.push(" AND LOWER(original_url) LIKE ");
            builder.push_bind(format!("%{}%", source.to_lowercase()));
        }
        if let Some(window) = query.time_window {
            builder.push(" AND published_at >= ");
            builder.push_bind(timestamp(window.cutoff(Utc::now())));
        }
    }

    /// Filtered/sorted/paginated article listing with an exact total count.
    pub async fn fetch_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, StoreError> {
        if query.page < 1 {
            return Err(StoreError::InvalidQuery(format!("page must be >= 1, got {}", query.page)));
        }
        if query.page_size < 1 {
            return Err(StoreError::InvalidQuery(format!(
                "page_size must be >= 1, got {}",
                query.page_size
            )));
        }

        let mut count_builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM articles");
        Self::push_article_filters(&mut count_builder, query);
        let total: i64 = count_builder.build_query_scalar().fetch_one(&self.pool).await?;

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM articles");
        Self::push_article_filters(&mut builder, query);
        builder.push(" ORDER BY ");
        builder.push(query.sort.as_sql());
        builder.push(" ");
        builder.push(query.order.as_sql());
        builder.push(" NULLS LAST, id DESC");
        builder.push(" LIMIT ");
        builder.push_bind(query.page_size);
        builder.push(" OFFSET ");
        builder.push_bind((query.page - 1) * query.page_size);

        let data = builder
            .build_query_as::<Article>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ArticlePage { data, total })
    }

    pub async fn add_feedback(
        &self,
        title: &str,
        content: Option<&str>,
        contact: Option<&str>,
    ) -> Result<i64, StoreError> {
        let result = sqlx::query(
            "INSERT INTO feedback (title, content, contact, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(contact)
        .bind(timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn recent_feedback(&self, limit: i64) -> Result<Vec<Feedback>, StoreError> {
        let rows = sqlx::query_as::<_, Feedback>(
            "SELECT * FROM feedback ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_user(&self, email: &str, password_hash: &str) -> Result<i64, StoreError> {
        let result = sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(email)
            .bind(password_hash)
            .bind(timestamp(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn source_config(name: &str, homepage: &str, rss: Option<&str>) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            homepage: homepage.to_string(),
            rss: rss.map(|r| r.to_string()),
            language: "zh".to_string(),
        }
    }

    fn new_article(title: &str, url: &str) -> NewArticle {
        NewArticle {
            title: title.to_string(),
            summary: Some(format!("{} summary", title)),
            original_url: url.to_string(),
            published_at: Some(Utc::now()),
        }
    }

    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_creation() {
            let db = Database::new("sqlite::memory:").await;
            assert!(db.is_ok());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            let result = db.initialize().await;
            assert!(result.is_ok());
        }
    }

    mod source_tests {
        use super::*;

        #[tokio::test]
        async fn test_ensure_source_creates_row() {
            let db = create_test_db().await;
            let id = db
                .ensure_source(&source_config("OSChina", "https://www.oschina.net/", None))
                .await
                .unwrap();

            let source = db.get_source(id).await.unwrap().unwrap();
            assert_eq!(source.name, "OSChina");
            assert_eq!(source.homepage_url, "https://www.oschina.net/");
            assert!(source.rss_url.is_none());
        }

        #[tokio::test]
        async fn test_ensure_source_is_idempotent() {
            let db = create_test_db().await;
            let config = source_config("Juejin", "https://juejin.cn/", Some("https://juejin.cn/rss"));

            let first = db.ensure_source(&config).await.unwrap();
            let second = db.ensure_source(&config).await.unwrap();

            assert_eq!(first, second);
            assert_eq!(db.get_all_sources().await.unwrap().len(), 1);
        }

        #[tokio::test]
        async fn test_ensure_source_keyed_by_homepage_not_name() {
            let db = create_test_db().await;
            let a = db
                .ensure_source(&source_config("Name", "https://a.example.com/", None))
                .await
                .unwrap();
            let b = db
                .ensure_source(&source_config("Name", "https://b.example.com/", None))
                .await
                .unwrap();
            assert_ne!(a, b);
        }
    }

    mod upsert_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_write_is_inserted() {
            let db = create_test_db().await;
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            let outcome = db
                .upsert_article(source_id, &new_article("Title", "https://s.example.com/a/1"))
                .await
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::Inserted);
        }

        #[tokio::test]
        async fn test_same_url_is_duplicated_and_merged() {
            let db = create_test_db().await;
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            let url = "https://s.example.com/a/1";
            db.upsert_article(source_id, &new_article("Old Title", url))
                .await
                .unwrap();
            let outcome = db
                .upsert_article(source_id, &new_article("New Title", url))
                .await
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::Duplicated);

            let page = db.fetch_articles(&ArticleQuery::default()).await.unwrap();
            assert_eq!(page.total, 1);
            assert_eq!(page.data[0].title, "New Title");
        }

        #[tokio::test]
        async fn test_hash_dedup_stored() {
            let db = create_test_db().await;
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            db.upsert_article(source_id, &new_article("A Headline", "https://s.example.com/x"))
                .await
                .unwrap();

            let page = db.fetch_articles(&ArticleQuery::default()).await.unwrap();
            let expected = crate::dedup::dedup_hash("A Headline", "https://s.example.com/x").unwrap();
            assert_eq!(page.data[0].hash_dedup, expected);
        }

        #[tokio::test]
        async fn test_bad_url_is_invalid_article() {
            let db = create_test_db().await;
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            let result = db
                .upsert_article(source_id, &new_article("Title", "not-a-url"))
                .await;
            assert!(matches!(result, Err(StoreError::InvalidArticle(_))));
        }
    }

    mod job_tests {
        use super::*;

        #[tokio::test]
        async fn test_job_lifecycle_success() {
            let db = create_test_db().await;
            let job_id = db.create_job("2026-08-25").await.unwrap();

            let job = db.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, "running");
            assert_eq!(job.total_fetched, 0);

            db.finish_job(job_id, 10, 7, 3).await.unwrap();
            let job = db.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, "success");
            assert_eq!(job.total_fetched, 10);
            assert_eq!(job.total_inserted, 7);
            assert_eq!(job.total_duplicated, 3);
            assert!(job.error_message.is_none());
        }

        #[tokio::test]
        async fn test_job_lifecycle_failed() {
            let db = create_test_db().await;
            let job_id = db.create_job("2026-08-25").await.unwrap();

            db.fail_job(job_id, "bookkeeping broke").await.unwrap();
            let job = db.get_job(job_id).await.unwrap().unwrap();
            assert_eq!(job.status, "failed");
            assert_eq!(job.error_message.as_deref(), Some("bookkeeping broke"));
        }

        #[tokio::test]
        async fn test_logs_append_in_order() {
            let db = create_test_db().await;
            let job_id = db.create_job("2026-08-25").await.unwrap();
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            db.append_log(job_id, Some(source_id), LogLevel::Warn, "No RSS configured; skipped")
                .await
                .unwrap();
            db.append_log(job_id, Some(source_id), LogLevel::Error, "fetch failed")
                .await
                .unwrap();

            let logs = db.get_logs_for_job(job_id).await.unwrap();
            assert_eq!(logs.len(), 2);
            assert_eq!(logs[0].level, "warn");
            assert_eq!(logs[1].level, "error");
            assert_eq!(logs[1].message, "fetch failed");
        }
    }

    mod fetch_articles_tests {
        use super::*;

        async fn seed_articles(db: &Database, count: i64) -> i64 {
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();
            for i in 1..=count {
                let article = NewArticle {
                    title: format!("Article {}", i),
                    summary: None,
                    original_url: format!("https://s.example.com/a/{}", i),
                    published_at: Some(Utc::now() - Duration::hours(count - i)),
                };
                db.upsert_article(source_id, &article).await.unwrap();
            }
            source_id
        }

        #[tokio::test]
        async fn test_returns_at_most_page_size() {
            let db = create_test_db().await;
            seed_articles(&db, 25).await;

            let page = db
                .fetch_articles(&ArticleQuery {
                    page_size: 10,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.data.len(), 10);
            assert_eq!(page.total, 25);
        }

        #[tokio::test]
        async fn test_pages_are_disjoint() {
            let db = create_test_db().await;
            seed_articles(&db, 3).await;

            let p1 = db
                .fetch_articles(&ArticleQuery {
                    page: 1,
                    page_size: 1,
                    ..Default::default()
                })
                .await
                .unwrap();
            let p2 = db
                .fetch_articles(&ArticleQuery {
                    page: 2,
                    page_size: 1,
                    ..Default::default()
                })
                .await
                .unwrap();

            assert_ne!(p1.data[0].id, p2.data[0].id);
        }

        #[tokio::test]
        async fn test_default_sort_most_recent_first() {
            let db = create_test_db().await;
            seed_articles(&db, 5).await;

            let page = db.fetch_articles(&ArticleQuery::default()).await.unwrap();
            assert_eq!(page.data[0].title, "Article 5");
            assert_eq!(page.data[4].title, "Article 1");
        }

        #[tokio::test]
        async fn test_ascending_order() {
            let db = create_test_db().await;
            seed_articles(&db, 5).await;

            let page = db
                .fetch_articles(&ArticleQuery {
                    order: SortOrder::Asc,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.data[0].title, "Article 1");
        }

        #[tokio::test]
        async fn test_keyword_filter_case_insensitive() {
            let db = create_test_db().await;
            let source_id = seed_articles(&db, 3).await;
            db.upsert_article(source_id, &new_article("Rust ships", "https://s.example.com/rust"))
                .await
                .unwrap();

            let page = db
                .fetch_articles(&ArticleQuery {
                    keyword: Some("RUST".to_string()),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.total, 1);
            assert_eq!(page.data[0].title, "Rust ships");
        }

        #[tokio::test]
        async fn test_source_filter_matches_url_substring() {
            let db = create_test_db().await;
            seed_articles(&db, 2).await;
            let other = db
                .ensure_source(&source_config("Other", "https://other.example.org/", None))
                .await
                .unwrap();
            db.upsert_article(other, &new_article("Elsewhere", "https://other.example.org/p/1"))
                .await
                .unwrap();

            let page = db
                .fetch_articles(&ArticleQuery {
                    source: Some("other.example.org".to_string()),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(page.total, 1);
            assert_eq!(page.data[0].title, "Elsewhere");
        }

        #[tokio::test]
        async fn test_time_window_excludes_old_articles() {
            let db = create_test_db().await;
            let source_id = db
                .ensure_source(&source_config("S", "https://s.example.com/", None))
                .await
                .unwrap();

            let fresh = NewArticle {
                title: "Fresh".to_string(),
                summary: None,
                original_url: "https://s.example.com/fresh".to_string(),
                published_at: Some(Utc::now() - Duration::hours(2)),
            };
            let stale = NewArticle {
                title: "Stale".to_string(),
                summary: None,
                original_url: "https://s.example.com/stale".to_string(),
                published_at: Some(Utc::now() - Duration::days(10)),
            };
            db.upsert_article(source_id, &fresh).await.unwrap();
            db.upsert_article(source_id, &stale).await.unwrap();

            let day = db
                .fetch_articles(&ArticleQuery {
                    time_window: Some(TimeWindow::Day),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(day.total, 1);
            assert_eq!(day.data[0].title, "Fresh");

            let month = db
                .fetch_articles(&ArticleQuery {
                    time_window: Some(TimeWindow::Month),
                    ..Default::default()
                })
                .await
                .unwrap();
            assert_eq!(month.total, 2);
        }

        #[tokio::test]
        async fn test_invalid_page_rejected() {
            let db = create_test_db().await;
            let result = db
                .fetch_articles(&ArticleQuery {
                    page: 0,
                    ..Default::default()
                })
                .await;
            assert!(matches!(result, Err(StoreError::InvalidQuery(_))));
        }

        #[tokio::test]
        async fn test_invalid_page_size_rejected() {
            let db = create_test_db().await;
            let result = db
                .fetch_articles(&ArticleQuery {
                    page_size: 0,
                    ..Default::default()
                })
                .await;
            assert!(matches!(result, Err(StoreError::InvalidQuery(_))));
        }

        #[tokio::test]
        async fn test_offset_beyond_count_is_empty() {
            let db = create_test_db().await;
            seed_articles(&db, 3).await;

            let page = db
                .fetch_articles(&ArticleQuery {
                    page: 50,
                    ..Default::default()
                })
                .await
                .unwrap();
            assert!(page.data.is_empty());
            assert_eq!(page.total, 3);
        }
    }

    mod sort_field_tests {
        use super::*;

        #[test]
        fn test_parse_known_fields() {
            assert_eq!(SortField::parse("published_at").unwrap(), SortField::PublishedAt);
            assert_eq!(
                SortField::parse("popularity_score").unwrap(),
                SortField::PopularityScore
            );
            assert_eq!(SortField::parse("growth_score").unwrap(), SortField::GrowthScore);
        }

        #[test]
        fn test_parse_unknown_field_is_hard_error() {
            let result = SortField::parse("not_exists");
            assert!(matches!(result, Err(StoreError::InvalidSort(_))));
        }

        #[test]
        fn test_time_window_parse() {
            assert_eq!(TimeWindow::parse("24h"), Some(TimeWindow::Day));
            assert_eq!(TimeWindow::parse("7d"), Some(TimeWindow::Week));
            assert_eq!(TimeWindow::parse("30d"), Some(TimeWindow::Month));
            assert_eq!(TimeWindow::parse("1y"), None);
        }
    }

    mod feedback_tests {
        use super::*;

        #[tokio::test]
        async fn test_feedback_round_trip() {
            let db = create_test_db().await;
            db.add_feedback("Broken link", Some("The OSChina feed 404s"), Some("a@b.c"))
                .await
                .unwrap();
            db.add_feedback("Feature request", None, None).await.unwrap();

            let rows = db.recent_feedback(10).await.unwrap();
            assert_eq!(rows.len(), 2);
            // Most recent first; equal timestamps fall back to id DESC
            assert_eq!(rows[0].title, "Feature request");
        }
    }

    mod user_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_and_fetch_user() {
            let db = create_test_db().await;
            db.create_user("a@example.com", "hash").await.unwrap();

            let user = db.get_user_by_email("a@example.com").await.unwrap().unwrap();
            assert_eq!(user.password_hash, "hash");
            assert!(db.get_user_by_email("missing@example.com").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_email_is_constraint_violation() {
            let db = create_test_db().await;
            db.create_user("a@example.com", "hash").await.unwrap();

            let result = db.create_user("a@example.com", "other").await;
            assert!(matches!(result, Err(StoreError::ConstraintViolation)));
        }
    }
}
