//! Read-only health battery against the live store. Exits 2 on missing
//! configuration, 1 if any check fails.

use std::process::ExitCode;
use std::time::Instant;

use newsriver::db::{ArticleQuery, Database, SortField};

fn log_result(results: &mut Vec<bool>, name: &str, ok: bool, info: String) {
    let badge = if ok { "PASS" } else { "FAIL" };
    println!("[{}] {} - {}", badge, name, info);
    results.push(ok);
}

async fn check_default_page(db: &Database, results: &mut Vec<bool>) {
    let name = "articles: default page order by published_at desc";
    let query = ArticleQuery {
        page_size: 10,
        ..Default::default()
    };
    match db.fetch_articles(&query).await {
        Ok(page) => {
            let ordered = page
                .data
                .windows(2)
                .all(|w| w[0].published_at >= w[1].published_at);
            let ok = ordered && page.total >= page.data.len() as i64;
            log_result(
                results,
                name,
                ok,
                format!("items={} total={}", page.data.len(), page.total),
            );
        }
        Err(e) => log_result(results, name, false, e.to_string()),
    }
}

async fn check_keyword_filter(db: &Database, results: &mut Vec<bool>) {
    let name = "articles: keyword filter (rare keyword -> 0 or few)";
    let query = ArticleQuery {
        page_size: 5,
        keyword: Some("unlikely_keyword_xyz987".to_string()),
        ..Default::default()
    };
    match db.fetch_articles(&query).await {
        Ok(page) => log_result(results, name, true, format!("items={}", page.data.len())),
        Err(e) => log_result(results, name, false, e.to_string()),
    }
}

fn check_invalid_sort(results: &mut Vec<bool>) {
    let name = "articles: invalid sort should error";
    match SortField::parse("not_exists") {
        Err(e) => log_result(results, name, true, e.to_string()),
        Ok(_) => log_result(results, name, false, "expected error but got none".to_string()),
    }
}

async fn check_feedback_readable(db: &Database, results: &mut Vec<bool>) {
    let name = "feedback: public readable";
    match db.recent_feedback(5).await {
        Ok(rows) => log_result(results, name, true, format!("items={}", rows.len())),
        Err(e) => log_result(results, name, false, e.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let Ok(database_url) = std::env::var("DATABASE_URL") else {
        eprintln!("[selftest] Missing DATABASE_URL");
        return ExitCode::from(2);
    };

    let db = match Database::new(&database_url).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("[selftest] Failed to open database: {}", e);
            return ExitCode::from(2);
        }
    };

    println!("[selftest] start");
    let start = Instant::now();
    let mut results = Vec::new();

    check_default_page(&db, &mut results).await;
    check_keyword_filter(&db, &mut results).await;
    check_invalid_sort(&mut results);
    check_feedback_readable(&db, &mut results).await;

    let passed = results.iter().filter(|ok| **ok).count();
    println!(
        "[selftest] done in {} ms - {}/{} passed",
        start.elapsed().as_millis(),
        passed,
        results.len()
    );

    if passed == results.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
