use std::env;
use std::sync::Arc;

use chrono::Utc;
use jobboard_backend::{
    database::pool::{create_pool, run_migrations},
    error::Error,
    models::guest_application::{ApplicationStatus, NewGuestApplication},
    services::application_repository::{ApplicationRepository, PgApplicationRepository},
    utils::token::issue_tracking_token,
};
use sqlx::PgPool;
use uuid::Uuid;

/// Needs a reachable Postgres in `DATABASE_URL`; without one the tests return early.
async fn pool() -> Option<PgPool> {
    dotenvy::dotenv().ok();
    let Ok(database_url) = env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres repository test");
        return None;
    };
    let pool = create_pool(&database_url).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    Some(pool)
}

async fn seed_job(pool: &PgPool) -> String {
    let job_id = format!("job-{}", Uuid::new_v4().simple());
    sqlx::query("INSERT INTO jobs (id, title, company_name) VALUES ($1, $2, $3)")
        .bind(&job_id)
        .bind("Backend Engineer")
        .bind("Acme")
        .execute(pool)
        .await
        .expect("seed job");
    job_id
}

async fn cleanup(pool: &PgPool, job_id: &str) {
    let _ = sqlx::query("DELETE FROM guest_applications WHERE job_id = $1")
        .bind(job_id)
        .execute(pool)
        .await;
    let _ = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(job_id)
        .execute(pool)
        .await;
}

fn new_application(job_id: &str, email: &str) -> NewGuestApplication {
    NewGuestApplication {
        job_id: job_id.into(),
        job_title: "Backend Engineer".into(),
        company_name: "Acme".into(),
        name: "A".into(),
        email: email.into(),
        phone: "1".into(),
        message: None,
        resume_ref: "resumes/1-a.pdf".into(),
        summary_ref: "summaries/application-x.pdf".into(),
        tracking_token: issue_tracking_token(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn unique_violation_maps_to_duplicate_under_concurrency() {
    let Some(pool) = pool().await else { return };
    let job_id = seed_job(&pool).await;
    let repo = Arc::new(PgApplicationRepository::new(pool.clone()));

    let attempts: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            let job_id = job_id.clone();
            let email = if i % 2 == 0 { "a@x.com" } else { "A@X.com" };
            tokio::spawn(async move { repo.create(new_application(&job_id, email)).await })
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => created += 1,
            Err(Error::DuplicateApplication) => duplicates += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let (rows,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM guest_applications WHERE job_id = $1")
            .bind(&job_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    cleanup(&pool, &job_id).await;

    assert_eq!(created, 1);
    assert_eq!(duplicates, 15);
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn tracking_lookup_and_status_update_round_trip() {
    let Some(pool) = pool().await else { return };
    let job_id = seed_job(&pool).await;
    let repo = PgApplicationRepository::new(pool.clone());

    let record = repo.create(new_application(&job_id, "a@x.com")).await.unwrap();
    assert_eq!(record.status, ApplicationStatus::Pending);

    let found = repo
        .find_by_tracking_token(&record.tracking_token, "A@X.COM")
        .await
        .unwrap();
    assert_eq!(found.id, record.id);

    let wrong_email = repo
        .find_by_tracking_token(&record.tracking_token, "b@x.com")
        .await
        .unwrap_err();
    let upper_token = repo
        .find_by_tracking_token(&record.tracking_token.to_uppercase(), "a@x.com")
        .await
        .unwrap_err();

    let updated = repo
        .update_status(record.id, ApplicationStatus::UnderReview)
        .await
        .unwrap();
    cleanup(&pool, &job_id).await;

    assert_eq!(wrong_email.to_string(), upper_token.to_string());
    assert!(matches!(wrong_email, Error::NotFound(_)));
    assert_eq!(updated.status, ApplicationStatus::UnderReview);
    assert_eq!(updated.id, record.id);
}
