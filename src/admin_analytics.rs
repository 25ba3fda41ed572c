use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::error::ApiError;
use crate::middleware::require_admin;
use crate::models::message::MessageFilter;
use crate::models::project::ProjectFilter;
use crate::models::user::UserFilter;
use crate::models::{ProjectStatus, Role};

const SERIES_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Serialize)]
pub struct Bucket {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnalytics {
    pub total: u64,
    pub active: u64,
    pub inactive: u64,
    pub by_role: Vec<Bucket>,
    pub new_last_7_days: u64,
    pub daily: Vec<DailyPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectAnalytics {
    pub total: u64,
    pub by_status: Vec<Bucket>,
    pub by_category: Vec<Bucket>,
    pub new_last_7_days: u64,
    pub daily: Vec<DailyPoint>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAnalytics {
    pub total: u64,
    pub flagged: u64,
    pub conversations: u64,
    pub new_last_7_days: u64,
    pub daily: Vec<DailyPoint>,
}

fn start_of(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// The last `days` calendar days (UTC), oldest first, as half-open ranges.
pub fn day_windows(today: NaiveDate, days: i64) -> Vec<(NaiveDate, DateTime<Utc>, DateTime<Utc>)> {
    (0..days)
        .rev()
        .map(|back| {
            let day = today - Duration::days(back);
            (day, start_of(day), start_of(day + Duration::days(1)))
        })
        .collect()
}

fn series_start() -> DateTime<Utc> {
    start_of(Utc::now().date_naive() - Duration::days(SERIES_DAYS - 1))
}

/// GET /api/admin/user-analytics
pub async fn user_analytics(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let store = data.store.as_ref();

    let total = store.count_users(&UserFilter::default()).await?;
    let active = store
        .count_users(&UserFilter {
            active: Some(true),
            ..Default::default()
        })
        .await?;
    let mut by_role = Vec::new();
    for role in [Role::User, Role::Admin] {
        by_role.push(Bucket {
            label: role.as_str().to_string(),
            count: store
                .count_users(&UserFilter {
                    role: Some(role),
                    ..Default::default()
                })
                .await?,
        });
    }

    let mut daily = Vec::new();
    for (date, from, to) in day_windows(Utc::now().date_naive(), SERIES_DAYS) {
        let count = store
            .count_users(&UserFilter {
                created_after: Some(from),
                created_before: Some(to),
                ..Default::default()
            })
            .await?;
        daily.push(DailyPoint { date, count });
    }
    let new_last_7_days = store
        .count_users(&UserFilter {
            created_after: Some(series_start()),
            ..Default::default()
        })
        .await?;

    Ok(HttpResponse::Ok().json(UserAnalytics {
        total,
        active,
        inactive: total.saturating_sub(active),
        by_role,
        new_last_7_days,
        daily,
    }))
}

/// GET /api/admin/project-analytics
pub async fn project_analytics(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let store = data.store.as_ref();

    let total = store.count_projects(&ProjectFilter::default()).await?;
    let mut by_status = Vec::new();
    for status in ProjectStatus::ALL {
        by_status.push(Bucket {
            label: status.as_str().to_string(),
            count: store
                .count_projects(&ProjectFilter {
                    status: Some(status),
                    ..Default::default()
                })
                .await?,
        });
    }
    let mut by_category = Vec::new();
    for category in store.project_categories().await? {
        let count = store
            .count_projects(&ProjectFilter {
                category: Some(category.clone()),
                ..Default::default()
            })
            .await?;
        by_category.push(Bucket {
            label: category,
            count,
        });
    }

    // created in [from, to) = created since `from` minus created since `to`
    let mut daily = Vec::new();
    for (date, from, to) in day_windows(Utc::now().date_naive(), SERIES_DAYS) {
        let since_from = store
            .count_projects(&ProjectFilter {
                created_after: Some(from),
                ..Default::default()
            })
            .await?;
        let since_to = store
            .count_projects(&ProjectFilter {
                created_after: Some(to),
                ..Default::default()
            })
            .await?;
        daily.push(DailyPoint {
            date,
            count: since_from.saturating_sub(since_to),
        });
    }
    let new_last_7_days = store
        .count_projects(&ProjectFilter {
            created_after: Some(series_start()),
            ..Default::default()
        })
        .await?;

    Ok(HttpResponse::Ok().json(ProjectAnalytics {
        total,
        by_status,
        by_category,
        new_last_7_days,
        daily,
    }))
}

/// GET /api/admin/message-analytics
pub async fn message_analytics(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    require_admin(&req)?;
    let store = data.store.as_ref();

    let total = store.count_messages(&MessageFilter::default()).await?;
    let flagged = store
        .count_messages(&MessageFilter {
            flagged: Some(true),
            ..Default::default()
        })
        .await?;
    let mut daily = Vec::new();
    for (date, from, to) in day_windows(Utc::now().date_naive(), SERIES_DAYS) {
        let count = store
            .count_messages(&MessageFilter {
                created_after: Some(from),
                created_before: Some(to),
                ..Default::default()
            })
            .await?;
        daily.push(DailyPoint { date, count });
    }
    let new_last_7_days = store
        .count_messages(&MessageFilter {
            created_after: Some(series_start()),
            ..Default::default()
        })
        .await?;

    Ok(HttpResponse::Ok().json(MessageAnalytics {
        total,
        flagged,
        conversations: store.count_conversations().await?,
        new_last_7_days,
        daily,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_cover_the_last_week_oldest_first() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let windows = day_windows(today, 7);
        assert_eq!(windows.len(), 7);
        assert_eq!(windows[0].0, NaiveDate::from_ymd_opt(2024, 2, 25).unwrap());
        assert_eq!(windows[6].0, today);
        let (_, from, to) = windows[6];
        assert_eq!(to - from, Duration::days(1));
    }
}
