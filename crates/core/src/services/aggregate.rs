//! Statistics and dashboard rollups.
//!
//! Every function here is pure: it takes already-loaded rows and the current
//! time and returns a typed view. Empty inputs yield zeros and empty lists.

use std::collections::{BTreeMap, HashMap};

use appeals_db::entities::{
    appeal::{self, AppealStatus},
    category, service,
};
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::Serialize;

/// Days after creation by which an appeal should be resolved.
pub const DEADLINE_DAYS: i64 = 30;
/// Open appeals untouched this long are stale.
pub const STALE_DAYS: i64 = 7;
/// Age at which the deadline is considered close.
pub const WARNING_DAYS: i64 = 25;
/// Window for speed and heat-map figures.
pub const RECENT_WINDOW_DAYS: i64 = 90;

const DAILY_TREND_DAYS: i64 = 30;
const TREND_MONTHS: u32 = 6;
const TOP_BUCKETS: usize = 10;
const DASHBOARD_LIST_LIMIT: usize = 20;
const EXECUTOR_LIST_LIMIT: usize = 50;
const RECENT_APPEALS: usize = 10;

/// Bucket name for appeals without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";
/// Bucket name for appeals without a service.
pub const UNASSIGNED: &str = "Unassigned";

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Category and service names by ID.
#[derive(Debug, Clone, Default)]
pub struct Names {
    categories: HashMap<i64, String>,
    services: HashMap<i64, String>,
}

impl Names {
    #[must_use]
    pub fn new(categories: &[category::Model], services: &[service::Model]) -> Self {
        Self {
            categories: categories.iter().map(|c| (c.id, c.name.clone())).collect(),
            services: services.iter().map(|s| (s.id, s.name.clone())).collect(),
        }
    }

    fn category(&self, id: Option<i64>) -> String {
        match id {
            Some(id) => self
                .categories
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("Category {id}")),
            None => UNCATEGORIZED.to_string(),
        }
    }

    fn service(&self, id: Option<i64>) -> String {
        match id {
            Some(id) => self
                .services
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("Service {id}")),
            None => UNASSIGNED.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: AppealStatus,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedCount {
    /// `None` for the uncategorized/unassigned bucket
    pub id: Option<i64>,
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PriorityCount {
    pub priority: i16,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeekdayCount {
    /// 0 = Sunday
    pub day: u32,
    pub name: &'static str,
    pub count: u64,
}

/// Share of resolved appeals closed within the deadline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OnTimeStats {
    pub on_time_count: u64,
    pub total_completed: u64,
    /// 0-100; 0 when nothing is resolved
    pub on_time_percentage: f64,
}

impl OnTimeStats {
    fn from_appeals<'a>(appeals: impl IntoIterator<Item = &'a appeal::Model>) -> Self {
        let mut on_time_count = 0;
        let mut total_completed = 0;
        for appeal in appeals.into_iter().filter(|a| a.status.is_resolved()) {
            total_completed += 1;
            if appeal
                .closed_at
                .is_some_and(|closed| days_between(appeal.created_at, closed) <= DEADLINE_DAYS as f64)
            {
                on_time_count += 1;
            }
        }
        Self {
            on_time_count,
            total_completed,
            on_time_percentage: percentage(on_time_count, total_completed),
        }
    }
}

/// Compact appeal row used in dashboard lists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppealDigest {
    pub id: i64,
    pub title: String,
    pub status: AppealStatus,
    pub priority: i16,
    pub service_id: Option<i64>,
    pub service_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppealDigest {
    fn new(appeal: &appeal::Model, names: &Names) -> Self {
        Self {
            id: appeal.id,
            title: appeal.title.clone(),
            status: appeal.status,
            priority: appeal.priority,
            service_id: appeal.service_id,
            service_name: appeal.service_id.map(|id| names.service(Some(id))),
            created_at: appeal.created_at,
            updated_at: appeal.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverdueAppeal {
    #[serde(flatten)]
    pub appeal: AppealDigest,
    /// Whole days since creation
    pub days_overdue: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleAppeal {
    #[serde(flatten)]
    pub appeal: AppealDigest,
    /// Whole days since the last update
    pub days_stale: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApproachingAppeal {
    #[serde(flatten)]
    pub appeal: AppealDigest,
    pub days_remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAppeal {
    #[serde(flatten)]
    pub appeal: AppealDigest,
    pub days_since_creation: i64,
}

/// System-wide figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallStatistics {
    pub total: u64,
    /// Every status, zero counts included
    pub by_status: Vec<StatusCount>,
    pub by_category: Vec<NamedCount>,
    pub by_service: Vec<NamedCount>,
    pub by_priority: Vec<PriorityCount>,
    pub avg_processing_days: f64,
    pub overdue_count: u64,
    #[serde(flatten)]
    pub on_time: OnTimeStats,
    pub daily_trend: Vec<DailyCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatcherDashboard {
    pub overdue_appeals: Vec<OverdueAppeal>,
    pub stale_appeals: Vec<StaleAppeal>,
    pub approaching_appeals: Vec<ApproachingAppeal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceSpeed {
    pub service_id: i64,
    pub name: String,
    pub total_appeals: u64,
    pub avg_hours: f64,
    pub avg_days: f64,
}

/// Per-service breakdown on the admin dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServicePerformance {
    /// `None` for the unassigned bucket
    pub service_id: Option<i64>,
    pub name: String,
    pub total_appeals: u64,
    pub new_count: u64,
    pub assigned_count: u64,
    pub in_progress_count: u64,
    pub completed_count: u64,
    pub overdue_count: u64,
    pub avg_hours: f64,
    pub avg_days: f64,
    #[serde(flatten)]
    pub on_time: OnTimeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdminDashboard {
    pub top_services_by_speed: Vec<ServiceSpeed>,
    pub monthly_trend: Vec<MonthlyCount>,
    pub day_of_week_stats: Vec<WeekdayCount>,
    pub all_services_stats: Vec<ServicePerformance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorDashboard {
    pub services: Vec<ServiceRef>,
    pub active_appeals: Vec<ActiveAppeal>,
    /// Days, over appeals this executor resolved in the recent window
    pub my_avg_processing_time: f64,
    /// Days, over all appeals of the executor's services resolved in the recent window
    pub service_avg_processing_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceOverview {
    pub total_appeals: u64,
    pub new_count: u64,
    pub assigned_count: u64,
    pub in_progress_count: u64,
    /// Completed and closed
    pub completed_count: u64,
    pub rejected_count: u64,
    pub overdue_count: u64,
    pub avg_days: f64,
    #[serde(flatten)]
    pub on_time: OnTimeStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentAppeal {
    pub id: i64,
    pub title: String,
    pub status: AppealStatus,
    pub priority: i16,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceStatistics {
    pub service: service::Model,
    pub overall: ServiceOverview,
    pub monthly_trend: Vec<MonthlyCount>,
    pub status_distribution: Vec<StatusCount>,
    pub category_distribution: Vec<NamedCount>,
    pub recent_appeals: Vec<RecentAppeal>,
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 86_400.0
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / 3_600.0
}

fn whole_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_hours() / 24
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0_u64), |(sum, n), v| (sum + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn is_overdue(appeal: &appeal::Model, now: DateTime<Utc>) -> bool {
    appeal.status.is_open() && appeal.created_at < now - Duration::days(DEADLINE_DAYS)
}

/// Resolution time falling back to the last update when `closed_at` is missing.
fn settled_at(appeal: &appeal::Model) -> DateTime<Utc> {
    appeal.closed_at.unwrap_or(appeal.updated_at)
}

fn count_status(appeals: &[&appeal::Model], status: AppealStatus) -> u64 {
    appeals.iter().filter(|a| a.status == status).count() as u64
}

fn count_resolved(appeals: &[&appeal::Model]) -> u64 {
    appeals.iter().filter(|a| a.status.is_resolved()).count() as u64
}

fn top_buckets(
    appeals: &[appeal::Model],
    key: impl Fn(&appeal::Model) -> Option<i64>,
    name: impl Fn(Option<i64>) -> String,
) -> Vec<NamedCount> {
    let mut counts: HashMap<Option<i64>, u64> = HashMap::new();
    for appeal in appeals {
        *counts.entry(key(appeal)).or_default() += 1;
    }

    let mut buckets: Vec<NamedCount> = counts
        .into_iter()
        .map(|(id, count)| NamedCount {
            id,
            name: name(id),
            count,
        })
        .collect();
    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    buckets.truncate(TOP_BUCKETS);
    buckets
}

fn monthly_trend<'a>(
    appeals: impl IntoIterator<Item = &'a appeal::Model>,
    now: DateTime<Utc>,
) -> Vec<MonthlyCount> {
    let since = now
        .checked_sub_months(Months::new(TREND_MONTHS))
        .unwrap_or(now);
    let mut months: BTreeMap<String, u64> = BTreeMap::new();
    for appeal in appeals.into_iter().filter(|a| a.created_at >= since) {
        *months
            .entry(appeal.created_at.format("%Y-%m").to_string())
            .or_default() += 1;
    }
    months
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect()
}

/// Overall figures for the given rows.
#[must_use]
pub fn overall(appeals: &[appeal::Model], names: &Names, now: DateTime<Utc>) -> OverallStatistics {
    let all: Vec<&appeal::Model> = appeals.iter().collect();

    let by_status = AppealStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: count_status(&all, status),
        })
        .collect();

    let mut priorities: BTreeMap<i16, u64> = BTreeMap::new();
    for appeal in appeals {
        *priorities.entry(appeal.priority).or_default() += 1;
    }
    let by_priority = priorities
        .into_iter()
        .rev()
        .map(|(priority, count)| PriorityCount { priority, count })
        .collect();

    let avg_processing_days = mean(
        appeals
            .iter()
            .filter(|a| a.status.is_resolved())
            .filter_map(|a| a.closed_at.map(|closed| days_between(a.created_at, closed))),
    );

    let trend_since = now - Duration::days(DAILY_TREND_DAYS);
    let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for appeal in appeals.iter().filter(|a| a.created_at >= trend_since) {
        *days.entry(appeal.created_at.date_naive()).or_default() += 1;
    }

    OverallStatistics {
        total: appeals.len() as u64,
        by_status,
        by_category: top_buckets(appeals, |a| a.category_id, |id| names.category(id)),
        by_service: top_buckets(appeals, |a| a.service_id, |id| names.service(id)),
        by_priority,
        avg_processing_days,
        overdue_count: appeals.iter().filter(|a| is_overdue(a, now)).count() as u64,
        on_time: OnTimeStats::from_appeals(appeals),
        daily_trend: days
            .into_iter()
            .map(|(date, count)| DailyCount { date, count })
            .collect(),
    }
}

/// Deadline tracking lists for dispatchers.
#[must_use]
pub fn dispatcher(
    appeals: &[appeal::Model],
    names: &Names,
    now: DateTime<Utc>,
) -> DispatcherDashboard {
    let deadline = now - Duration::days(DEADLINE_DAYS);
    let warning = now - Duration::days(WARNING_DAYS);
    let stale_before = now - Duration::days(STALE_DAYS);

    let mut open: Vec<&appeal::Model> = appeals.iter().filter(|a| a.status.is_open()).collect();
    open.sort_by_key(|a| (a.created_at, a.id));

    let overdue_appeals = open
        .iter()
        .filter(|a| a.created_at < deadline)
        .take(DASHBOARD_LIST_LIMIT)
        .map(|a| OverdueAppeal {
            appeal: AppealDigest::new(a, names),
            days_overdue: whole_days(a.created_at, now),
        })
        .collect();

    let approaching_appeals = open
        .iter()
        .filter(|a| a.created_at >= deadline && a.created_at < warning)
        .take(DASHBOARD_LIST_LIMIT)
        .map(|a| ApproachingAppeal {
            appeal: AppealDigest::new(a, names),
            days_remaining: DEADLINE_DAYS - whole_days(a.created_at, now),
        })
        .collect();

    let mut stale: Vec<&appeal::Model> = open
        .into_iter()
        .filter(|a| a.updated_at < stale_before)
        .collect();
    stale.sort_by_key(|a| (a.updated_at, a.id));
    let stale_appeals = stale
        .into_iter()
        .take(DASHBOARD_LIST_LIMIT)
        .map(|a| StaleAppeal {
            appeal: AppealDigest::new(a, names),
            days_stale: whole_days(a.updated_at, now),
        })
        .collect();

    DispatcherDashboard {
        overdue_appeals,
        stale_appeals,
        approaching_appeals,
    }
}

/// Service performance, trends and the weekday heat map.
///
/// `services` should contain every service so that inactive ones still get
/// a name. The breakdown has a row for each active service, each other
/// service that has appeals, and an `Unassigned` row when some appeals have
/// no service, so its totals add up to the number of appeals.
#[must_use]
pub fn admin(
    appeals: &[appeal::Model],
    services: &[service::Model],
    now: DateTime<Utc>,
) -> AdminDashboard {
    let window = now - Duration::days(RECENT_WINDOW_DAYS);

    let mut by_service: HashMap<i64, Vec<&appeal::Model>> = HashMap::new();
    let mut unassigned: Vec<&appeal::Model> = Vec::new();
    for appeal in appeals {
        match appeal.service_id {
            Some(service_id) => by_service.entry(service_id).or_default().push(appeal),
            None => unassigned.push(appeal),
        }
    }

    let mut top_services_by_speed: Vec<ServiceSpeed> = services
        .iter()
        .filter_map(|service| {
            let hours: Vec<f64> = by_service
                .get(&service.id)?
                .iter()
                .filter(|a| a.status.is_resolved() && settled_at(a) >= window)
                .map(|a| hours_between(a.created_at, settled_at(a)))
                .collect();
            if hours.is_empty() {
                return None;
            }
            let total_appeals = hours.len() as u64;
            let avg_hours = mean(hours);
            Some(ServiceSpeed {
                service_id: service.id,
                name: service.name.clone(),
                total_appeals,
                avg_hours,
                avg_days: avg_hours / 24.0,
            })
        })
        .collect();
    top_services_by_speed.sort_by(|a, b| {
        a.avg_hours
            .total_cmp(&b.avg_hours)
            .then_with(|| a.name.cmp(&b.name))
    });
    top_services_by_speed.truncate(TOP_BUCKETS);

    let mut weekdays = [0_u64; 7];
    for appeal in appeals.iter().filter(|a| a.created_at >= window) {
        weekdays[appeal.created_at.weekday().num_days_from_sunday() as usize] += 1;
    }
    let day_of_week_stats = weekdays
        .iter()
        .zip(WEEKDAY_NAMES)
        .zip(0_u32..)
        .map(|((count, name), day)| WeekdayCount {
            day,
            name,
            count: *count,
        })
        .collect();

    let names = Names::new(&[], services);
    let mut listed: Vec<i64> = services
        .iter()
        .filter(|s| s.is_active)
        .map(|s| s.id)
        .chain(by_service.keys().copied())
        .collect();
    listed.sort_unstable();
    listed.dedup();

    let mut all_services_stats: Vec<ServicePerformance> = listed
        .into_iter()
        .map(|id| {
            let rows = by_service.get(&id).map_or(&[][..], Vec::as_slice);
            performance(Some(id), names.service(Some(id)), rows, now)
        })
        .collect();
    all_services_stats.sort_by(|a, b| a.name.cmp(&b.name));
    if !unassigned.is_empty() {
        all_services_stats.push(performance(None, names.service(None), &unassigned, now));
    }

    AdminDashboard {
        top_services_by_speed,
        monthly_trend: monthly_trend(appeals, now),
        day_of_week_stats,
        all_services_stats,
    }
}

fn performance(
    service_id: Option<i64>,
    name: String,
    rows: &[&appeal::Model],
    now: DateTime<Utc>,
) -> ServicePerformance {
    let avg_hours = mean(
        rows.iter()
            .filter(|a| a.status.is_resolved())
            .map(|a| hours_between(a.created_at, settled_at(a))),
    );
    ServicePerformance {
        service_id,
        name,
        total_appeals: rows.len() as u64,
        new_count: count_status(rows, AppealStatus::New),
        assigned_count: count_status(rows, AppealStatus::Assigned),
        in_progress_count: count_status(rows, AppealStatus::InProgress),
        completed_count: count_resolved(rows),
        overdue_count: rows.iter().filter(|a| is_overdue(a, now)).count() as u64,
        avg_hours,
        avg_days: avg_hours / 24.0,
        on_time: OnTimeStats::from_appeals(rows.iter().copied()),
    }
}

/// Work queue and speed comparison for an executor.
///
/// `appeals` are the appeals of the executor's services; `resolved_by_me` are
/// the appeals the executor moved to `completed` or `closed`, each once.
#[must_use]
pub fn executor(
    services: &[service::Model],
    appeals: &[appeal::Model],
    resolved_by_me: &[appeal::Model],
    now: DateTime<Utc>,
) -> ExecutorDashboard {
    let window = now - Duration::days(RECENT_WINDOW_DAYS);
    let names = Names::new(&[], services);

    let mut active: Vec<&appeal::Model> = appeals.iter().filter(|a| a.status.is_open()).collect();
    active.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    let recent_resolution_days = |a: &appeal::Model| {
        a.closed_at
            .filter(|closed| *closed >= window)
            .map(|closed| days_between(a.created_at, closed))
    };

    ExecutorDashboard {
        services: services
            .iter()
            .map(|s| ServiceRef {
                id: s.id,
                name: s.name.clone(),
            })
            .collect(),
        active_appeals: active
            .into_iter()
            .take(EXECUTOR_LIST_LIMIT)
            .map(|a| ActiveAppeal {
                appeal: AppealDigest::new(a, &names),
                days_since_creation: whole_days(a.created_at, now),
            })
            .collect(),
        my_avg_processing_time: mean(resolved_by_me.iter().filter_map(recent_resolution_days)),
        service_avg_processing_time: mean(
            appeals
                .iter()
                .filter(|a| a.status.is_resolved())
                .filter_map(recent_resolution_days),
        ),
    }
}

/// Detailed figures for one service. `appeals` must all belong to it.
#[must_use]
pub fn service_statistics(
    service: &service::Model,
    appeals: &[appeal::Model],
    names: &Names,
    now: DateTime<Utc>,
) -> ServiceStatistics {
    let rows: Vec<&appeal::Model> = appeals.iter().collect();

    let overall = ServiceOverview {
        total_appeals: rows.len() as u64,
        new_count: count_status(&rows, AppealStatus::New),
        assigned_count: count_status(&rows, AppealStatus::Assigned),
        in_progress_count: count_status(&rows, AppealStatus::InProgress),
        completed_count: count_resolved(&rows),
        rejected_count: count_status(&rows, AppealStatus::Rejected),
        overdue_count: rows.iter().filter(|a| is_overdue(a, now)).count() as u64,
        avg_days: mean(
            rows.iter()
                .filter(|a| a.status.is_resolved())
                .map(|a| days_between(a.created_at, settled_at(a))),
        ),
        on_time: OnTimeStats::from_appeals(rows.iter().copied()),
    };

    let mut status_distribution: Vec<StatusCount> = AppealStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: count_status(&rows, status),
        })
        .filter(|s| s.count > 0)
        .collect();
    status_distribution.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.status.cmp(&b.status)));

    let category_distribution = top_buckets(appeals, |a| a.category_id, |id| names.category(id));

    let mut recent = rows.clone();
    recent.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
    let recent_appeals = recent
        .into_iter()
        .take(RECENT_APPEALS)
        .map(|a| RecentAppeal {
            id: a.id,
            title: a.title.clone(),
            status: a.status,
            priority: a.priority,
            created_at: a.created_at,
            closed_at: a.closed_at,
        })
        .collect();

    ServiceStatistics {
        service: service.clone(),
        overall,
        monthly_trend: monthly_trend(appeals, now),
        status_distribution,
        category_distribution,
        recent_appeals,
    }
}
