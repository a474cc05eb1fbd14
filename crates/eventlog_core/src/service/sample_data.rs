//! Sample event generation for demos and manual testing.
//!
//! Due dates are spread across short, medium, long and overdue buckets
//! (30/40/20/10 percent) so list ordering and overdue rendering have
//! something to show.

use crate::model::event::{Event, NewEvent};
use crate::model::timestamp::{self, Timestamp};
use crate::repo::event_repo::EventRepository;
use crate::service::lifecycle_service::{LifecycleResult, LifecycleService};
use chrono::Duration;
use log::info;
use rand::seq::SliceRandom;
use rand::Rng;

const TITLE_TEMPLATES: &[&str] = &[
    "Finish project report",
    "Attend team meeting",
    "Reply to important email",
    "Prepare presentation",
    "Code review",
    "Learn a new technology",
    "Organize documents",
    "Workout",
    "Read a professional book",
    "Buy office supplies",
    "Plan next week",
    "Update resume",
    "Contact client",
    "Fix bug",
    "Optimize performance",
    "Prepare for interview",
    "Clean up inbox",
    "Attend training",
    "Summarize work results",
    "Plan new project",
    "Update system docs",
    "Join product discussion",
    "Write user manual",
    "Maintain server",
    "Design database",
];

const DESCRIPTION_TEMPLATES: &[&str] = &[
    "An important task that needs careful work.",
    "Coordinate with team members to finish this.",
    "Make sure to submit before the deadline.",
    "Keep detailed notes of the process.",
    "May need overtime to complete.",
    "Plan the time for this carefully.",
    "Remember to share progress with stakeholders.",
    "Prepare a detailed execution plan.",
];

/// Weighted toward medium priority.
const PRIORITY_POOL: &[i64] = &[1, 1, 2, 2, 2, 3, 3];

/// Creates `count` active sample events through the lifecycle service.
pub fn generate_sample_events<R, G>(
    service: &LifecycleService<R>,
    count: usize,
    rng: &mut G,
) -> LifecycleResult<Vec<Event>>
where
    R: EventRepository,
    G: Rng + ?Sized,
{
    let now = timestamp::now();
    let mut created = Vec::with_capacity(count);
    for index in 0..count {
        let input = sample_event(index, now, rng);
        created.push(service.create(&input)?);
    }

    info!(
        "event=sample_generate module=sample_data status=ok count={}",
        created.len()
    );
    Ok(created)
}

fn sample_event<G: Rng + ?Sized>(index: usize, now: Timestamp, rng: &mut G) -> NewEvent {
    let template = TITLE_TEMPLATES.choose(rng).copied().unwrap_or("Sample event");
    let title = if rng.gen_bool(0.7) {
        format!("{template} #{}", index + 1)
    } else {
        template.to_string()
    };
    let description = DESCRIPTION_TEMPLATES.choose(rng).map(|value| value.to_string());
    let priority = PRIORITY_POOL.choose(rng).copied();

    NewEvent {
        title,
        description,
        due_at: Some(timestamp::to_storage(&sample_due_at(now, rng))),
        time_hint: None,
        priority,
    }
}

fn sample_due_at<G: Rng + ?Sized>(now: Timestamp, rng: &mut G) -> Timestamp {
    let jitter = Duration::hours(rng.gen_range(0..24)) + Duration::minutes(rng.gen_range(0..60));
    let bucket: f64 = rng.gen();
    if bucket < 0.3 {
        now + Duration::days(rng.gen_range(1..=3)) + jitter
    } else if bucket < 0.7 {
        now + Duration::days(rng.gen_range(4..=14)) + jitter
    } else if bucket < 0.9 {
        now + Duration::days(rng.gen_range(15..=90)) + jitter
    } else {
        now - Duration::days(rng.gen_range(1..=30)) - jitter
    }
}
