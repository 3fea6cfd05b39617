use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::types::JobSummary;

/// One page of the merged job list.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<JobSummary>,
    /// Zero-based, clamped to the last page.
    pub page: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
}

/// Merges the active and recent lists of one response into the display order:
/// non-terminal jobs first, then terminal ones, each group newest first.
///
/// A job present in both lists (it finished between the server's two reads)
/// is kept once, preferring the terminal copy.
pub fn merge_and_sort(active: Vec<JobSummary>, recent: Vec<JobSummary>) -> Vec<JobSummary> {
    let mut by_id: HashMap<Uuid, JobSummary> = HashMap::with_capacity(active.len() + recent.len());
    for job in active.into_iter().chain(recent) {
        match by_id.get(&job.id) {
            Some(existing) if existing.status.is_terminal() && !job.status.is_terminal() => {}
            _ => {
                by_id.insert(job.id, job);
            }
        }
    }

    let mut jobs: Vec<JobSummary> = by_id.into_values().collect();
    jobs.sort_by(display_order);
    jobs
}

fn display_order(a: &JobSummary, b: &JobSummary) -> Ordering {
    a.status
        .is_terminal()
        .cmp(&b.status.is_terminal())
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Slices an already sorted list. Never fetches.
pub fn paginate(jobs: &[JobSummary], page: usize, page_size: usize) -> Page {
    let page_size = page_size.max(1);
    let total_items = jobs.len();
    let total_pages = total_items.div_ceil(page_size).max(1);
    let page = page.min(total_pages - 1);
    let start = page * page_size;
    let end = (start + page_size).min(total_items);
    let items = if start < end { jobs[start..end].to_vec() } else { Vec::new() };

    Page { items, page, page_size, total_items, total_pages }
}
