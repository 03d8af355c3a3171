pub mod chat;
pub mod contributors;
pub mod ideas;
pub mod milestones;
pub mod payments;
pub mod tasks;
pub mod timelines;
pub mod users;
pub mod verifications;

pub(crate) fn calculate_total_pages(total_count: i64, limit: i64) -> i64 {
  if limit <= 0 {
    return 0;
  }

  (total_count as f64 / limit as f64).ceil() as i64
}

/// Clamps user supplied paging values to something the database can serve.
pub(crate) fn page_bounds(page: i64, limit: i64) -> (i64, i64) {
  (page.max(1), limit.clamp(1, 100))
}

/// Rows to skip for a 1-based page. Pages past the end saturate instead of overflowing.
pub(crate) fn page_offset(page: i64, limit: i64) -> i64 {
  page.saturating_sub(1).saturating_mul(limit)
}
