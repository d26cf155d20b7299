use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A contiguous block of calendar days assigned to one worker.
///
/// The covered interval is `[start_date, end_date)` with `end_date` exclusive,
/// so two assignments produced for adjacent indices share a boundary date but
/// never a covered day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkAssignment {
    pub worker_index: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days_span: u32,
}

impl WorkAssignment {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date < self.end_date
    }

    /// Iterate every covered day, oldest first.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let start = self.start_date;
        (0..self.days_span as i64).map(move |offset| start + Duration::days(offset))
    }
}

/// Compute the date block for a worker, anchored at today's date.
///
/// Worker k owns the k-th most recent block of `num_days` days, so extra
/// workers extend coverage further into the past without overlapping days
/// already owned by lower indices.
pub fn partition(num_days: i64, worker_index: u32) -> Result<WorkAssignment> {
    partition_from(Utc::now().date_naive(), num_days, worker_index)
}

/// Same as [`partition`] but with an explicit anchor date.
pub fn partition_from(today: NaiveDate, num_days: i64, worker_index: u32) -> Result<WorkAssignment> {
    if num_days <= 0 {
        return Err(Error::InvalidArgument(format!(
            "num_days must be positive, got {}",
            num_days
        )));
    }

    let end_date = today - Duration::days(num_days * worker_index as i64);
    let start_date = end_date - Duration::days(num_days);

    Ok(WorkAssignment {
        worker_index,
        start_date,
        end_date,
        days_span: num_days as u32,
    })
}
