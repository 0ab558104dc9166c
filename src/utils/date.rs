//! Calendar date helpers. Due dates have no time or timezone component.

use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::error::TaskError;

/// The format due dates are exchanged in
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Today's date on the system calendar
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `YYYY-MM-DD`
pub fn format_for_input(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// e.g. `Apr 16, 2025`
pub fn format_for_display(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

/// Parse a `YYYY-MM-DD` due date, rejecting anything else (including trailing times)
pub fn parse_due_date(text: &str) -> Result<NaiveDate, TaskError> {
    let text = text.trim();
    if has_date_shape(text) == false {
        return Err(TaskError::validation(format!("Invalid due date {:?}, expected YYYY-MM-DD", text)));
    }
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map_err(|err| TaskError::validation(format!("Invalid due date {:?}: {}", text, err)))
}

/// Exactly four digits, a dash, two digits, a dash and two digits
fn has_date_shape(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 10 && bytes.iter().enumerate().all(|(i, b)| match i {
        4 | 7 => *b == b'-',
        _ => b.is_ascii_digit(),
    })
}

pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
    date == today
}

pub fn is_future_date(date: NaiveDate, today: NaiveDate) -> bool {
    date > today
}

/// Whether `date` is in `(today, today + 7 days]`
pub fn is_within_next_week(date: NaiveDate, today: NaiveDate) -> bool {
    date > today && date <= today + Duration::days(7)
}

/// How many days `date` is behind `today` (negative when it is in the future)
pub fn days_overdue(date: NaiveDate, today: NaiveDate) -> i64 {
    (today - date).num_days()
}

/// e.g. `Apr 10 (6 days overdue)`
pub fn overdue_label(date: NaiveDate, today: NaiveDate) -> String {
    let days = days_overdue(date, today);
    let unit = if days == 1 { "day" } else { "days" };
    format!("{} ({} {} overdue)", date.format("%b %-d"), days, unit)
}


/// What is needed to lay out a month as a calendar grid
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonthDetails {
    pub year: i32,
    pub month: u32,
    /// 0 for Sunday, 6 for Saturday
    pub first_day_of_month: u32,
    pub days_in_month: u32,
    pub days_in_prev_month: u32,
    pub month_name: String,
}

/// `month` is 1-based. Returns `None` for an invalid month
pub fn month_details(year: i32, month: u32) -> Option<MonthDetails> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let days_in_month = days_in_month(year, month)?;
    let prev_last = first.pred_opt()?;

    Some(MonthDetails {
        year,
        month,
        first_day_of_month: first.weekday().num_days_from_sunday(),
        days_in_month,
        days_in_prev_month: prev_last.day(),
        month_name: first.format("%B").to_string(),
    })
}

fn days_in_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let next_first = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    Some(next_first.pred_opt()?.day())
}

/// A cell of a week-aligned month grid
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GridDay {
    /// Trailing day of the previous month
    Previous(u32),
    Current(NaiveDate),
    /// Leading day of the next month
    Next(u32),
}

impl MonthDetails {
    /// Every cell of the month, padded with the neighbouring months so that weeks start on Sunday
    pub fn grid(&self) -> Vec<GridDay> {
        let mut cells = Vec::new();
        for i in 0..self.first_day_of_month {
            cells.push(GridDay::Previous(self.days_in_prev_month - self.first_day_of_month + i + 1));
        }
        for day in 1..=self.days_in_month {
            if let Some(date) = NaiveDate::from_ymd_opt(self.year, self.month, day) {
                cells.push(GridDay::Current(date));
            }
        }
        let used = self.first_day_of_month + self.days_in_month;
        let total = ((used + 6) / 7) * 7;
        for day in 1..=(total - used) {
            cells.push(GridDay::Next(day));
        }
        cells
    }
}
