//! Month view over task due dates and the one-task calendar hand-off.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{info, instrument};

use crate::model::Task;

const GOOGLE_RENDER_URL: &str = "https://www.google.com/calendar/render";
const EXPORT_DETAILS: &str = "Creado+desde+Hestia+AI";

/// Characters `encodeURIComponent` leaves alone.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const MONTH_NAMES: [&str; 12] = [
    "Enero",
    "Febrero",
    "Marzo",
    "Abril",
    "Mayo",
    "Junio",
    "Julio",
    "Agosto",
    "Septiembre",
    "Octubre",
    "Noviembre",
    "Diciembre",
];

pub fn month_name(month: u32) -> &'static str {
    MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("")
}

pub fn weekday_short(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lun",
        Weekday::Tue => "Mar",
        Weekday::Wed => "Mié",
        Weekday::Thu => "Jue",
        Weekday::Fri => "Vie",
        Weekday::Sat => "Sáb",
        Weekday::Sun => "Dom",
    }
}

pub fn parse_week_start(raw: &str) -> Option<Weekday> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "sunday" | "sun" | "domingo" => Some(Weekday::Sun),
        "monday" | "mon" | "lunes" => Some(Weekday::Mon),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell<'a> {
    pub date: NaiveDate,
    pub is_today: bool,
    pub tasks: Vec<&'a Task>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrid<'a> {
    pub year: i32,
    pub month: u32,
    pub week_start: Weekday,
    /// Blank cells before day 1.
    pub leading_blanks: usize,
    pub days: Vec<DayCell<'a>>,
}

impl MonthGrid<'_> {
    pub fn title(&self) -> String {
        format!("{} {}", month_name(self.month), self.year)
    }

    pub fn weekday_labels(&self) -> Vec<&'static str> {
        let mut day = self.week_start;
        (0..7)
            .map(|_| {
                let label = weekday_short(day);
                day = day.succ();
                label
            })
            .collect()
    }

    /// Rows of seven optional cells, padded at both ends.
    pub fn weeks(&self) -> Vec<Vec<Option<&DayCell<'_>>>> {
        let mut cells: Vec<Option<&DayCell<'_>>> = vec![None; self.leading_blanks];
        cells.extend(self.days.iter().map(Some));
        while cells.len() % 7 != 0 {
            cells.push(None);
        }
        cells.chunks(7).map(<[_]>::to_vec).collect()
    }
}

pub fn month_grid<'a>(
    focus: NaiveDate,
    week_start: Weekday,
    today: NaiveDate,
    tasks: &'a [Task],
) -> MonthGrid<'a> {
    let first = first_day_of_month(focus.year(), focus.month());
    let leading_blanks = (first - start_of_week(first, week_start)).num_days() as usize;

    let days = (0..days_in_month(focus.year(), focus.month()))
        .map(|offset| {
            let date = add_days(first, i64::from(offset));
            DayCell {
                date,
                is_today: date == today,
                tasks: tasks.iter().filter(|t| t.due_date == date).collect(),
            }
        })
        .collect();

    MonthGrid {
        year: focus.year(),
        month: focus.month(),
        week_start,
        leading_blanks,
        days,
    }
}

pub fn shift_months(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;

    while month < 1 {
        month += 12;
        year = year.saturating_sub(1);
    }
    while month > 12 {
        month -= 12;
        year = year.saturating_add(1);
    }

    let month = month as u32;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(date)
}

/// Parses `YYYY-MM` into the first day of that month.
pub fn parse_month(raw: &str) -> Option<NaiveDate> {
    let (year, month) = raw.trim().split_once('-')?;
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

fn first_day_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month >= 12 {
        (year.saturating_add(1), 1)
    } else {
        (year, month + 1)
    };
    add_days(first_day_of_month(next_year, next_month), -1).day()
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(Duration::days(days)).unwrap_or(date)
}

fn start_of_week(day: NaiveDate, week_start: Weekday) -> NaiveDate {
    let day_idx = i64::from(day.weekday().num_days_from_monday());
    let start_idx = i64::from(week_start.num_days_from_monday());
    add_days(day, -((7 + day_idx - start_idx) % 7))
}

/// Event-template link for a pending task; completed tasks have none.
pub fn google_calendar_url(task: &Task) -> Option<String> {
    if task.completed {
        return None;
    }
    let date = task.due_date.format("%Y%m%d").to_string();
    let text = utf8_percent_encode(&task.title, COMPONENT);
    Some(format!(
        "{GOOGLE_RENDER_URL}?action=TEMPLATE&text={text}&dates={date}/{date}&details={EXPORT_DETAILS}"
    ))
}

/// Hands the export link to the system browser.
#[instrument(skip(url))]
pub fn open_in_browser(url: &str) -> anyhow::Result<()> {
    open::that(url)?;
    info!("opened calendar export in browser");
    Ok(())
}
