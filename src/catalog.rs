//! The course-catalog loading scenario: its raw inputs, task, and output tables.

use chrono::NaiveDate;

use crate::frame::DateFormat;
use crate::table::TableDescriptor;

pub const TASK_NAME: &str = "LoadInternalReportingCourseCatalogToWarehouse";
pub const RAW_NAMESPACE: &str = "discovery_api_raw";
pub const INPUT_DOCUMENTS: [&str; 3] = ["courses.json", "course_runs.json", "programs.json"];

pub fn default_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2016, 9, 8).unwrap_or_default()
}

pub fn program_course() -> TableDescriptor {
    TableDescriptor::new(
        "d_program_course",
        &[
            "program_id",
            "program_type",
            "program_title",
            "catalog_course",
            "catalog_course_title",
            "course_id",
            "org_id",
            "partner_short_code",
            "program_slot_number",
        ],
    )
    .order_by(&["course_id"])
}

pub fn course_seat() -> TableDescriptor {
    TableDescriptor::new(
        "d_course_seat",
        &[
            "course_id",
            "course_seat_type",
            "course_seat_price",
            "course_seat_currency",
            "course_seat_upgrade_deadline",
            "course_seat_credit_provider",
            "course_seat_credit_hours",
        ],
    )
    .order_by(&["course_id", "course_seat_type"])
    .with_dates(DateFormat::Timestamp, &["course_seat_upgrade_deadline"])
}

pub fn course() -> TableDescriptor {
    TableDescriptor::new(
        "d_course",
        &[
            "course_id",
            "catalog_course",
            "catalog_course_title",
            "start_time",
            "end_time",
            "enrollment_start_time",
            "enrollment_end_time",
            "content_language",
            "pacing_type",
            "level_type",
            "availability",
            "org_id",
            "partner_short_code",
            "marketing_url",
            "min_effort",
            "max_effort",
            "weeks_to_complete",
            "announcement_time",
            "reporting_type",
        ],
    )
    .order_by(&["course_id"])
    .with_dates(
        DateFormat::Timestamp,
        &[
            "start_time",
            "end_time",
            "enrollment_start_time",
            "enrollment_end_time",
            "announcement_time",
        ],
    )
}

/// Fetched with `SELECT *`; both sides are sorted by `row_number` after the fetch.
pub fn course_subjects() -> TableDescriptor {
    TableDescriptor::new(
        "d_course_subjects",
        &[
            "row_number",
            "course_id",
            "date",
            "subject_uri",
            "subject_title",
            "subject_language",
        ],
    )
    .sort_after_fetch("row_number")
    .with_dates(DateFormat::Date, &["date"])
}

/// Output tables in validation order.
pub fn tables() -> Vec<TableDescriptor> {
    vec![program_course(), course_seat(), course(), course_subjects()]
}
