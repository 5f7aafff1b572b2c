//! Availability resolver and window administration

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};

use crate::{
    config::ClinicConfig,
    error::{AppError, AppResult},
    models::{
        availability::{
            AvailabilityQuery, AvailableSlot, CreateAvailability, DaySlots, DoctorAvailability,
            UpdateAvailability,
        },
        enums::{AvailabilityStatus, Role},
    },
    repository::{availability::day_range, Repository},
    services::clinic_now,
};

/// Longest slot a caller may ask for, one day
pub const MAX_SLOT_MINUTES: i32 = 24 * 60;

/// Clinic opening hours applied on top of doctor availability
#[derive(Debug, Clone, Copy)]
pub struct BusinessHours {
    pub opening_hour: u32,
    pub closing_hour: u32,
}

impl BusinessHours {
    /// Monday to Friday
    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_open_at(&self, time: NaiveTime) -> bool {
        (self.opening_hour..self.closing_hour).contains(&time.hour())
    }

    pub fn admits(&self, at: NaiveDateTime) -> bool {
        self.is_business_day(at.date()) && self.is_open_at(at.time())
    }
}

impl From<&ClinicConfig> for BusinessHours {
    fn from(config: &ClinicConfig) -> Self {
        Self {
            opening_hour: config.opening_hour,
            closing_hour: config.closing_hour,
        }
    }
}

#[derive(Clone)]
pub struct AvailabilityService {
    repository: Repository,
    clinic: ClinicConfig,
}

impl AvailabilityService {
    pub fn new(repository: Repository, clinic: ClinicConfig) -> Self {
        Self { repository, clinic }
    }

    /// Open slots of a doctor between two dates (inclusive)
    pub async fn resolve(&self, doctor_id: i32, query: &AvailabilityQuery) -> AppResult<Vec<DaySlots>> {
        validate_range(query.from, query.to, self.clinic.max_resolve_days)?;
        validate_slot_minutes(query.slot_minutes)?;

        let pool = &self.repository.pool;
        self.repository
            .users
            .get_with_role(pool, doctor_id, Role::Doctor)
            .await?;

        let windows = self
            .repository
            .availability
            .list_active_for_doctor(pool, doctor_id)
            .await?;
        if windows.is_empty() {
            return Ok(Vec::new());
        }

        let (start, end) = day_range(query.from, query.to);
        let occupied = self
            .repository
            .appointments
            .occupied_slots(pool, doctor_id, start, end, None)
            .await?;

        let days = resolve_slots(
            &windows,
            &occupied,
            query.from,
            query.to,
            query.slot_minutes,
            BusinessHours::from(&self.clinic),
            clinic_now(),
        );
        tracing::debug!(doctor_id, days = days.len(), "Availability resolved");
        Ok(days)
    }

    /// All windows of a doctor
    pub async fn list_windows(&self, doctor_id: i32) -> AppResult<Vec<DoctorAvailability>> {
        let pool = &self.repository.pool;
        self.repository
            .users
            .get_with_role(pool, doctor_id, Role::Doctor)
            .await?;
        self.repository
            .availability
            .list_for_doctor(pool, doctor_id)
            .await
    }

    /// Create a weekly window
    pub async fn create_window(&self, request: CreateAvailability) -> AppResult<DoctorAvailability> {
        let interval = request
            .slot_interval_minutes
            .unwrap_or(self.clinic.default_slot_minutes);
        validate_window(
            request.day_of_week,
            request.start_time,
            request.end_time,
            interval,
            request.exception_start,
            request.exception_end,
        )?;

        self.repository
            .users
            .get_with_role(&self.repository.pool, request.doctor_id, Role::Doctor)
            .await?;

        let window = self.repository.availability.create(&request, interval).await?;
        tracing::info!(
            window_id = window.id,
            doctor_id = window.doctor_id,
            day_of_week = window.day_of_week,
            "Availability window created"
        );
        Ok(window)
    }

    /// Partially update a window
    pub async fn update_window(&self, id: i32, request: UpdateAvailability) -> AppResult<DoctorAvailability> {
        let mut window = self.repository.availability.get_by_id(id).await?;
        apply_window_update(&mut window, request);
        validate_window(
            window.day_of_week,
            window.start_time,
            window.end_time,
            window.slot_interval_minutes,
            window.exception_start,
            window.exception_end,
        )?;
        self.repository.availability.update(&window).await
    }

    /// Soft enable/disable a window
    pub async fn update_status(&self, id: i32, status: AvailabilityStatus) -> AppResult<DoctorAvailability> {
        let window = self.repository.availability.update_status(id, status).await?;
        tracing::info!(window_id = id, status = %status, "Availability status changed");
        Ok(window)
    }

    /// Delete a window no open appointment depends on
    pub async fn delete_window(&self, id: i32) -> AppResult<()> {
        let window = self.repository.availability.get_by_id(id).await?;
        if self.repository.availability.has_open_appointments(&window).await? {
            return Err(AppError::Conflict(
                "Window has booked appointments; change its status instead".to_string(),
            ));
        }
        self.repository.availability.delete(id).await?;
        tracing::info!(window_id = id, "Availability window deleted");
        Ok(())
    }
}

fn apply_window_update(window: &mut DoctorAvailability, request: UpdateAvailability) {
    if let Some(day) = request.day_of_week {
        window.day_of_week = day;
    }
    if let Some(start) = request.start_time {
        window.start_time = start;
    }
    if let Some(end) = request.end_time {
        window.end_time = end;
    }
    if let Some(interval) = request.slot_interval_minutes {
        window.slot_interval_minutes = interval;
    }
    if request.clear_exception {
        window.exception_start = None;
        window.exception_end = None;
        window.exception_reason = None;
    } else {
        if request.exception_start.is_some() {
            window.exception_start = request.exception_start;
        }
        if request.exception_end.is_some() {
            window.exception_end = request.exception_end;
        }
        if request.exception_reason.is_some() {
            window.exception_reason = request.exception_reason;
        }
    }
}

/// Check the shape of a weekly window
pub fn validate_window(
    day_of_week: i16,
    start_time: NaiveTime,
    end_time: NaiveTime,
    slot_interval_minutes: i32,
    exception_start: Option<NaiveDate>,
    exception_end: Option<NaiveDate>,
) -> AppResult<()> {
    if !(0..=6).contains(&day_of_week) {
        return Err(AppError::Validation(
            "day_of_week must be between 0 (Monday) and 6 (Sunday)".to_string(),
        ));
    }
    if start_time >= end_time {
        return Err(AppError::Validation(
            "start_time must be before end_time".to_string(),
        ));
    }
    if !(1..=MAX_SLOT_MINUTES).contains(&slot_interval_minutes) {
        return Err(AppError::Validation(format!(
            "slot_interval_minutes must be between 1 and {}",
            MAX_SLOT_MINUTES
        )));
    }
    if let (Some(start), Some(end)) = (exception_start, exception_end) {
        if start > end {
            return Err(AppError::Validation(
                "exception_start must not be after exception_end".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_slot_minutes(slot_minutes: Option<i32>) -> AppResult<()> {
    match slot_minutes {
        Some(minutes) if !(1..=MAX_SLOT_MINUTES).contains(&minutes) => Err(AppError::Validation(
            format!("slot_minutes must be between 1 and {}", MAX_SLOT_MINUTES),
        )),
        _ => Ok(()),
    }
}

fn validate_range(from: NaiveDate, to: NaiveDate, max_days: i64) -> AppResult<()> {
    if from > to {
        return Err(AppError::Validation("'from' must not be after 'to'".to_string()));
    }
    let days = (to - from).num_days() + 1;
    if days > max_days {
        return Err(AppError::Validation(format!(
            "Date range is limited to {} days",
            max_days
        )));
    }
    Ok(())
}

/// Candidate start times of one window on one date.
///
/// A slot is kept only when the whole interval ends at or before the window end.
pub fn window_slots(
    window: &DoctorAvailability,
    date: NaiveDate,
    slot_override: Option<i32>,
) -> Vec<NaiveDateTime> {
    let minutes = slot_override.unwrap_or(window.slot_interval_minutes);
    if minutes <= 0 {
        return Vec::new();
    }
    let step = Duration::minutes(minutes as i64);
    let end = date.and_time(window.end_time);

    let mut slots = Vec::new();
    let mut cursor = date.and_time(window.start_time);
    while let Some(next) = cursor.checked_add_signed(step) {
        if next > end {
            break;
        }
        slots.push(cursor);
        cursor = next;
    }
    slots
}

/// Start times offered on a date by all applicable windows, deduplicated and sorted
pub fn slots_on(
    windows: &[DoctorAvailability],
    date: NaiveDate,
    slot_override: Option<i32>,
) -> BTreeSet<NaiveDateTime> {
    windows
        .iter()
        .filter(|w| w.applies_on(date))
        .flat_map(|w| window_slots(w, date, slot_override))
        .collect()
}

/// Resolve open slots for `from..=to`.
///
/// Occupied start times, anything at or before `now` and anything outside
/// business hours are removed. Dates without open slots are omitted; the
/// result is chronological.
pub fn resolve_slots(
    windows: &[DoctorAvailability],
    occupied: &[NaiveDateTime],
    from: NaiveDate,
    to: NaiveDate,
    slot_override: Option<i32>,
    hours: BusinessHours,
    now: NaiveDateTime,
) -> Vec<DaySlots> {
    let occupied: BTreeSet<NaiveDateTime> = occupied.iter().copied().collect();
    let mut by_day: BTreeMap<NaiveDate, Vec<AvailableSlot>> = BTreeMap::new();

    let mut date = from;
    while date <= to {
        for slot in slots_on(windows, date, slot_override) {
            if slot <= now || occupied.contains(&slot) || !hours.admits(slot) {
                continue;
            }
            by_day.entry(date).or_default().push(AvailableSlot {
                date,
                time: slot.time(),
                available: true,
            });
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    by_day
        .into_iter()
        .map(|(date, slots)| DaySlots { date, slots })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn window(day_of_week: i16, start: NaiveTime, end: NaiveTime, interval: i32) -> DoctorAvailability {
        DoctorAvailability {
            id: 1,
            doctor_id: 10,
            day_of_week,
            start_time: start,
            end_time: end,
            slot_interval_minutes: interval,
            status: AvailabilityStatus::Active,
            exception_start: None,
            exception_end: None,
            exception_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn hours() -> BusinessHours {
        BusinessHours {
            opening_hour: 8,
            closing_hour: 18,
        }
    }

    fn long_ago() -> NaiveDateTime {
        day(2000, 1, 1).and_time(hm(0, 0))
    }

    #[test]
    fn test_monday_window_generates_half_hour_slots() {
        let windows = vec![window(0, hm(8, 0), hm(12, 0), 30)];
        let monday = day(2025, 3, 10);
        let days = resolve_slots(&windows, &[], monday, monday, None, hours(), long_ago());

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, monday);
        assert_eq!(days[0].slots.len(), 8);
        assert_eq!(days[0].slots[0].time, hm(8, 0));
        assert_eq!(days[0].slots[7].time, hm(11, 30));
        assert!(days[0].slots.iter().all(|s| s.available));
    }

    #[test]
    fn test_partial_trailing_slot_is_dropped() {
        let w = window(0, hm(8, 0), hm(9, 45), 30);
        let slots = window_slots(&w, day(2025, 3, 10), None);
        assert_eq!(slots.len(), 3);
        assert_eq!(slots.last().unwrap().time(), hm(9, 0));
    }

    #[test]
    fn test_no_active_windows_yields_empty_result() {
        let mut w = window(0, hm(8, 0), hm(12, 0), 30);
        w.status = AvailabilityStatus::OnLeave;
        let days = resolve_slots(&[w], &[], day(2025, 3, 1), day(2025, 3, 31), None, hours(), long_ago());
        assert!(days.is_empty());
        assert!(resolve_slots(&[], &[], day(2025, 3, 1), day(2025, 3, 31), None, hours(), long_ago()).is_empty());
    }

    #[test]
    fn test_occupied_and_past_slots_are_removed() {
        let windows = vec![window(0, hm(8, 0), hm(10, 0), 30)];
        let monday = day(2025, 3, 10);
        let occupied = vec![monday.and_time(hm(9, 0))];
        let now = monday.and_time(hm(8, 0));

        let days = resolve_slots(&windows, &occupied, monday, monday, None, hours(), now);
        let times: Vec<NaiveTime> = days[0].slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![hm(8, 30), hm(9, 30)]);
    }

    #[test]
    fn test_overlapping_windows_are_deduplicated() {
        let windows = vec![
            window(0, hm(8, 0), hm(10, 0), 30),
            window(0, hm(9, 0), hm(11, 0), 30),
        ];
        let monday = day(2025, 3, 10);
        let days = resolve_slots(&windows, &[], monday, monday, None, hours(), long_ago());
        let times: Vec<NaiveTime> = days[0].slots.iter().map(|s| s.time).collect();
        assert_eq!(
            times,
            vec![hm(8, 0), hm(8, 30), hm(9, 0), hm(9, 30), hm(10, 0), hm(10, 30)]
        );
    }

    #[test]
    fn test_exception_period_suppresses_dates() {
        let mut w = window(0, hm(8, 0), hm(9, 0), 30);
        w.exception_start = Some(day(2025, 3, 10));
        w.exception_end = Some(day(2025, 3, 16));
        let days = resolve_slots(&[w], &[], day(2025, 3, 10), day(2025, 3, 17), None, hours(), long_ago());
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, day(2025, 3, 17));
    }

    #[test]
    fn test_slot_override_and_chronological_order() {
        let windows = vec![
            window(2, hm(14, 0), hm(15, 0), 30),
            window(0, hm(8, 0), hm(9, 0), 30),
        ];
        let days = resolve_slots(&windows, &[], day(2025, 3, 10), day(2025, 3, 12), Some(20), hours(), long_ago());
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, day(2025, 3, 10));
        assert_eq!(days[1].date, day(2025, 3, 12));
        assert_eq!(days[0].slots.len(), 3);
        assert_eq!(days[1].slots[2].time, hm(14, 40));
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(0, hm(8, 0), hm(12, 0), 30, None, None).is_ok());
        assert!(validate_window(7, hm(8, 0), hm(12, 0), 30, None, None).is_err());
        assert!(validate_window(0, hm(12, 0), hm(8, 0), 30, None, None).is_err());
        assert!(validate_window(0, hm(8, 0), hm(12, 0), 0, None, None).is_err());
        assert!(validate_window(
            0,
            hm(8, 0),
            hm(12, 0),
            30,
            Some(day(2025, 3, 20)),
            Some(day(2025, 3, 10))
        )
        .is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range(day(2025, 3, 10), day(2025, 3, 10), 62).is_ok());
        assert!(validate_range(day(2025, 3, 11), day(2025, 3, 10), 62).is_err());
        assert!(validate_range(day(2025, 1, 1), day(2025, 3, 31), 62).is_err());
    }

    #[test]
    fn test_clear_exception_update() {
        let mut w = window(0, hm(8, 0), hm(12, 0), 30);
        w.exception_start = Some(day(2025, 3, 10));
        w.exception_end = Some(day(2025, 3, 12));
        apply_window_update(
            &mut w,
            UpdateAvailability {
                clear_exception: true,
                end_time: Some(hm(13, 0)),
                ..Default::default()
            },
        );
        assert_eq!(w.exception_start, None);
        assert_eq!(w.end_time, hm(13, 0));
    }

    #[test]
    fn test_weekend_and_off_hours_slots_are_not_offered() {
        let saturday = window(5, hm(9, 0), hm(11, 0), 30);
        let days = resolve_slots(&[saturday], &[], day(2025, 3, 15), day(2025, 3, 15), None, hours(), long_ago());
        assert!(days.is_empty());

        let early = window(0, hm(6, 0), hm(9, 0), 30);
        let monday = day(2025, 3, 10);
        let days = resolve_slots(&[early], &[], monday, monday, None, hours(), long_ago());
        let times: Vec<NaiveTime> = days[0].slots.iter().map(|s| s.time).collect();
        assert_eq!(times, vec![hm(8, 0), hm(8, 30)]);
    }

    #[test]
    fn test_huge_slot_lengths_do_not_overflow() {
        let w = window(0, hm(8, 0), hm(12, 0), 30);
        assert!(window_slots(&w, day(2025, 3, 10), Some(i32::MAX)).is_empty());

        let late = window(4, hm(23, 0), hm(23, 59), 30);
        let slots = window_slots(&late, NaiveDate::MAX, None);
        assert_eq!(slots, vec![NaiveDate::MAX.and_time(hm(23, 0))]);
    }

    #[test]
    fn test_slot_minutes_are_bounded() {
        assert!(validate_slot_minutes(None).is_ok());
        assert!(validate_slot_minutes(Some(30)).is_ok());
        assert!(validate_slot_minutes(Some(MAX_SLOT_MINUTES)).is_ok());
        assert!(validate_slot_minutes(Some(0)).is_err());
        assert!(validate_slot_minutes(Some(MAX_SLOT_MINUTES + 1)).is_err());
        assert!(validate_window(0, hm(8, 0), hm(12, 0), i32::MAX, None, None).is_err());
    }
}
