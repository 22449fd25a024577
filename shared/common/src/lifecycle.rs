//! Booking status transitions and session pricing.
//!
//! Every transition is a single edge: the action names the states it may
//! start from and the state it moves to. Storage applies the edge as a
//! conditional write, so the table below is the only source of truth for
//! which moves are legal.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{AppError, BookingStatus};

/// Statuses listed under `/bookings/upcoming`.
pub const UPCOMING_STATUSES: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

/// Statuses listed under `/bookings/past`.
pub const PAST_STATUSES: [BookingStatus; 2] = [BookingStatus::Completed, BookingStatus::Cancelled];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingAction {
    Accept,
    Decline,
    Complete,
    Cancel,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Decline => "decline",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }

    pub fn allowed_from(&self) -> &'static [BookingStatus] {
        match self {
            Self::Accept | Self::Decline => &[BookingStatus::Pending],
            Self::Complete => &[BookingStatus::Confirmed],
            Self::Cancel => &[BookingStatus::Pending, BookingStatus::Confirmed],
        }
    }

    pub fn target(&self) -> BookingStatus {
        match self {
            Self::Accept => BookingStatus::Confirmed,
            Self::Decline | Self::Cancel => BookingStatus::Cancelled,
            Self::Complete => BookingStatus::Completed,
        }
    }

    /// Cancel is open to both parties; everything else is the mentor's call.
    pub fn mentor_only(&self) -> bool {
        !matches!(self, Self::Cancel)
    }

    pub fn forbidden_message(&self) -> &'static str {
        match self {
            Self::Accept => "Only the mentor can accept this booking",
            Self::Decline => "Only the mentor can decline this booking",
            Self::Complete => "Only the mentor can complete this booking",
            Self::Cancel => "You can only cancel your own bookings",
        }
    }

    pub fn conflict_message(&self) -> &'static str {
        match self {
            Self::Accept => "Only pending bookings can be accepted",
            Self::Decline => "Only pending bookings can be declined",
            Self::Complete => "Only confirmed bookings can be completed",
            Self::Cancel => "This booking cannot be cancelled",
        }
    }

    pub fn permits(&self, current: BookingStatus) -> bool {
        self.allowed_from().contains(&current)
    }

    /// Resolves the next status, or a state conflict when `current` has no
    /// outgoing edge for this action.
    pub fn next_status(&self, current: BookingStatus) -> Result<BookingStatus, AppError> {
        if self.permits(current) {
            Ok(self.target())
        } else {
            Err(AppError::StateConflict(self.conflict_message().to_string()))
        }
    }
}

impl std::fmt::Display for BookingAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::NoShow)
    }
}

/// Largest amount a `NUMERIC(10, 2)` money column holds: 99,999,999.99.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Whether `amount` fits a `NUMERIC(10, 2)` column without rounding.
pub fn fits_money_column(amount: Decimal) -> bool {
    !amount.is_sign_negative() && amount <= MAX_AMOUNT && amount.normalize().scale() <= 2
}

/// Price of a session: hourly rate times booked hours, rounded to cents.
/// Totals that overflow or do not fit the money column are rejected.
pub fn session_total(hourly_rate: Decimal, duration_minutes: i32) -> Result<Decimal, AppError> {
    let too_large = || AppError::invalid_field("total_amount", "range", "Session total is too large");

    let mut total = hourly_rate
        .checked_mul(Decimal::from(duration_minutes))
        .and_then(|minutes| minutes.checked_div(Decimal::from(60)))
        .ok_or_else(too_large)?
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    total.rescale(2);

    if total > MAX_AMOUNT {
        return Err(too_large());
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    #[test]
    fn legal_edges() {
        assert_eq!(BookingAction::Accept.next_status(BookingStatus::Pending).unwrap(), BookingStatus::Confirmed);
        assert_eq!(BookingAction::Decline.next_status(BookingStatus::Pending).unwrap(), BookingStatus::Cancelled);
        assert_eq!(BookingAction::Complete.next_status(BookingStatus::Confirmed).unwrap(), BookingStatus::Completed);
        assert_eq!(BookingAction::Cancel.next_status(BookingStatus::Pending).unwrap(), BookingStatus::Cancelled);
        assert_eq!(BookingAction::Cancel.next_status(BookingStatus::Confirmed).unwrap(), BookingStatus::Cancelled);
    }

    #[test]
    fn terminal_states_have_no_outgoing_edges() {
        let actions = [
            BookingAction::Accept,
            BookingAction::Decline,
            BookingAction::Complete,
            BookingAction::Cancel,
        ];
        for status in ALL.iter().filter(|s| s.is_terminal()) {
            for action in actions {
                let err = action.next_status(*status).unwrap_err();
                assert!(matches!(err, AppError::StateConflict(_)), "{action} from {status}");
            }
        }
    }

    #[test]
    fn accept_twice_conflicts() {
        let confirmed = BookingAction::Accept.next_status(BookingStatus::Pending).unwrap();
        let err = BookingAction::Accept.next_status(confirmed).unwrap_err();
        assert_eq!(err.to_string(), "State conflict: Only pending bookings can be accepted");
    }

    #[test]
    fn only_cancel_is_open_to_mentees() {
        assert!(BookingAction::Accept.mentor_only());
        assert!(BookingAction::Decline.mentor_only());
        assert!(BookingAction::Complete.mentor_only());
        assert!(!BookingAction::Cancel.mentor_only());
    }

    #[test]
    fn total_is_rate_times_hours() {
        let rate = Decimal::from_str("60.00").unwrap();
        assert_eq!(session_total(rate, 90).unwrap().to_string(), "90.00");
        assert_eq!(session_total(rate, 60).unwrap().to_string(), "60.00");

        let odd = Decimal::from_str("50.00").unwrap();
        assert_eq!(session_total(odd, 25).unwrap().to_string(), "20.83");
    }

    #[test]
    fn oversized_totals_are_rejected() {
        match session_total(Decimal::MAX, 1440).unwrap_err() {
            AppError::Validation(errors) => assert!(errors.field_errors().contains_key("total_amount")),
            other => panic!("unexpected error: {other}"),
        }

        // The largest storable rate for a full day no longer fits the column.
        assert!(session_total(MAX_AMOUNT, 1440).is_err());
        assert_eq!(session_total(MAX_AMOUNT, 60).unwrap(), MAX_AMOUNT);
    }

    #[test]
    fn money_column_bounds() {
        assert_eq!(MAX_AMOUNT.to_string(), "99999999.99");
        assert!(fits_money_column(Decimal::from_str("60.50").unwrap()));
        assert!(fits_money_column(Decimal::from_str("60.500").unwrap()));
        assert!(!fits_money_column(Decimal::from_str("60.505").unwrap()));
        assert!(!fits_money_column(Decimal::from_str("100000000.00").unwrap()));
        assert!(!fits_money_column(Decimal::from_str("-1.00").unwrap()));
    }
}
