use chrono::{NaiveDate, NaiveTime};
use mentorbook_common::{BookingStatus, SessionType, UserRole};
use mentorbook_database::{
    connect_url, MentorSync, MigrationRunner, NewAccount, NewBooking, PgStore, Store,
};
use rust_decimal::Decimal;

#[tokio::test]
async fn test_pg_store_role_sync_and_transitions() {
    // Skip test if no database is available
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            println!("Skipping database test - DATABASE_URL not set");
            return;
        }
    };

    let pool = connect_url(&url, 5).await.expect("Failed to connect to test database");
    let runner = MigrationRunner::new(pool.clone());
    runner.run_all_migrations().await.expect("Failed to run migrations");

    let status = runner.check_migration_status().await.expect("Failed to read status");
    assert!(status.is_up_to_date, "{}", status);

    let store = PgStore::new(pool);
    let suffix = uuid::Uuid::new_v4().simple().to_string();

    let (mentee, _) = store
        .create_account(NewAccount {
            username: format!("mentee_{}", suffix),
            email: format!("mentee_{}@example.com", suffix),
            hashed_password: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Mentee,
        })
        .await
        .expect("Failed to create mentee");

    let (mentor_account, sync) = store
        .create_account(NewAccount {
            username: format!("mentor_{}", suffix),
            email: format!("mentor_{}@example.com", suffix),
            hashed_password: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Mentor,
        })
        .await
        .expect("Failed to create mentor");
    assert_eq!(sync, MentorSync::Created);

    let duplicate = store
        .create_account(NewAccount {
            username: format!("mentor_{}", suffix),
            email: format!("other_{}@example.com", suffix),
            hashed_password: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
            role: UserRole::Mentee,
        })
        .await;
    assert!(matches!(duplicate, Err(mentorbook_common::AppError::Validation(_))));

    let mentor = store
        .find_mentor_by_user(mentor_account.user.user_id)
        .await
        .unwrap()
        .expect("mentor record provisioned");
    assert_eq!(mentor.hourly_rate, Decimal::new(5000, 2));

    let booking = store
        .create_booking(NewBooking {
            mentee_id: mentee.user.user_id,
            mentor_id: mentor.mentor_id,
            session_type: SessionType::VideoCall,
            session_date: NaiveDate::from_ymd_opt(2030, 1, 15).unwrap(),
            session_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            duration_minutes: 60,
            topic: "Rust".into(),
            description: None,
            meeting_link: None,
            notes: None,
            total_amount: Decimal::new(5000, 2),
        })
        .await
        .expect("Failed to create booking");

    let confirmed = store
        .transition_booking(booking.booking_id, &[BookingStatus::Pending], BookingStatus::Confirmed)
        .await
        .unwrap();
    assert_eq!(confirmed.map(|b| b.status), Some(BookingStatus::Confirmed));

    let stale = store
        .transition_booking(booking.booking_id, &[BookingStatus::Pending], BookingStatus::Cancelled)
        .await
        .unwrap();
    assert!(stale.is_none());

    let mut profile = mentor_account.profile.clone();
    profile.role = UserRole::Mentee;
    let (_, sync) = store
        .save_account(&mentor_account.user, &profile)
        .await
        .expect("Failed to save profile");
    assert_eq!(sync, MentorSync::Removed { bookings: 1, reviews: 0 });
    assert!(store.find_booking(booking.booking_id).await.unwrap().is_none());
}
