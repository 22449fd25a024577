use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use mentorbook_common::{AppError, BookingStatus, UserRole};

use crate::models::*;
use crate::store::*;

const MENTOR_SELECT: &str = r#"
    SELECT m.mentor_id, m.user_id,
           ARRAY(SELECT me.expertise_id FROM mentor_expertise me
                 WHERE me.mentor_id = m.mentor_id ORDER BY me.expertise_id) AS expertise_ids,
           m.experience_years, m.experience_level, m.company, m.position, m.hourly_rate,
           m.availability, m.is_verified, m.is_active, m.total_sessions, m.rating,
           m.created_at, m.updated_at
    FROM mentors m
"#;

/// Postgres-backed store. Constraint names match `migrations/0001_initial.sql`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_mentor(conn: &mut PgConnection, mentor_id: Uuid) -> Result<Option<Mentor>, AppError> {
        let sql = format!("{} WHERE m.mentor_id = $1", MENTOR_SELECT);
        Ok(sqlx::query_as::<_, Mentor>(&sql)
            .bind(mentor_id)
            .fetch_optional(conn)
            .await?)
    }
}

/// Turns constraint violations into field-level validation errors; anything
/// else stays a database error.
fn map_write_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        let field = match db_err.constraint() {
            Some("users_username_key") => Some(("username", "A user with that username already exists.")),
            Some("users_email_key") => Some(("email", "A user with that email already exists.")),
            Some("expertise_name_key") => Some(("name", "Expertise with this name already exists.")),
            Some("mentors_user_key") => Some(("user", "You already have a mentor profile")),
            Some("reviews_booking_key") | Some("reviews_mentee_booking_key") => {
                Some(("booking", "This booking has already been reviewed."))
            }
            Some("bookings_mentor_fkey") => Some(("mentor", "Mentor does not exist.")),
            Some("reviews_booking_fkey") => Some(("booking", "Booking does not exist.")),
            Some("mentor_expertise_expertise_fkey") => Some(("expertise_ids", "Unknown expertise.")),
            _ => None,
        };
        let code = match db_err.code().as_deref() {
            Some("23505") => Some("unique"),
            Some("23503") => Some("does_not_exist"),
            _ => None,
        };
        if let (Some((field, message)), Some(code)) = (field, code) {
            return AppError::invalid_field(field, code, message);
        }
    }
    AppError::Database(err)
}

/// Makes the mentor record agree with `role` for `user_id`.
async fn reconcile_mentor(conn: &mut PgConnection, user_id: Uuid, role: UserRole) -> Result<MentorSync, AppError> {
    if role == UserRole::Mentor {
        let mentor = Mentor::provisioned_for(user_id);
        let inserted = sqlx::query(
            r#"
            INSERT INTO mentors (mentor_id, user_id, experience_years, experience_level, hourly_rate,
                                 availability, is_verified, is_active, total_sessions, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(mentor.mentor_id)
        .bind(mentor.user_id)
        .bind(mentor.experience_years)
        .bind(mentor.experience_level.as_str())
        .bind(mentor.hourly_rate)
        .bind(&mentor.availability)
        .bind(mentor.is_verified)
        .bind(mentor.is_active)
        .bind(mentor.total_sessions)
        .bind(mentor.rating)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        return Ok(if inserted > 0 { MentorSync::Created } else { MentorSync::Unchanged });
    }

    let (bookings, reviews): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM bookings b JOIN mentors m ON m.mentor_id = b.mentor_id WHERE m.user_id = $1),
            (SELECT COUNT(*) FROM reviews r JOIN mentors m ON m.mentor_id = r.mentor_id WHERE m.user_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    let deleted = sqlx::query("DELETE FROM mentors WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if deleted == 0 {
        Ok(MentorSync::Unchanged)
    } else {
        Ok(MentorSync::Removed {
            bookings: bookings as u64,
            reviews: reviews as u64,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_account(&self, account: NewAccount) -> Result<(Account, MentorSync), AppError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, username, email, hashed_password, first_name, last_name)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&account.username)
        .bind(&account.email)
        .bind(&account.hashed_password)
        .bind(&account.first_name)
        .bind(&account.last_name)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let profile = sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (profile_id, user_id, role) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(account.role.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let sync = reconcile_mentor(&mut tx, user.user_id, profile.role).await?;
        tx.commit().await?;

        Ok((Account { user, profile }, sync))
    }

    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_profile(&self, profile_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE profile_id = $1")
            .bind(profile_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<Profile>, AppError> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, AppError> {
        Ok(sqlx::query_as::<_, Profile>("SELECT * FROM profiles ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn save_account(&self, user: &User, profile: &Profile) -> Result<(Account, MentorSync), AppError> {
        let mut tx = self.pool.begin().await?;

        let saved_user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = $2, email = $3, first_name = $4, last_name = $5, updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let saved_profile = sqlx::query_as::<_, Profile>(
            r#"
            UPDATE profiles
            SET role = $2, phone_number = $3, bio = $4, date_of_birth = $5, location = $6,
                website = $7, linkedin = $8, github = $9, updated_at = NOW()
            WHERE user_id = $1
            RETURNING *
            "#,
        )
        .bind(user.user_id)
        .bind(profile.role.as_str())
        .bind(&profile.phone_number)
        .bind(&profile.bio)
        .bind(profile.date_of_birth)
        .bind(&profile.location)
        .bind(&profile.website)
        .bind(&profile.linkedin)
        .bind(&profile.github)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))?;

        let sync = reconcile_mentor(&mut tx, saved_user.user_id, saved_profile.role).await?;
        tx.commit().await?;

        Ok((
            Account {
                user: saved_user,
                profile: saved_profile,
            },
            sync,
        ))
    }

    async fn reconcile_all_mentors(&self) -> Result<ReconcileReport, AppError> {
        let mut tx = self.pool.begin().await?;

        let missing: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.user_id FROM profiles p
            WHERE p.role = 'mentor'
              AND NOT EXISTS (SELECT 1 FROM mentors m WHERE m.user_id = p.user_id)
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut report = ReconcileReport::default();
        for user_id in missing {
            if reconcile_mentor(&mut tx, user_id, UserRole::Mentor).await? == MentorSync::Created {
                report.created += 1;
            }
        }

        report.removed = sqlx::query(
            r#"
            DELETE FROM mentors m
            WHERE NOT EXISTS (
                SELECT 1 FROM profiles p WHERE p.user_id = m.user_id AND p.role = 'mentor'
            )
            "#,
        )
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(report)
    }

    async fn list_expertise(&self) -> Result<Vec<Expertise>, AppError> {
        Ok(sqlx::query_as::<_, Expertise>("SELECT * FROM expertise ORDER BY name")
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_expertise(&self, expertise_id: Uuid) -> Result<Option<Expertise>, AppError> {
        Ok(sqlx::query_as::<_, Expertise>("SELECT * FROM expertise WHERE expertise_id = $1")
            .bind(expertise_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_expertise_by_name(&self, name: &str) -> Result<Option<Expertise>, AppError> {
        Ok(sqlx::query_as::<_, Expertise>("SELECT * FROM expertise WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_expertise(&self, expertise: NewExpertise) -> Result<Expertise, AppError> {
        sqlx::query_as::<_, Expertise>(
            "INSERT INTO expertise (expertise_id, name, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&expertise.name)
        .bind(&expertise.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn save_expertise(&self, expertise: &Expertise) -> Result<Expertise, AppError> {
        sqlx::query_as::<_, Expertise>(
            "UPDATE expertise SET name = $2, description = $3 WHERE expertise_id = $1 RETURNING *",
        )
        .bind(expertise.expertise_id)
        .bind(&expertise.name)
        .bind(&expertise.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AppError::NotFound("Expertise not found".to_string()))
    }

    async fn delete_expertise(&self, expertise_id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM expertise WHERE expertise_id = $1")
            .bind(expertise_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn list_mentors(&self) -> Result<Vec<Mentor>, AppError> {
        let sql = format!("{} ORDER BY m.created_at", MENTOR_SELECT);
        Ok(sqlx::query_as::<_, Mentor>(&sql).fetch_all(&self.pool).await?)
    }

    async fn find_mentor(&self, mentor_id: Uuid) -> Result<Option<Mentor>, AppError> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_mentor(&mut conn, mentor_id).await
    }

    async fn find_mentor_by_user(&self, user_id: Uuid) -> Result<Option<Mentor>, AppError> {
        let sql = format!("{} WHERE m.user_id = $1", MENTOR_SELECT);
        Ok(sqlx::query_as::<_, Mentor>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn become_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE profiles SET role = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(mentor.user_id)
            .bind(UserRole::Mentor.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(AppError::NotFound("Profile not found".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO mentors (mentor_id, user_id, experience_years, experience_level, company, position,
                                 hourly_rate, availability, is_verified, is_active, total_sessions, rating)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(mentor.mentor_id)
        .bind(mentor.user_id)
        .bind(mentor.experience_years)
        .bind(mentor.experience_level.as_str())
        .bind(&mentor.company)
        .bind(&mentor.position)
        .bind(mentor.hourly_rate)
        .bind(&mentor.availability)
        .bind(mentor.is_verified)
        .bind(mentor.is_active)
        .bind(mentor.total_sessions)
        .bind(mentor.rating)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        sqlx::query(
            "INSERT INTO mentor_expertise (mentor_id, expertise_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(mentor.mentor_id)
        .bind(&mentor.expertise_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let saved = Self::fetch_mentor(&mut tx, mentor.mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Mentor not found".to_string()))?;
        tx.commit().await?;

        Ok(saved)
    }

    async fn save_mentor(&self, mentor: &Mentor) -> Result<Mentor, AppError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE mentors
            SET experience_years = $2, experience_level = $3, company = $4, position = $5,
                hourly_rate = $6, availability = $7, is_active = $8, updated_at = NOW()
            WHERE mentor_id = $1
            "#,
        )
        .bind(mentor.mentor_id)
        .bind(mentor.experience_years)
        .bind(mentor.experience_level.as_str())
        .bind(&mentor.company)
        .bind(&mentor.position)
        .bind(mentor.hourly_rate)
        .bind(&mentor.availability)
        .bind(mentor.is_active)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            return Err(AppError::NotFound("Mentor not found".to_string()));
        }

        sqlx::query("DELETE FROM mentor_expertise WHERE mentor_id = $1")
            .bind(mentor.mentor_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO mentor_expertise (mentor_id, expertise_id) SELECT $1, UNNEST($2::uuid[]) ON CONFLICT DO NOTHING",
        )
        .bind(mentor.mentor_id)
        .bind(&mentor.expertise_ids)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;

        let saved = Self::fetch_mentor(&mut tx, mentor.mentor_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Mentor not found".to_string()))?;
        tx.commit().await?;

        Ok(saved)
    }

    async fn record_completed_session(&self, mentor_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE mentors SET total_sessions = total_sessions + 1, updated_at = NOW() WHERE mentor_id = $1")
            .bind(mentor_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn refresh_mentor_rating(&self, mentor_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE mentors
            SET rating = COALESCE((SELECT ROUND(AVG(r.rating)::numeric, 2) FROM reviews r WHERE r.mentor_id = $1), 0),
                updated_at = NOW()
            WHERE mentor_id = $1
            "#,
        )
        .bind(mentor_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_bookings(
        &self,
        scope: BookingScope,
        statuses: Option<&[BookingStatus]>,
    ) -> Result<Vec<Booking>, AppError> {
        let (mentor_id, mentee_id) = match scope {
            BookingScope::All => (None, None),
            BookingScope::Mentor(mentor_id) => (Some(mentor_id), None),
            BookingScope::Mentee(user_id) => (None, Some(user_id)),
            BookingScope::Nothing => return Ok(Vec::new()),
        };
        let statuses: Option<Vec<String>> =
            statuses.map(|s| s.iter().map(|status| status.as_str().to_string()).collect());

        Ok(sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::uuid IS NULL OR mentor_id = $1)
              AND ($2::uuid IS NULL OR mentee_id = $2)
              AND ($3::text[] IS NULL OR status = ANY($3))
            ORDER BY session_date DESC, session_time DESC, created_at DESC
            "#,
        )
        .bind(mentor_id)
        .bind(mentee_id)
        .bind(statuses)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_booking(&self, booking_id: Uuid) -> Result<Option<Booking>, AppError> {
        Ok(sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking, AppError> {
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (booking_id, mentee_id, mentor_id, session_type, session_date, session_time,
                                  duration_minutes, status, topic, description, meeting_link, notes,
                                  total_amount, is_paid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, FALSE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.mentee_id)
        .bind(booking.mentor_id)
        .bind(booking.session_type.as_str())
        .bind(booking.session_date)
        .bind(booking.session_time)
        .bind(booking.duration_minutes)
        .bind(BookingStatus::Pending.as_str())
        .bind(&booking.topic)
        .bind(&booking.description)
        .bind(&booking.meeting_link)
        .bind(&booking.notes)
        .bind(booking.total_amount)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn save_booking(&self, booking: &Booking) -> Result<Booking, AppError> {
        sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET session_type = $2, session_date = $3, session_time = $4, duration_minutes = $5,
                topic = $6, description = $7, meeting_link = $8, notes = $9, updated_at = NOW()
            WHERE booking_id = $1
            RETURNING *
            "#,
        )
        .bind(booking.booking_id)
        .bind(booking.session_type.as_str())
        .bind(booking.session_date)
        .bind(booking.session_time)
        .bind(booking.duration_minutes)
        .bind(&booking.topic)
        .bind(&booking.description)
        .bind(&booking.meeting_link)
        .bind(&booking.notes)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Booking not found".to_string()))
    }

    async fn delete_booking(&self, booking_id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM bookings WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn transition_booking(
        &self,
        booking_id: Uuid,
        from: &[BookingStatus],
        to: BookingStatus,
    ) -> Result<Option<Booking>, AppError> {
        let from: Vec<String> = from.iter().map(|status| status.as_str().to_string()).collect();

        Ok(sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2, updated_at = NOW()
            WHERE booking_id = $1 AND status = ANY($3)
            RETURNING *
            "#,
        )
        .bind(booking_id)
        .bind(to.as_str())
        .bind(from)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_reviews(&self, filter: ReviewFilter) -> Result<Vec<Review>, AppError> {
        Ok(sqlx::query_as::<_, Review>(
            r#"
            SELECT * FROM reviews
            WHERE ($1::uuid IS NULL OR mentee_id = $1)
              AND ($2::uuid IS NULL OR mentor_id = $2)
              AND (NOT $3 OR is_public)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.author)
        .bind(filter.mentor)
        .bind(filter.public_only)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_review(&self, review_id: Uuid) -> Result<Option<Review>, AppError> {
        Ok(sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE review_id = $1")
            .bind(review_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_review(&self, review: NewReview) -> Result<Review, AppError> {
        sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO reviews (review_id, mentee_id, mentor_id, booking_id, rating, title, comment, is_public)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(review.mentee_id)
        .bind(review.mentor_id)
        .bind(review.booking_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_public)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn save_review(&self, review: &Review) -> Result<Review, AppError> {
        sqlx::query_as::<_, Review>(
            r#"
            UPDATE reviews
            SET rating = $2, title = $3, comment = $4, is_public = $5, updated_at = NOW()
            WHERE review_id = $1
            RETURNING *
            "#,
        )
        .bind(review.review_id)
        .bind(review.rating)
        .bind(&review.title)
        .bind(&review.comment)
        .bind(review.is_public)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Review not found".to_string()))
    }

    async fn delete_review(&self, review_id: Uuid) -> Result<bool, AppError> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE review_id = $1")
            .bind(review_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}
