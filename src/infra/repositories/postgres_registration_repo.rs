use crate::domain::{
    models::{event::Event, registration::{Registration, RegistrationWithEvent}},
    ports::RegistrationRepository,
};
use crate::error::{is_unique_violation, AppError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

pub struct PostgresRegistrationRepo {
    pool: PgPool,
}

impl PostgresRegistrationRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrationRepository for PostgresRegistrationRepo {
    async fn register(&self, registration: &Registration, now: DateTime<Utc>) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        sqlx::query("INSERT INTO registrations (user_id, event_id, created_at) VALUES ($1, $2, $3)")
            .bind(&registration.user_id)
            .bind(&registration.event_id)
            .bind(registration.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return AppError::Conflict("Already registered for this event".into());
                }
                AppError::Database(e)
            })?;

        let updated = sqlx::query_as::<_, Event>(
            "UPDATE events SET registered = registered + 1
             WHERE id = $1 AND registered < capacity AND date > $2
             RETURNING *"
        )
            .bind(&registration.event_id)
            .bind(now)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        // Dropping `tx` without commit rolls the insert back.
        let Some(event) = updated else {
            debug!("Registration for {} refused: full or past", registration.event_id);
            return Err(AppError::Conflict("Event is full or has already taken place".into()));
        };

        tx.commit().await.map_err(AppError::Database)?;
        Ok(event)
    }

    async fn unregister(&self, user_id: &str, event_id: &str) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let result = sqlx::query("DELETE FROM registrations WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::Conflict("Not registered for this event".into()));
        }

        let event = sqlx::query_as::<_, Event>(
            "UPDATE events SET registered = GREATEST(registered - 1, 0) WHERE id = $1 RETURNING *"
        )
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(AppError::Database)?
            .ok_or(AppError::NotFound("Event not found".into()))?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(event)
    }

    async fn is_registered(&self, user_id: &str, event_id: &str) -> Result<bool, AppError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT event_id FROM registrations WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(row.is_some())
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<RegistrationWithEvent>, AppError> {
        let registrations = sqlx::query_as::<_, Registration>(
            "SELECT user_id, event_id, created_at FROM registrations WHERE user_id = $1 ORDER BY created_at DESC"
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let events = sqlx::query_as::<_, Event>(
            "SELECT e.* FROM events e JOIN registrations r ON r.event_id = e.id WHERE r.user_id = $1"
        )
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(RegistrationWithEvent::join(registrations, events))
    }
}
