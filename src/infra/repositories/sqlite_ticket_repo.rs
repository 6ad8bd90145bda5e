use crate::domain::{
    models::ticket::{Reply, Ticket},
    ports::TicketRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

pub struct SqliteTicketRepo {
    pool: SqlitePool,
}

impl SqliteTicketRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TicketRepository for SqliteTicketRepo {
    async fn create(&self, ticket: &Ticket) -> Result<Ticket, AppError> {
        sqlx::query_as::<_, Ticket>(
            r#"INSERT INTO tickets (
                id, subject, message, category, status, customer_id, customer_name, customer_email,
                assigned_agent_id, assigned_agent_name, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING *"#
        )
            .bind(&ticket.id)
            .bind(&ticket.subject)
            .bind(&ticket.message)
            .bind(ticket.category.as_str())
            .bind(ticket.status.as_str())
            .bind(&ticket.customer_id)
            .bind(&ticket.customer_name)
            .bind(&ticket.customer_email)
            .bind(&ticket.assigned_agent_id)
            .bind(&ticket.assigned_agent_name)
            .bind(ticket.created_at)
            .bind(ticket.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let Some(mut ticket) = ticket else { return Ok(None) };

        ticket.replies = sqlx::query_as::<_, Reply>(
            "SELECT * FROM ticket_replies WHERE ticket_id = ? ORDER BY created_at ASC"
        )
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Some(ticket))
    }

    async fn list(&self, customer_id: Option<&str>) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets
             WHERE (? IS NULL OR customer_id = ?)
             ORDER BY created_at DESC"
        )
            .bind(customer_id).bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let replies = sqlx::query_as::<_, Reply>(
            "SELECT r.* FROM ticket_replies r JOIN tickets t ON t.id = r.ticket_id
             WHERE (? IS NULL OR t.customer_id = ?)
             ORDER BY r.created_at ASC"
        )
            .bind(customer_id).bind(customer_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)?;

        Ok(Ticket::attach_replies(tickets, replies))
    }

    async fn update(&self, ticket: &Ticket, expected_updated_at: DateTime<Utc>) -> Result<Ticket, AppError> {
        let updated = sqlx::query_as::<_, Ticket>(
            r#"UPDATE tickets SET
                subject=?, category=?, status=?, assigned_agent_id=?, assigned_agent_name=?, updated_at=?
               WHERE id=? AND updated_at=? RETURNING *"#
        )
            .bind(&ticket.subject)
            .bind(ticket.category.as_str())
            .bind(ticket.status.as_str())
            .bind(&ticket.assigned_agent_id)
            .bind(&ticket.assigned_agent_name)
            .bind(ticket.updated_at)
            .bind(&ticket.id)
            .bind(expected_updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)?;

        let Some(mut updated) = updated else {
            let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM tickets WHERE id = ?")
                .bind(&ticket.id)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::Database)?;
            if exists.is_some() {
                debug!("Stale write to ticket {} rejected", ticket.id);
                return Err(AppError::Conflict("Ticket was modified by someone else, reload and try again".into()));
            }
            return Err(AppError::NotFound("Ticket not found".into()));
        };

        updated.replies = ticket.replies.clone();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;
        sqlx::query("DELETE FROM ticket_replies WHERE ticket_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        let result = sqlx::query("DELETE FROM tickets WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ticket not found".into()));
        }
        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn add_reply(&self, reply: &Reply, ticket_updated_at: DateTime<Utc>) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await.map_err(AppError::Database)?;

        let result = sqlx::query("UPDATE tickets SET updated_at = ? WHERE id = ?")
            .bind(ticket_updated_at)
            .bind(&reply.ticket_id)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Ticket not found".into()));
        }

        sqlx::query(
            "INSERT INTO ticket_replies (id, ticket_id, user_id, user_name, user_role, message, created_at, is_read)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)"
        )
            .bind(&reply.id)
            .bind(&reply.ticket_id)
            .bind(&reply.user_id)
            .bind(&reply.user_name)
            .bind(reply.user_role.as_str())
            .bind(&reply.message)
            .bind(reply.created_at)
            .bind(reply.is_read)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Database)?;

        tx.commit().await.map_err(AppError::Database)?;
        Ok(())
    }

    async fn mark_replies_read(&self, ticket_id: &str, reader_id: &str) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE ticket_replies SET is_read = ? WHERE ticket_id = ? AND user_id != ? AND is_read = ?"
        )
            .bind(true)
            .bind(ticket_id)
            .bind(reader_id)
            .bind(false)
            .execute(&self.pool)
            .await
            .map_err(AppError::Database)?;
        Ok(result.rows_affected())
    }
}
