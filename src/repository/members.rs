//! Members repository for database operations

use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{like_pattern, Member, MemberFields},
};

#[derive(Clone)]
pub struct MembersRepository {
    pool: Pool<Postgres>,
}

impl MembersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get member by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    pub async fn list(&self, limit: i64) -> AppResult<Vec<Member>> {
        let members =
            sqlx::query_as::<_, Member>("SELECT * FROM members ORDER BY full_name, id LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(members)
    }

    /// Case-insensitive substring search on name or email
    pub async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<Member>> {
        let members = sqlx::query_as::<_, Member>(
            r#"
            SELECT * FROM members
            WHERE full_name ILIKE $1 OR email ILIKE $1
            ORDER BY full_name, id
            LIMIT $2
            "#,
        )
        .bind(like_pattern(query))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Whether another member already uses this (lower-cased) email
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM members WHERE email = $1 AND ($2::INTEGER IS NULL OR id <> $2))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(&self, fields: &MemberFields) -> AppResult<Member> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (full_name, email, outstanding_dues, debt_limit)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&fields.full_name)
        .bind(&fields.email)
        .bind(fields.outstanding_dues)
        .bind(fields.debt_limit)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    /// Lock a member row for the rest of the database transaction
    pub async fn lock(conn: &mut PgConnection, id: i32) -> AppResult<Member> {
        sqlx::query_as::<_, Member>("SELECT * FROM members WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Write the profile fields of a locked member (dues are left alone)
    pub async fn update(conn: &mut PgConnection, id: i32, fields: &MemberFields) -> AppResult<Member> {
        sqlx::query_as::<_, Member>(
            r#"
            UPDATE members
            SET full_name = $1, email = $2, debt_limit = $3, updated_at = NOW()
            WHERE id = $4
            RETURNING *
            "#,
        )
        .bind(&fields.full_name)
        .bind(&fields.email)
        .bind(fields.debt_limit)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member with id {} not found", id)))
    }

    /// Persist the dues of a locked member
    pub async fn save_dues(conn: &mut PgConnection, member: &Member) -> AppResult<()> {
        sqlx::query("UPDATE members SET outstanding_dues = $1, updated_at = NOW() WHERE id = $2")
            .bind(member.outstanding_dues)
            .bind(member.id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Delete a member that no transaction references
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM book_transactions WHERE member_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        if referenced {
            return Err(AppError::IllegalState(format!(
                "Member {} has circulation history and cannot be deleted",
                id
            )));
        }

        let result = sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Member with id {} not found", id)));
        }
        Ok(())
    }
}
