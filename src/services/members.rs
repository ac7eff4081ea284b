//! Member management service

use rust_decimal::Decimal;

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, UpdateMember},
        BookTransaction, ListQuery, Member, MemberFields, SEARCH_LIMIT,
    },
    repository::{members::MembersRepository, Repository},
    services::rules,
};

#[derive(Clone)]
pub struct MembersService {
    repository: Repository,
}

impl MembersService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn get_member(&self, id: i32) -> AppResult<Member> {
        self.repository.members.get_by_id(id).await
    }

    pub async fn list_members(&self, query: &ListQuery) -> AppResult<Vec<Member>> {
        self.repository.members.list(query.effective_limit()).await
    }

    /// Substring search on name or email; a blank query matches nothing
    pub async fn search_members(&self, query: Option<&str>) -> AppResult<Vec<Member>> {
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => self.repository.members.search(q, SEARCH_LIMIT).await,
            None => Ok(Vec::new()),
        }
    }

    /// Books the member currently has out
    pub async fn member_loans(&self, id: i32) -> AppResult<Vec<BookTransaction>> {
        self.repository.members.get_by_id(id).await?;
        self.repository.transactions.open_issues_for_member(id).await
    }

    async fn ensure_email_free(&self, fields: &MemberFields, exclude_id: Option<i32>) -> AppResult<()> {
        if let Some(ref email) = fields.email {
            if self.repository.members.email_exists(email, exclude_id).await? {
                return Err(AppError::DuplicateKey(format!(
                    "A member with email {} already exists.",
                    email
                )));
            }
        }
        Ok(())
    }

    pub async fn create_member(&self, data: CreateMember) -> AppResult<Member> {
        let fields = MemberFields::from(data).normalized()?;
        self.ensure_email_free(&fields, None).await?;

        let member = self.repository.members.create(&fields).await?;
        tracing::info!("Members: created member id={}", member.id);
        Ok(member)
    }

    pub async fn update_member(&self, id: i32, data: UpdateMember) -> AppResult<Member> {
        let mut tx = self.repository.pool.begin().await?;

        let current = MembersRepository::lock(&mut tx, id).await?;
        let fields = MemberFields::from(&current).apply(data)?;
        self.ensure_email_free(&fields, Some(id)).await?;

        let member = MembersRepository::update(&mut tx, id, &fields).await?;
        tx.commit().await?;

        tracing::info!("Members: updated member id={}", id);
        Ok(member)
    }

    pub async fn delete_member(&self, id: i32) -> AppResult<()> {
        self.repository.members.delete(id).await?;
        tracing::info!("Members: deleted member id={}", id);
        Ok(())
    }

    /// Reduce outstanding dues by a payment
    pub async fn record_payment(&self, id: i32, amount: Decimal) -> AppResult<Member> {
        let mut tx = self.repository.pool.begin().await?;

        let mut member = MembersRepository::lock(&mut tx, id).await?;
        rules::pay(&mut member, amount)?;
        MembersRepository::save_dues(&mut tx, &member).await?;
        tx.commit().await?;

        tracing::info!(
            "Members: payment of {} from member id={}, dues now {}",
            amount, id, member.outstanding_dues
        );
        Ok(member)
    }
}
