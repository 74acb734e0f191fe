//! Chat allow-list and the admin approval workflow.

use crate::error::Result;
use crate::texts;
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use sqlx::{Row as _, SqlitePool};
use std::sync::Arc;

/// Status of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// A persisted approval request.
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub chat_id: i64,
    pub title: String,
    pub requester_id: i64,
    pub requester_name: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// A dynamically approved chat.
#[derive(Debug, Clone)]
pub struct AllowedChat {
    pub chat_id: i64,
    pub title: String,
    pub approved_by: i64,
    pub approved_at: DateTime<Utc>,
}

/// Outcome of an admin approve/reject action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Done,
    /// No pending request matched the chat id.
    NotFound,
}

/// Delivers approval-request notices to admins over direct messages.
///
/// Send failures are the implementor's problem to log; the workflow never
/// fails because a notification couldn't be delivered.
#[async_trait::async_trait]
pub trait AdminNotifier: Send + Sync {
    async fn notify_admin(&self, admin_id: i64, text: &str);
}

/// The chat allow-list predicate and approval workflow.
///
/// A chat is allowed iff it is a direct (1:1) conversation, its id is in the
/// statically configured set, or an `allowed_chats` row exists.
#[derive(Clone)]
pub struct AccessControl {
    pool: SqlitePool,
    static_allowed: Vec<i64>,
    admin_ids: Vec<i64>,
    notifier: Arc<dyn AdminNotifier>,
}

impl AccessControl {
    pub fn new(
        pool: SqlitePool,
        static_allowed: Vec<i64>,
        admin_ids: Vec<i64>,
        notifier: Arc<dyn AdminNotifier>,
    ) -> Self {
        Self {
            pool,
            static_allowed,
            admin_ids,
            notifier,
        }
    }

    pub fn static_allowed(&self) -> &[i64] {
        &self.static_allowed
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Whether the bot may act in this chat. Absence is false, not a fault;
    /// a failed lookup degrades to false with a warning.
    pub async fn is_allowed(&self, chat_id: i64) -> bool {
        // Positive ids are direct conversations on Telegram.
        if chat_id > 0 {
            return true;
        }

        if self.static_allowed.contains(&chat_id) {
            return true;
        }

        let lookup = sqlx::query("SELECT 1 FROM allowed_chats WHERE chat_id = ?")
            .bind(chat_id)
            .fetch_optional(&self.pool)
            .await;

        match lookup {
            Ok(row) => row.is_some(),
            Err(error) => {
                tracing::warn!(%error, chat_id, "allow-list lookup failed");
                false
            }
        }
    }

    /// File an approval request for an unapproved chat and notify the admins.
    ///
    /// Idempotent under repeated triggers: the partial unique index on
    /// pending requests makes the second insert a no-op, and admins are only
    /// notified when a row was actually created.
    pub async fn request_approval(
        &self,
        chat_id: i64,
        title: &str,
        requester_id: i64,
        requester_name: &str,
    ) -> Result<()> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO approval_requests \
             (id, chat_id, title, requester_id, requester_name, status, created_at) \
             VALUES (?, ?, ?, ?, ?, 'pending', ?)",
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(chat_id)
        .bind(title)
        .bind(requester_id)
        .bind(requester_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to insert approval request")?
        .rows_affected();

        if inserted == 0 {
            tracing::debug!(chat_id, "approval request already pending");
            return Ok(());
        }

        let notice = texts::approval_request_notice(chat_id, title, requester_id, requester_name);
        for admin_id in &self.admin_ids {
            self.notifier.notify_admin(*admin_id, &notice).await;
        }

        Ok(())
    }

    /// Flip the pending request for a chat to approved and record the chat
    /// as allowed. The caller must have checked `is_admin` already.
    pub async fn approve(&self, chat_id: i64, acting_admin: i64) -> Result<AdminAction> {
        let flipped = self
            .transition_pending(chat_id, RequestStatus::Approved)
            .await?;
        if flipped == 0 {
            return Ok(AdminAction::NotFound);
        }

        let title: String = sqlx::query(
            "SELECT title FROM approval_requests WHERE chat_id = ? ORDER BY created_at DESC",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to read approved request")?
        .and_then(|row| row.try_get("title").ok())
        .unwrap_or_default();

        sqlx::query(
            "INSERT OR IGNORE INTO allowed_chats (chat_id, title, approved_by, approved_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(&title)
        .bind(acting_admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("failed to insert allowed chat")?;

        Ok(AdminAction::Done)
    }

    /// Flip the pending request for a chat to rejected.
    pub async fn reject(&self, chat_id: i64) -> Result<AdminAction> {
        let flipped = self
            .transition_pending(chat_id, RequestStatus::Rejected)
            .await?;
        Ok(if flipped == 0 {
            AdminAction::NotFound
        } else {
            AdminAction::Done
        })
    }

    /// Atomic status flip guarded on the row still being pending.
    async fn transition_pending(&self, chat_id: i64, to: RequestStatus) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE approval_requests SET status = ? WHERE chat_id = ? AND status = 'pending'",
        )
        .bind(to.as_str())
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .context("failed to update approval request")?;

        Ok(result.rows_affected())
    }

    /// Pending requests, newest first.
    pub async fn list_pending(&self) -> Result<Vec<ApprovalRequest>> {
        let rows = sqlx::query(
            "SELECT chat_id, title, requester_id, requester_name, status, created_at \
             FROM approval_requests WHERE status = 'pending' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list pending requests")?;

        Ok(rows.into_iter().map(|row| request_from_row(&row)).collect())
    }

    /// Dynamically approved chats, newest first. The static set is reported
    /// separately by the caller.
    pub async fn list_allowed(&self) -> Result<Vec<AllowedChat>> {
        let rows = sqlx::query(
            "SELECT chat_id, title, approved_by, approved_at \
             FROM allowed_chats ORDER BY approved_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to list allowed chats")?;

        Ok(rows
            .into_iter()
            .map(|row| AllowedChat {
                chat_id: row.try_get("chat_id").unwrap_or_default(),
                title: row.try_get("title").unwrap_or_default(),
                approved_by: row.try_get("approved_by").unwrap_or_default(),
                approved_at: row.try_get("approved_at").unwrap_or_else(|_| Utc::now()),
            })
            .collect())
    }
}

fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> ApprovalRequest {
    ApprovalRequest {
        chat_id: row.try_get("chat_id").unwrap_or_default(),
        title: row.try_get("title").unwrap_or_default(),
        requester_id: row.try_get("requester_id").unwrap_or_default(),
        requester_name: row.try_get("requester_name").unwrap_or_default(),
        status: row
            .try_get::<String, _>("status")
            .ok()
            .and_then(|s| RequestStatus::parse(&s))
            .unwrap_or(RequestStatus::Pending),
        created_at: row.try_get("created_at").unwrap_or_else(|_| Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use std::sync::Mutex;

    /// Records notifications instead of sending them.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
    }

    #[async_trait::async_trait]
    impl AdminNotifier for RecordingNotifier {
        async fn notify_admin(&self, admin_id: i64, text: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((admin_id, text.to_string()));
        }
    }

    async fn setup() -> (AccessControl, Arc<RecordingNotifier>) {
        let pool = db::memory_pool().await;
        let notifier = Arc::new(RecordingNotifier::default());
        let access = AccessControl::new(pool, vec![-500], vec![42], notifier.clone());
        (access, notifier)
    }

    #[tokio::test]
    async fn static_set_allows_regardless_of_rows() {
        let (access, _) = setup().await;
        assert!(access.is_allowed(-500).await);
    }

    #[tokio::test]
    async fn direct_chats_are_always_allowed() {
        let (access, _) = setup().await;
        assert!(access.is_allowed(777).await);
    }

    #[tokio::test]
    async fn unknown_group_is_not_allowed() {
        let (access, _) = setup().await;
        assert!(!access.is_allowed(-123).await);
    }

    #[tokio::test]
    async fn repeated_requests_leave_one_pending_row() {
        let (access, notifier) = setup().await;

        access
            .request_approval(-123, "Тестовый чат", 7, "vasya")
            .await
            .unwrap();
        access
            .request_approval(-123, "Тестовый чат", 8, "petya")
            .await
            .unwrap();

        let pending = access.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].requester_name, "vasya");

        // Only the first trigger notifies the admin.
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 42);
        assert!(sent[0].1.contains("/approve -123"));
        assert!(sent[0].1.contains("/reject -123"));
    }

    #[tokio::test]
    async fn approve_without_pending_is_not_found() {
        let (access, _) = setup().await;
        assert_eq!(access.approve(-123, 42).await.unwrap(), AdminAction::NotFound);
        assert!(access.list_allowed().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn approve_flips_status_and_allows_chat() {
        let (access, _) = setup().await;
        access
            .request_approval(-123, "Тестовый чат", 7, "vasya")
            .await
            .unwrap();

        assert_eq!(access.approve(-123, 42).await.unwrap(), AdminAction::Done);
        assert!(access.is_allowed(-123).await);
        assert!(access.list_pending().await.unwrap().is_empty());

        let allowed = access.list_allowed().await.unwrap();
        assert_eq!(allowed.len(), 1);
        assert_eq!(allowed[0].title, "Тестовый чат");
        assert_eq!(allowed[0].approved_by, 42);

        // The decided request can't be re-approved.
        assert_eq!(access.approve(-123, 42).await.unwrap(), AdminAction::NotFound);
    }

    #[tokio::test]
    async fn reject_keeps_chat_disallowed() {
        let (access, _) = setup().await;
        access
            .request_approval(-123, "Тестовый чат", 7, "vasya")
            .await
            .unwrap();

        assert_eq!(access.reject(-123).await.unwrap(), AdminAction::Done);
        assert!(!access.is_allowed(-123).await);
        assert!(access.list_pending().await.unwrap().is_empty());

        // A fresh request may be filed after a rejection.
        access
            .request_approval(-123, "Тестовый чат", 7, "vasya")
            .await
            .unwrap();
        assert_eq!(access.list_pending().await.unwrap().len(), 1);
    }
}
