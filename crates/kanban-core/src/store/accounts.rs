use chrono::Utc;
use redb::ReadableTable;
use uuid::Uuid;

use super::{
    get_json, put_json, remove_key, scan_all, storage, Store, ACCOUNTS, INVITES, SESSIONS, USERS,
    USER_EMAILS,
};
use crate::auth::{normalize_email, Invite, Session, User};
use crate::board::Account;
use crate::error::{KanbanError, Result};

impl Store {
    // -----------------------------------------------------------------------
    // Accounts and users
    // -----------------------------------------------------------------------

    /// Create a team account together with its first user.
    pub fn create_account(
        &self,
        name: &str,
        email: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<(Account, User)> {
        let name = name.trim();
        if name.is_empty() {
            return Err(KanbanError::InvalidInput("account name must not be empty".into()));
        }
        let account = Account::new(name);
        // Hashing is slow; do it before taking the write lock.
        let user = User::new(account.id, email, display_name, password)?;

        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut emails = wt.open_table(USER_EMAILS).map_err(storage)?;
            if emails.get(user.email.as_bytes()).map_err(storage)?.is_some() {
                return Err(KanbanError::EmailTaken(user.email.clone()));
            }
            emails
                .insert(user.email.as_bytes(), user.id.as_bytes().as_slice())
                .map_err(storage)?;

            let mut accounts = wt.open_table(ACCOUNTS).map_err(storage)?;
            put_json(&mut accounts, account.id.as_bytes(), &account)?;
            let mut users = wt.open_table(USERS).map_err(storage)?;
            put_json(&mut users, user.id.as_bytes(), &user)?;
        }
        wt.commit().map_err(storage)?;

        tracing::info!(account = %account.id, user = %user.id, "created account");
        Ok((account, user))
    }

    /// Add a user to the account named by an unused, unexpired invite.
    /// The invite is consumed in the same transaction.
    pub fn join_account(
        &self,
        invite_token: &str,
        email: &str,
        display_name: Option<&str>,
        password: &str,
    ) -> Result<User> {
        let mut user = User::new(Uuid::nil(), email, display_name, password)?;

        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut invites = wt.open_table(INVITES).map_err(storage)?;
            let mut invite: Invite = get_json(&invites, invite_token.as_bytes())?
                .filter(|i: &Invite| i.is_usable(Utc::now()))
                .ok_or_else(|| KanbanError::InviteNotFound(invite_token.to_string()))?;

            let mut emails = wt.open_table(USER_EMAILS).map_err(storage)?;
            if emails.get(user.email.as_bytes()).map_err(storage)?.is_some() {
                return Err(KanbanError::EmailTaken(user.email.clone()));
            }

            user.account_id = invite.account_id;
            invite.used_by = Some(user.id);
            put_json(&mut invites, invite_token.as_bytes(), &invite)?;
            emails
                .insert(user.email.as_bytes(), user.id.as_bytes().as_slice())
                .map_err(storage)?;
            let mut users = wt.open_table(USERS).map_err(storage)?;
            put_json(&mut users, user.id.as_bytes(), &user)?;
        }
        wt.commit().map_err(storage)?;

        tracing::info!(account = %user.account_id, user = %user.id, "user joined account via invite");
        Ok(user)
    }

    pub fn get_account(&self, id: Uuid) -> Result<Account> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(ACCOUNTS).map_err(storage)?;
        get_json(&table, id.as_bytes())?.ok_or_else(|| KanbanError::AccountNotFound(id.to_string()))
    }

    pub fn list_accounts(&self) -> Result<Vec<Account>> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(ACCOUNTS).map_err(storage)?;
        let mut accounts: Vec<Account> = scan_all(&table)?;
        accounts.sort_by_key(|a| a.created_at);
        Ok(accounts)
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(USERS).map_err(storage)?;
        get_json(&table, id.as_bytes())?.ok_or_else(|| KanbanError::UserNotFound(id.to_string()))
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        let rt = self.db().begin_read().map_err(storage)?;
        let emails = rt.open_table(USER_EMAILS).map_err(storage)?;
        let Some(guard) = emails.get(email.as_bytes()).map_err(storage)? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(guard.value()).map_err(storage)?;
        let users = rt.open_table(USERS).map_err(storage)?;
        get_json(&users, id.as_bytes())
    }

    /// Members of an account, ordered by join time.
    pub fn list_users(&self, account_id: Uuid) -> Result<Vec<User>> {
        let rt = self.db().begin_read().map_err(storage)?;
        let table = rt.open_table(USERS).map_err(storage)?;
        let mut users: Vec<User> = scan_all(&table)?;
        users.retain(|u| u.account_id == account_id);
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    /// Verify credentials. Unknown email and wrong password are indistinguishable.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let user = match normalize_email(email) {
            Ok(email) => self.find_user_by_email(&email)?,
            Err(_) => None,
        };
        match user {
            Some(user) if user.check_password(password) => Ok(user),
            _ => Err(KanbanError::InvalidCredentials),
        }
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    pub fn create_session(&self, user_id: Uuid, ttl_hours: u32) -> Result<Session> {
        let session = Session::new(user_id, ttl_hours);
        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(SESSIONS).map_err(storage)?;
            put_json(&mut table, session.token.as_bytes(), &session)?;
        }
        wt.commit().map_err(storage)?;
        Ok(session)
    }

    /// Resolve a session token to its user. Expired sessions are deleted.
    pub fn resolve_session(&self, token: &str) -> Result<User> {
        let session: Session = {
            let rt = self.db().begin_read().map_err(storage)?;
            let table = rt.open_table(SESSIONS).map_err(storage)?;
            get_json(&table, token.as_bytes())?
                .ok_or_else(|| KanbanError::Unauthorized("invalid session".into()))?
        };
        if session.is_expired(Utc::now()) {
            self.delete_session(token)?;
            return Err(KanbanError::Unauthorized("session expired".into()));
        }
        self.get_user(session.user_id)
            .map_err(|_| KanbanError::Unauthorized("invalid session".into()))
    }

    pub fn delete_session(&self, token: &str) -> Result<()> {
        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(SESSIONS).map_err(storage)?;
            remove_key(&mut table, token.as_bytes())?;
        }
        wt.commit().map_err(storage)?;
        Ok(())
    }

    /// Delete every expired session. Returns how many were removed.
    pub fn purge_expired_sessions(&self) -> Result<usize> {
        let now = Utc::now();
        let wt = self.db().begin_write().map_err(storage)?;
        let removed = {
            let mut table = wt.open_table(SESSIONS).map_err(storage)?;
            let sessions: Vec<Session> = scan_all(&table)?;
            let expired: Vec<&Session> = sessions.iter().filter(|s| s.is_expired(now)).collect();
            for s in &expired {
                remove_key(&mut table, s.token.as_bytes())?;
            }
            expired.len()
        };
        wt.commit().map_err(storage)?;
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Invites
    // -----------------------------------------------------------------------

    pub fn create_invite(&self, inviter: &User, ttl_hours: u32) -> Result<Invite> {
        let invite = Invite::new(inviter.account_id, inviter.id, ttl_hours);
        let wt = self.db().begin_write().map_err(storage)?;
        {
            let mut table = wt.open_table(INVITES).map_err(storage)?;
            put_json(&mut table, invite.token.as_bytes(), &invite)?;
        }
        wt.commit().map_err(storage)?;
        tracing::info!(account = %invite.account_id, "created invite");
        Ok(invite)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
