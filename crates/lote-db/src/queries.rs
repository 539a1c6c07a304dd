use chrono::{SecondsFormat, Utc};
use lote_types::models::{Lote, NewLote};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{LoteRow, UserRow};
use crate::{Database, StoreError, label};

const USER_COLUMNS: &str = "id, name, username, password, created_at, updated_at";

const LOTE_COLUMNS: &str = "id, numero_fatura, nome_produto, nome_empresa, referencia, \
     numero_lote, created_at, updated_at, email_enviado, user_id";

impl Database {
    // -- Users --

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>, StoreError> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    /// Create or update the user with this login name. Used by seeding.
    pub fn upsert_user(
        &self,
        username: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<UserRow, StoreError> {
        self.with_conn(|conn| {
            let now = now_rfc3339();
            let updated = conn.execute(
                "UPDATE users SET name = ?2, password = ?3, updated_at = ?4 WHERE username = ?1",
                (username, name, password_hash, &now),
            )?;

            if updated == 0 {
                conn.execute(
                    "INSERT INTO users (id, name, username, password, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    (Uuid::new_v4().to_string(), name, username, password_hash, &now),
                )?;
            }

            query_user_by_username(conn, username)?.ok_or(StoreError::NotFound)
        })
    }

    // -- Lotes --

    /// Create a batch owned by `owner` under a freshly generated label.
    ///
    /// A label collision surfaces as `UniquenessConflict { field: "numero_lote" }`;
    /// no second label is drawn.
    pub fn create_lote(&self, owner: Uuid, lote: &NewLote) -> Result<Lote, StoreError> {
        let numero_lote = label::generate();
        debug!("Generated label {} for owner {}", numero_lote, owner);
        self.create_lote_with_label(owner, &numero_lote, lote)
    }

    pub fn create_lote_with_label(
        &self,
        owner: Uuid,
        numero_lote: &str,
        lote: &NewLote,
    ) -> Result<Lote, StoreError> {
        let id = Uuid::new_v4().to_string();

        self.with_conn(|conn| {
            let now = now_rfc3339();
            conn.execute(
                "INSERT INTO lotes (id, numero_fatura, nome_produto, nome_empresa, referencia,
                                    numero_lote, created_at, updated_at, email_enviado, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, 0, ?8)",
                rusqlite::params![
                    id,
                    lote.numero_fatura,
                    lote.nome_produto,
                    lote.nome_empresa,
                    lote.referencia,
                    numero_lote,
                    now,
                    owner.to_string(),
                ],
            )?;

            query_lote(conn, &id)?.ok_or(StoreError::NotFound)
        })
    }

    /// All batches of `owner`, newest first.
    pub fn list_lotes_by_owner(&self, owner: Uuid) -> Result<Vec<Lote>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {LOTE_COLUMNS} FROM lotes
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC"
            ))?;

            let rows = stmt
                .query_map([owner.to_string()], lote_row)?
                .collect::<Result<Vec<_>, _>>()?;

            rows.into_iter().map(LoteRow::into_lote).collect()
        })
    }

    pub fn get_lote(&self, id: &str) -> Result<Lote, StoreError> {
        self.with_conn(|conn| query_lote(conn, id)?.ok_or(StoreError::NotFound))
    }

    /// Set `email_enviado`. The update only applies while the flag is still
    /// unset, so the flag flips at most once; a batch that was already
    /// flipped is returned unchanged.
    pub fn mark_dispatched(&self, id: &str) -> Result<Lote, StoreError> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE lotes SET email_enviado = 1, updated_at = ?2
                 WHERE id = ?1 AND email_enviado IS NOT 1",
                (id, now_rfc3339()),
            )?;

            let lote = query_lote(conn, id)?.ok_or(StoreError::NotFound)?;

            if updated == 0 {
                warn!("Lote {} was already marked as dispatched", id);
            }

            Ok(lote)
        })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                username: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
                updated_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_lote(conn: &Connection, id: &str) -> Result<Option<Lote>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {LOTE_COLUMNS} FROM lotes WHERE id = ?1"))?;

    stmt.query_row([id], lote_row)
        .optional()?
        .map(LoteRow::into_lote)
        .transpose()
}

fn lote_row(row: &Row<'_>) -> rusqlite::Result<LoteRow> {
    Ok(LoteRow {
        id: row.get(0)?,
        numero_fatura: row.get(1)?,
        nome_produto: row.get(2)?,
        nome_empresa: row.get(3)?,
        referencia: row.get(4)?,
        numero_lote: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        email_enviado: row.get(8)?,
        user_id: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Local};
    use testresult::TestResult;

    use super::*;

    fn new_lote(fatura: &str) -> NewLote {
        NewLote {
            numero_fatura: fatura.to_string(),
            nome_produto: "Widget".to_string(),
            nome_empresa: Some("Acme".to_string()),
            referencia: None,
        }
    }

    fn db_with_user(username: &str) -> Result<(Database, Uuid), StoreError> {
        let db = Database::open_in_memory()?;
        let user = db.upsert_user(username, "Admin", "hash")?;
        let id = user
            .id
            .parse()
            .map_err(|e: uuid::Error| StoreError::Internal(e.into()))?;
        Ok((db, id))
    }

    #[test]
    fn create_lote_starts_undispatched_with_current_year_label() -> TestResult {
        let (db, owner) = db_with_user("admin")?;

        let lote = db.create_lote(owner, &new_lote("NF-1"))?;

        assert!(!lote.email_enviado);
        assert_eq!(lote.user_id, owner);
        assert_eq!(lote.numero_fatura.as_deref(), Some("NF-1"));
        assert!(lote.numero_lote.starts_with("MP-"), "{}", lote.numero_lote);
        assert!(
            lote.numero_lote
                .ends_with(&format!("/{}", Local::now().year())),
            "{}",
            lote.numero_lote
        );
        assert_eq!(lote.created_at, lote.updated_at);

        Ok(())
    }

    #[test]
    fn duplicate_label_is_a_uniqueness_conflict() -> TestResult {
        let (db, owner) = db_with_user("admin")?;

        db.create_lote_with_label(owner, "MP-00001/2025", &new_lote("NF-1"))?;
        let err = db
            .create_lote_with_label(owner, "MP-00001/2025", &new_lote("NF-2"))
            .err();

        assert!(
            err.as_ref().is_some_and(|e| e.is_conflict_on("numero_lote")),
            "expected numero_lote conflict, got {err:?}"
        );
        assert_eq!(db.list_lotes_by_owner(owner)?.len(), 1);

        Ok(())
    }

    #[test]
    fn unknown_owner_is_rejected_by_foreign_key() -> TestResult {
        let db = Database::open_in_memory()?;

        let result = db.create_lote(Uuid::new_v4(), &new_lote("NF-1"));

        assert!(matches!(result, Err(StoreError::Internal(_))), "got {result:?}");

        Ok(())
    }

    #[test]
    fn list_is_newest_first_and_scoped_to_owner() -> TestResult {
        let (db, owner) = db_with_user("admin")?;
        let other: Uuid = db.upsert_user("other", "Other", "hash")?.id.parse()?;

        let first = db.create_lote_with_label(owner, "MP-00001/2025", &new_lote("NF-1"))?;
        let second = db.create_lote_with_label(owner, "MP-00002/2025", &new_lote("NF-2"))?;
        db.create_lote_with_label(other, "MP-00003/2025", &new_lote("NF-3"))?;

        let ids: Vec<Uuid> = db.list_lotes_by_owner(owner)?.iter().map(|l| l.id).collect();

        assert_eq!(ids, [second.id, first.id]);
        assert_eq!(db.list_lotes_by_owner(other)?.len(), 1);

        Ok(())
    }

    #[test]
    fn list_is_stable_without_writes() -> TestResult {
        let (db, owner) = db_with_user("admin")?;
        db.create_lote(owner, &new_lote("NF-1"))?;
        db.create_lote(owner, &new_lote("NF-2"))?;

        assert_eq!(db.list_lotes_by_owner(owner)?, db.list_lotes_by_owner(owner)?);

        Ok(())
    }

    #[test]
    fn get_unknown_lote_is_not_found() -> TestResult {
        let db = Database::open_in_memory()?;

        let result = db.get_lote(&Uuid::new_v4().to_string());

        assert!(matches!(result, Err(StoreError::NotFound)), "got {result:?}");

        Ok(())
    }

    #[test]
    fn mark_dispatched_flips_once() -> TestResult {
        let (db, owner) = db_with_user("admin")?;
        let lote = db.create_lote(owner, &new_lote("NF-1"))?;
        let id = lote.id.to_string();

        let first = db.mark_dispatched(&id)?;
        let second = db.mark_dispatched(&id)?;

        assert!(first.email_enviado);
        assert!(second.email_enviado);
        assert_eq!(first.updated_at, second.updated_at);
        assert!(db.get_lote(&id)?.email_enviado);

        Ok(())
    }

    #[test]
    fn mark_dispatched_unknown_lote_is_not_found() -> TestResult {
        let db = Database::open_in_memory()?;

        let result = db.mark_dispatched("missing");

        assert!(matches!(result, Err(StoreError::NotFound)), "got {result:?}");

        Ok(())
    }

    #[test]
    fn upsert_user_updates_existing_row() -> TestResult {
        let db = Database::open_in_memory()?;

        let created = db.upsert_user("admin", "Admin", "hash-1")?;
        let updated = db.upsert_user("admin", "Administrator", "hash-2")?;

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.name.as_deref(), Some("Administrator"));
        assert_eq!(updated.password.as_deref(), Some("hash-2"));
        assert!(db.get_user_by_username("nobody")?.is_none());

        Ok(())
    }
}
