use std::sync::Arc;

use tracing::error;

use memberd_core::{Envelope, ListResult, PageRequest, Pending, Runner, ServiceError};
use memberd_sql::{DbPool, Filter, Row, SQLError, SQLStore, SearchRule, Sort, Value};

use crate::model::{Member, MemberColumn, MemberListQuery, MemberStatus, DEFAULT_SORT};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS members (
    id          TEXT PRIMARY KEY,
    data        TEXT NOT NULL,
    merchant_id TEXT NOT NULL,
    first_name  TEXT NOT NULL,
    last_name   TEXT NOT NULL,
    email       TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    deleted_at  TEXT
);
CREATE INDEX IF NOT EXISTS idx_member_merchant ON members(merchant_id);
CREATE UNIQUE INDEX IF NOT EXISTS idx_member_live_email ON members(email) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_member_status ON members(status);
CREATE INDEX IF NOT EXISTS idx_member_created_at ON members(created_at);
";

const TABLE: &str = "members";
const LIVE: &str = "deleted_at IS NULL";

const LIST: Runner = Runner::new("member.store.list");
const GET: Runner = Runner::new("member.store.get");
const EMAIL_EXISTS: Runner = Runner::new("member.store.email_exists");
const INSERT: Runner = Runner::new("member.store.insert");
const SOFT_DELETE: Runner = Runner::new("member.store.soft_delete");

/// Member repository.
///
/// Each operation comes in two forms: a `*_sync` function that runs on the
/// calling thread, and a wrapper that runs it on a worker and hands back a
/// [`Pending`] envelope. Usecase workers compose the `*_sync` forms.
///
/// Reads go to the pool's read handle, writes to the write handle.
#[derive(Clone)]
pub struct MemberStore {
    pool: DbPool,
    rule: Arc<SearchRule>,
}

/// A validated list request, ready to run.
#[derive(Debug, Clone)]
pub struct ListPlan {
    filter: Filter,
    sort: Sort<MemberColumn>,
}

impl MemberStore {
    /// Create the store and initialise the schema.
    pub fn new(pool: DbPool, id_prefix: &str) -> Result<Self, ServiceError> {
        pool.write()
            .exec_batch(SCHEMA)
            .map_err(|e| ServiceError::Storage(format!("member schema init: {e}")))?;
        let rule = SearchRule {
            id_prefix: id_prefix.to_string(),
            id_column: "id",
            email_column: "email",
            name_columns: &["first_name", "last_name"],
        };
        Ok(Self {
            pool,
            rule: Arc::new(rule),
        })
    }

    pub fn id_prefix(&self) -> &str {
        &self.rule.id_prefix
    }

    /// Build the WHERE clause for a list request. Rejections happen here,
    /// before any statement is prepared.
    pub fn filter_for(&self, query: &MemberListQuery) -> Result<Filter, ServiceError> {
        let mut filter = Filter::new(LIVE);
        filter.eq_opt("merchant_id", Some(query.merchant_id.as_str()));
        filter.in_csv("status", &query.status, MemberStatus::parse)?;
        if !query.created_from.trim().is_empty() {
            filter.gte("created_at", query.created_from.trim());
        }
        if !query.created_to.trim().is_empty() {
            filter.lte("created_at", query.created_to.trim());
        }
        filter.search(&query.search, &self.rule);
        Ok(filter)
    }

    /// Validate sort and filters of a list request without touching SQL.
    pub fn plan_list(&self, query: &MemberListQuery) -> Result<ListPlan, ServiceError> {
        let sort = Sort::<MemberColumn>::parse(&query.order_by, &query.sort_by, DEFAULT_SORT)?;
        let filter = self.filter_for(query)?;
        Ok(ListPlan { filter, sort })
    }

    /// Count matching rows, then fetch one page with the same filter.
    pub fn list_sync(&self, plan: &ListPlan, page: &PageRequest) -> Result<ListResult<Member>, ServiceError> {
        let db = self.pool.read();
        let (count_sql, count_params) = plan.filter.count_query(TABLE);
        let rows = query_logged(db, LIST.op(), &count_sql, &count_params)?;
        let total = rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0);

        let (page_sql, page_params) = plan.filter.page_query("SELECT data", TABLE, &plan.sort, page);
        let rows = query_logged(db, LIST.op(), &page_sql, &page_params)?;
        let items = rows.iter().map(row_to_member).collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult {
            items,
            total: total.max(0) as u64,
        })
    }

    pub fn list(&self, query: &MemberListQuery, page: PageRequest) -> Pending<ListResult<Member>> {
        let plan = match self.plan_list(query) {
            Ok(plan) => plan,
            Err(e) => return Pending::ready(LIST.op(), Envelope::fail(e)),
        };
        let store = self.clone();
        LIST.run(move || match store.list_sync(&plan, &page) {
            Ok(list) => {
                let total = list.total;
                Envelope::listed(list, total)
            }
            Err(e) => Envelope::fail(e),
        })
    }

    /// A live member by id.
    pub fn get_sync(&self, id: &str) -> Result<Member, ServiceError> {
        let id = id.trim();
        let sql = "SELECT data FROM members WHERE id = ?1 AND deleted_at IS NULL";
        let rows = query_logged(self.pool.read(), GET.op(), sql, &[Value::from(id)])?;
        let row = rows
            .first()
            .ok_or_else(|| ServiceError::NotFound(format!("member {id}")))?;
        row_to_member(row)
    }

    pub fn get(&self, id: &str) -> Pending<Member> {
        let store = self.clone();
        let id = id.to_string();
        GET.run(move || store.get_sync(&id).into())
    }

    /// Whether a live member already uses `email` (compared lowercased).
    pub fn email_exists_sync(&self, email: &str) -> Result<bool, ServiceError> {
        let sql = "SELECT COUNT(*) AS cnt FROM members WHERE email = ?1 AND deleted_at IS NULL";
        let params = [Value::from(email.trim().to_lowercase())];
        let rows = query_logged(self.pool.read(), EMAIL_EXISTS.op(), sql, &params)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) > 0)
    }

    pub fn email_exists(&self, email: &str) -> Pending<bool> {
        let store = self.clone();
        let email = email.to_string();
        EMAIL_EXISTS.run(move || store.email_exists_sync(&email).into())
    }

    /// Insert a new member. A second live row with the same email is
    /// refused by the database.
    pub fn insert_sync(&self, member: &Member) -> Result<(), ServiceError> {
        let data =
            serde_json::to_string(member).map_err(|e| ServiceError::Internal(e.to_string()))?;
        let sql = "INSERT INTO members \
                   (id, data, merchant_id, first_name, last_name, email, status, created_at, updated_at) \
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
        let params = [
            Value::from(member.id.as_str()),
            Value::Text(data),
            Value::from(member.merchant_id.as_str()),
            Value::from(member.first_name.as_str()),
            Value::from(member.last_name.as_str()),
            Value::from(member.email.as_str()),
            Value::from(member.status),
            Value::from(member.created_at.as_str()),
            Value::from(member.updated_at.as_str()),
        ];
        exec_logged(self.pool.write(), INSERT.op(), sql, &params).map(|_| ())
    }

    pub fn insert(&self, member: Member) -> Pending<()> {
        let store = self.clone();
        INSERT.run(move || store.insert_sync(&member).into())
    }

    /// Mark a live member deleted. The row stays for audit.
    pub fn soft_delete_sync(&self, id: &str) -> Result<(), ServiceError> {
        mark_deleted(self.pool.read(), self.pool.write(), id.trim())
    }

    pub fn soft_delete(&self, id: &str) -> Pending<()> {
        let store = self.clone();
        let id = id.to_string();
        SOFT_DELETE.run(move || store.soft_delete_sync(&id).into())
    }
}

fn mark_deleted(
    read: &Arc<dyn SQLStore>,
    write: &Arc<dyn SQLStore>,
    id: &str,
) -> Result<(), ServiceError> {
    let rows = query_logged(
        read,
        SOFT_DELETE.op(),
        "SELECT data FROM members WHERE id = ?1 AND deleted_at IS NULL",
        &[Value::from(id)],
    )?;
    let mut member = rows
        .first()
        .map(row_to_member)
        .transpose()?
        .ok_or_else(|| ServiceError::NotFound(format!("member {id}")))?;

    let now = memberd_core::now_rfc3339();
    member.deleted_at = Some(now.clone());
    member.updated_at = now.clone();
    let data =
        serde_json::to_string(&member).map_err(|e| ServiceError::Internal(e.to_string()))?;

    let affected = exec_logged(
        write,
        SOFT_DELETE.op(),
        "UPDATE members SET data = ?1, updated_at = ?2, deleted_at = ?3 \
         WHERE id = ?4 AND deleted_at IS NULL",
        &[
            Value::Text(data),
            Value::from(now.as_str()),
            Value::from(now.as_str()),
            Value::from(id),
        ],
    )?;
    if affected == 0 {
        return Err(ServiceError::NotFound(format!("member {id}")));
    }
    Ok(())
}

/// Run a query, logging the failure once with its statement and bindings.
fn query_logged(
    db: &Arc<dyn SQLStore>,
    op: &'static str,
    sql: &str,
    params: &[Value],
) -> Result<Vec<Row>, ServiceError> {
    db.query(sql, params).map_err(|e| log_failure(op, sql, params, e))
}

fn exec_logged(
    db: &Arc<dyn SQLStore>,
    op: &'static str,
    sql: &str,
    params: &[Value],
) -> Result<u64, ServiceError> {
    db.exec(sql, params).map_err(|e| log_failure(op, sql, params, e))
}

fn log_failure(op: &'static str, sql: &str, params: &[Value], e: SQLError) -> ServiceError {
    error!(op, sql, ?params, error = %e, "statement failed");
    e.into()
}

fn row_to_member(row: &Row) -> Result<Member, ServiceError> {
    let data = row
        .get_str("data")
        .ok_or_else(|| ServiceError::Internal("member row without data".into()))?;
    serde_json::from_str(data).map_err(|e| ServiceError::Internal(format!("decode member: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use memberd_core::Paginator;
    use memberd_sql::SqliteStore;

    use crate::model::NewMember;

    /// Wraps a store and counts statements that reach it.
    struct Counting {
        inner: SqliteStore,
        statements: AtomicUsize,
    }

    impl SQLStore for Counting {
        fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, SQLError> {
            self.statements.fetch_add(1, Ordering::SeqCst);
            self.inner.query(sql, params)
        }

        fn exec(&self, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
            self.statements.fetch_add(1, Ordering::SeqCst);
            self.inner.exec(sql, params)
        }

        fn exec_batch(&self, sql: &str) -> Result<(), SQLError> {
            self.inner.exec_batch(sql)
        }
    }

    fn counting_store() -> (MemberStore, Arc<Counting>) {
        let db = Arc::new(Counting {
            inner: SqliteStore::open_in_memory().unwrap(),
            statements: AtomicUsize::new(0),
        });
        let pool = DbPool::single(Arc::clone(&db) as Arc<dyn SQLStore>);
        (MemberStore::new(pool, "MBR-").unwrap(), db)
    }

    fn member(first: &str, email: &str, status: MemberStatus) -> Member {
        let mut m = Member::create(
            "MBR-",
            &NewMember {
                merchant_id: "m1".into(),
                first_name: first.into(),
                last_name: "Tester".into(),
                email: email.into(),
                status: Some(status),
            },
        );
        m.created_at = format!("2024-01-0{}T00:00:00+00:00", first.len());
        m
    }

    async fn seed(store: &MemberStore) -> Vec<Member> {
        let members = vec![
            member("Ann", "ann@x.com", MemberStatus::Active),
            member("Bobby", "bob@x.com", MemberStatus::Inactive),
            member("Cara", "cara@x.com", MemberStatus::Suspended),
        ];
        for m in &members {
            assert!(store.insert(m.clone()).wait().await.is_success());
        }
        members
    }

    fn page(p: &str, l: &str) -> PageRequest {
        Paginator::default().resolve(p, l).unwrap()
    }

    #[tokio::test]
    async fn insert_then_get() {
        let (store, _) = counting_store();
        let members = seed(&store).await;
        let got = store.get(&members[0].id).wait().await.into_payload().unwrap();
        assert_eq!(got, members[0]);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let (store, _) = counting_store();
        let env = store.get("MBR-nope").wait().await;
        assert!(matches!(env.error(), Some(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_counts_then_pages() {
        let (store, _) = counting_store();
        seed(&store).await;
        let query = MemberListQuery {
            order_by: "firstName".into(),
            sort_by: "asc".into(),
            ..Default::default()
        };
        let env = store.list(&query, page("1", "2")).wait().await;
        assert_eq!(env.total, Some(3));
        let list = env.into_payload().unwrap();
        assert_eq!(list.total, 3);
        let names: Vec<_> = list.items.iter().map(|m| m.first_name.as_str()).collect();
        assert_eq!(names, ["Ann", "Bobby"]);

        let list = store.list(&query, page("2", "2")).wait().await.into_payload().unwrap();
        assert_eq!(list.items.len(), 1);
        assert_eq!(list.items[0].first_name, "Cara");
    }

    #[tokio::test]
    async fn list_filters_combine() {
        let (store, _) = counting_store();
        let members = seed(&store).await;

        let query = MemberListQuery {
            status: "inactive, suspended".into(),
            search: "cAr".into(),
            ..Default::default()
        };
        let list = store.list(&query, page("", "")).wait().await.into_payload().unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].email, "cara@x.com");

        let query = MemberListQuery {
            search: "BOB@X.COM".into(),
            ..Default::default()
        };
        let list = store.list(&query, page("", "")).wait().await.into_payload().unwrap();
        assert_eq!(list.items[0].id, members[1].id);

        let query = MemberListQuery {
            search: members[2].id.clone(),
            merchant_id: "m1".into(),
            ..Default::default()
        };
        let list = store.list(&query, page("", "")).wait().await.into_payload().unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].id, members[2].id);

        let query = MemberListQuery {
            created_from: "2024-01-04".into(),
            created_to: "2024-01-04T23:59:59+00:00".into(),
            ..Default::default()
        };
        let list = store.list(&query, page("", "")).wait().await.into_payload().unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].first_name, "Cara");
    }

    #[tokio::test]
    async fn bad_order_by_executes_nothing() {
        let (store, db) = counting_store();
        let before = db.statements.load(Ordering::SeqCst);
        let query = MemberListQuery {
            order_by: "dropTable;--".into(),
            ..Default::default()
        };
        let env = store.list(&query, page("", "")).wait().await;
        assert!(matches!(env.error(), Some(ServiceError::Validation(_))));
        assert_eq!(db.statements.load(Ordering::SeqCst), before);
    }

    #[tokio::test]
    async fn unknown_status_executes_nothing() {
        let (store, db) = counting_store();
        let query = MemberListQuery {
            status: "active,gone".into(),
            ..Default::default()
        };
        let env = store.list(&query, page("", "")).wait().await;
        assert!(matches!(env.error(), Some(ServiceError::Validation(_))));
        assert_eq!(db.statements.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn email_exists_ignores_case_and_deleted() {
        let (store, _) = counting_store();
        let members = seed(&store).await;
        assert!(store.email_exists("ANN@x.com").wait().await.into_payload().unwrap());
        assert!(!store.email_exists("zed@x.com").wait().await.into_payload().unwrap());

        assert!(store.soft_delete(&members[0].id).wait().await.is_success());
        assert!(!store.email_exists("ann@x.com").wait().await.into_payload().unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_member_is_hidden() {
        let (store, _) = counting_store();
        let members = seed(&store).await;
        assert!(store.soft_delete(&members[1].id).wait().await.is_success());

        let env = store.get(&members[1].id).wait().await;
        assert!(matches!(env.error(), Some(ServiceError::NotFound(_))));
        let list = store
            .list(&MemberListQuery::default(), page("", ""))
            .wait()
            .await
            .into_payload()
            .unwrap();
        assert_eq!(list.total, 2);

        let again = store.soft_delete(&members[1].id).wait().await;
        assert!(matches!(again.error(), Some(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_id_is_storage_error() {
        let (store, _) = counting_store();
        let members = seed(&store).await;
        let env = store.insert(members[0].clone()).wait().await;
        assert!(matches!(env.error(), Some(ServiceError::Storage(_))));
        assert!(env.error().unwrap().is_infrastructure());
    }

    #[tokio::test]
    async fn live_email_is_unique() {
        let (store, _) = counting_store();
        let members = seed(&store).await;
        let twin = member("Anna", "ann@x.com", MemberStatus::Active);
        let env = store.insert(twin.clone()).wait().await;
        assert!(matches!(env.error(), Some(ServiceError::Storage(_))));

        assert!(store.soft_delete(&members[0].id).wait().await.is_success());
        assert!(store.insert(twin).wait().await.is_success());
    }

    #[test]
    fn sync_forms_run_on_the_calling_thread() {
        let (store, db) = counting_store();
        let m = member("Eve", "eve@x.com", MemberStatus::Active);
        store.insert_sync(&m).unwrap();
        assert!(store.email_exists_sync("EVE@x.com").unwrap());
        assert_eq!(store.get_sync(&m.id).unwrap(), m);

        let plan = store.plan_list(&MemberListQuery::default()).unwrap();
        let list = store.list_sync(&plan, &page("", "")).unwrap();
        assert_eq!(list.total, 1);

        store.soft_delete_sync(&m.id).unwrap();
        assert!(matches!(store.get_sync(&m.id), Err(ServiceError::NotFound(_))));
        assert!(db.statements.load(Ordering::SeqCst) >= 6);
    }

    #[tokio::test]
    async fn file_backed_pool() {
        let dir = tempfile::tempdir().unwrap();
        let pool = DbPool::open_sqlite(&dir.path().join("members.sqlite")).unwrap();
        let store = MemberStore::new(pool, "MBR-").unwrap();
        let m = member("Dee", "dee@x.com", MemberStatus::Active);
        assert!(store.insert(m.clone()).wait().await.is_success());
        assert_eq!(store.get(&m.id).wait().await.into_payload().unwrap(), m);
    }
}
