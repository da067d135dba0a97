//! SQLite store backend.
//!
//! Conditional transitions are single `UPDATE ... WHERE status IN (...)`
//! statements; `rows_affected` is the commit signal, so two racing
//! transitions on one row resolve at the database and exactly one sees a
//! nonzero count. Structured columns (conditions, actions, attributes,
//! skills) are stored as JSON text; timestamps as RFC 3339 text.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::{Result, RoutingError};
use crate::routing::RoutingRule;
use crate::store::{TaskChanges, TaskStore};
use crate::task::{Reservation, ReservationId, ReservationStatus, Task, TaskId, TaskStatus};
use crate::worker::{Activity, Worker, WorkerId};

/// Durable store backed by SQLite.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect and run the schema migration. An in-memory URL gets a
    /// single-connection pool; each pooled connection would otherwise see
    /// its own private database.
    pub async fn connect(url: &str) -> Result<Self> {
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS routing_rules (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                priority INTEGER NOT NULL,
                enabled INTEGER NOT NULL,
                conditions TEXT NOT NULL,
                actions TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                task_sid TEXT NOT NULL UNIQUE,
                queue_sid TEXT,
                workflow_sid TEXT,
                attributes TEXT NOT NULL,
                priority INTEGER NOT NULL,
                timeout_secs INTEGER NOT NULL,
                status TEXT NOT NULL,
                worker_id TEXT,
                cancel_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                ended_at TEXT
            )",
            "CREATE TABLE IF NOT EXISTS reservations (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL,
                worker_id TEXT NOT NULL,
                status TEXT NOT NULL,
                reject_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_reservations_task
                ON reservations(task_id, status)",
            "CREATE TABLE IF NOT EXISTS workers (
                id TEXT PRIMARY KEY,
                worker_sid TEXT NOT NULL,
                friendly_name TEXT NOT NULL,
                activity_sid TEXT NOT NULL,
                available INTEGER NOT NULL,
                skills TEXT NOT NULL,
                department TEXT,
                capacity INTEGER NOT NULL,
                last_assigned_at TEXT,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS activities (
                activity_sid TEXT PRIMARY KEY,
                friendly_name TEXT NOT NULL,
                available INTEGER NOT NULL
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RoutingError::store(format!("bad timestamp {raw}: {e}")))
}

fn parse_optional_datetime(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_datetime).transpose()
}

fn rule_from_row(row: &SqliteRow) -> Result<RoutingRule> {
    Ok(RoutingRule {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        priority: row.try_get("priority")?,
        enabled: row.try_get("enabled")?,
        conditions: serde_json::from_str(row.try_get::<String, _>("conditions")?.as_str())?,
        actions: serde_json::from_str(row.try_get::<String, _>("actions")?.as_str())?,
        created_at: parse_datetime(row.try_get::<String, _>("created_at")?.as_str())?,
    })
}

fn task_from_row(row: &SqliteRow) -> Result<Task> {
    let status: String = row.try_get("status")?;
    Ok(Task {
        id: TaskId(row.try_get("id")?),
        task_sid: row.try_get("task_sid")?,
        queue_sid: row.try_get("queue_sid")?,
        workflow_sid: row.try_get("workflow_sid")?,
        attributes: serde_json::from_str(row.try_get::<String, _>("attributes")?.as_str())?,
        priority: row.try_get("priority")?,
        timeout_secs: row.try_get::<i64, _>("timeout_secs")? as u64,
        status: TaskStatus::from_str(&status).map_err(RoutingError::store)?,
        worker_id: row
            .try_get::<Option<String>, _>("worker_id")?
            .map(WorkerId),
        cancel_reason: row.try_get("cancel_reason")?,
        created_at: parse_datetime(row.try_get::<String, _>("created_at")?.as_str())?,
        updated_at: parse_datetime(row.try_get::<String, _>("updated_at")?.as_str())?,
        ended_at: parse_optional_datetime(row.try_get("ended_at")?)?,
    })
}

fn reservation_from_row(row: &SqliteRow) -> Result<Reservation> {
    let status: String = row.try_get("status")?;
    Ok(Reservation {
        id: ReservationId(row.try_get("id")?),
        task_id: TaskId(row.try_get("task_id")?),
        worker_id: WorkerId(row.try_get("worker_id")?),
        status: ReservationStatus::from_str(&status).map_err(RoutingError::store)?,
        reject_reason: row.try_get("reject_reason")?,
        created_at: parse_datetime(row.try_get::<String, _>("created_at")?.as_str())?,
        updated_at: parse_datetime(row.try_get::<String, _>("updated_at")?.as_str())?,
    })
}

fn worker_from_row(row: &SqliteRow) -> Result<Worker> {
    Ok(Worker {
        id: WorkerId(row.try_get("id")?),
        worker_sid: row.try_get("worker_sid")?,
        friendly_name: row.try_get("friendly_name")?,
        activity_sid: row.try_get("activity_sid")?,
        available: row.try_get("available")?,
        skills: serde_json::from_str(row.try_get::<String, _>("skills")?.as_str())?,
        department: row.try_get("department")?,
        capacity: row.try_get::<i64, _>("capacity")? as u32,
        last_assigned_at: parse_optional_datetime(row.try_get("last_assigned_at")?)?,
        updated_at: parse_datetime(row.try_get::<String, _>("updated_at")?.as_str())?,
    })
}

fn activity_from_row(row: &SqliteRow) -> Result<Activity> {
    Ok(Activity {
        activity_sid: row.try_get("activity_sid")?,
        friendly_name: row.try_get("friendly_name")?,
        available: row.try_get("available")?,
    })
}

/// Build the `status IN (...)` fragment from the closed status enum. The
/// strings come from `Display` on the enum, never from caller input.
fn status_list(from: &[TaskStatus]) -> String {
    from.iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE"))
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert_rule(&self, rule: RoutingRule) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO routing_rules
                (id, name, priority, enabled, conditions, actions, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.id)
        .bind(&rule.name)
        .bind(rule.priority)
        .bind(rule.enabled)
        .bind(serde_json::to_string(&rule.conditions)?)
        .bind(serde_json::to_string(&rule.actions)?)
        .bind(rule.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_enabled_rules(&self) -> Result<Vec<RoutingRule>> {
        let rows = sqlx::query("SELECT * FROM routing_rules WHERE enabled = 1")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn set_rule_enabled(&self, rule_id: &str, enabled: bool) -> Result<()> {
        let result = sqlx::query("UPDATE routing_rules SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(rule_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RoutingError::not_found(format!("rule {rule_id}")));
        }
        Ok(())
    }

    async fn insert_task(&self, task: Task) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO tasks
                (id, task_sid, queue_sid, workflow_sid, attributes, priority,
                 timeout_secs, status, worker_id, cancel_reason,
                 created_at, updated_at, ended_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&task.id.0)
        .bind(&task.task_sid)
        .bind(&task.queue_sid)
        .bind(&task.workflow_sid)
        .bind(serde_json::to_string(&task.attributes)?)
        .bind(task.priority)
        .bind(task.timeout_secs as i64)
        .bind(task.status.to_string())
        .bind(task.worker_id.as_ref().map(|w| w.0.clone()))
        .bind(&task.cancel_reason)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(task.ended_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RoutingError::data_integrity(format!(
                "task with sid {} already exists",
                task.task_sid
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_task(&self, id: &TaskId) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn find_task_by_sid(&self, task_sid: &str) -> Result<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE task_sid = ?")
            .bind(task_sid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(task_from_row).transpose()
    }

    async fn transition_task(
        &self,
        id: &TaskId,
        from: &[TaskStatus],
        to: TaskStatus,
        changes: TaskChanges,
    ) -> Result<Option<Task>> {
        let sql = format!(
            "UPDATE tasks
             SET status = ?,
                 updated_at = ?,
                 worker_id = COALESCE(?, worker_id),
                 cancel_reason = COALESCE(?, cancel_reason),
                 ended_at = COALESCE(?, ended_at)
             WHERE id = ? AND status IN ({})",
            status_list(from)
        );
        let result = sqlx::query(&sql)
            .bind(to.to_string())
            .bind(Utc::now().to_rfc3339())
            .bind(changes.worker_id.map(|w| w.0))
            .bind(changes.cancel_reason)
            .bind(changes.ended_at.map(|t| t.to_rfc3339()))
            .bind(&id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            // Distinguish wrong-state from missing.
            return match self.get_task(id).await? {
                Some(_) => Ok(None),
                None => Err(RoutingError::not_found(format!("task {id}"))),
            };
        }
        self.get_task(id).await
    }

    async fn insert_reservation(&self, reservation: Reservation) -> Result<()> {
        sqlx::query(
            "INSERT INTO reservations
                (id, task_id, worker_id, status, reject_reason, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reservation.id.0)
        .bind(&reservation.task_id.0)
        .bind(&reservation.worker_id.0)
        .bind(reservation.status.to_string())
        .bind(&reservation.reject_reason)
        .bind(reservation.created_at.to_rfc3339())
        .bind(reservation.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_reservation(&self, id: &ReservationId) -> Result<Option<Reservation>> {
        let row = sqlx::query("SELECT * FROM reservations WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn latest_reservation(
        &self,
        task_id: &TaskId,
        status: ReservationStatus,
    ) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            "SELECT * FROM reservations
             WHERE task_id = ? AND status = ?
             ORDER BY created_at DESC
             LIMIT 1",
        )
        .bind(&task_id.0)
        .bind(status.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(reservation_from_row).transpose()
    }

    async fn open_reservations(&self, task_id: &TaskId) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(
            "SELECT * FROM reservations
             WHERE task_id = ? AND status IN ('PENDING', 'ACCEPTED')",
        )
        .bind(&task_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(reservation_from_row).collect()
    }

    async fn transition_reservation(
        &self,
        id: &ReservationId,
        from: ReservationStatus,
        to: ReservationStatus,
        reject_reason: Option<String>,
    ) -> Result<Option<Reservation>> {
        let result = sqlx::query(
            "UPDATE reservations
             SET status = ?,
                 updated_at = ?,
                 reject_reason = COALESCE(?, reject_reason)
             WHERE id = ? AND status = ?",
        )
        .bind(to.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(reject_reason)
        .bind(&id.0)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get_reservation(id).await? {
                Some(_) => Ok(None),
                None => Err(RoutingError::not_found(format!("reservation {id}"))),
            };
        }
        self.get_reservation(id).await
    }

    async fn upsert_worker(&self, worker: Worker) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO workers
                (id, worker_sid, friendly_name, activity_sid, available,
                 skills, department, capacity, last_assigned_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&worker.id.0)
        .bind(&worker.worker_sid)
        .bind(&worker.friendly_name)
        .bind(&worker.activity_sid)
        .bind(worker.available)
        .bind(serde_json::to_string(&worker.skills)?)
        .bind(&worker.department)
        .bind(worker.capacity as i64)
        .bind(worker.last_assigned_at.map(|t| t.to_rfc3339()))
        .bind(worker.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_worker(&self, id: &WorkerId) -> Result<Option<Worker>> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(worker_from_row).transpose()
    }

    async fn list_workers(&self) -> Result<Vec<Worker>> {
        let rows = sqlx::query("SELECT * FROM workers")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(worker_from_row).collect()
    }

    async fn set_worker_activity(
        &self,
        id: &WorkerId,
        activity_sid: &str,
        available: bool,
    ) -> Result<Worker> {
        let result = sqlx::query(
            "UPDATE workers SET activity_sid = ?, available = ?, updated_at = ? WHERE id = ?",
        )
        .bind(activity_sid)
        .bind(available)
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(RoutingError::not_found(format!("worker {id}")));
        }
        self.get_worker(id)
            .await?
            .ok_or_else(|| RoutingError::not_found(format!("worker {id}")))
    }

    async fn record_assignment(&self, id: &WorkerId, at: DateTime<Utc>) -> Result<()> {
        let result = sqlx::query("UPDATE workers SET last_assigned_at = ? WHERE id = ?")
            .bind(at.to_rfc3339())
            .bind(&id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RoutingError::not_found(format!("worker {id}")));
        }
        Ok(())
    }

    async fn count_open_work(&self, id: &WorkerId) -> Result<u32> {
        let offers: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM reservations
             WHERE worker_id = ? AND status = 'PENDING'",
        )
        .bind(&id.0)
        .fetch_one(&self.pool)
        .await?
        .try_get("n")?;
        let assigned: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM tasks
             WHERE worker_id = ? AND status NOT IN ('COMPLETED', 'CANCELED')",
        )
        .bind(&id.0)
        .fetch_one(&self.pool)
        .await?
        .try_get("n")?;
        Ok((offers + assigned) as u32)
    }

    async fn upsert_activity(&self, activity: Activity) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO activities (activity_sid, friendly_name, available)
             VALUES (?, ?, ?)",
        )
        .bind(&activity.activity_sid)
        .bind(&activity.friendly_name)
        .bind(activity.available)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_activity(&self, activity_sid: &str) -> Result<Option<Activity>> {
        let row = sqlx::query("SELECT * FROM activities WHERE activity_sid = ?")
            .bind(activity_sid)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(activity_from_row).transpose()
    }

    async fn list_activities(&self) -> Result<Vec<Activity>> {
        let rows = sqlx::query("SELECT * FROM activities")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(activity_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeBag;
    use crate::routing::{Action, Condition, Operator};
    use crate::task::TaskDestination;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    fn pending_task(sid: &str) -> Task {
        Task::new(
            sid,
            &TaskDestination::queue("QUsales"),
            AttributeBag::new().with("department", "sales"),
            0,
            120,
        )
    }

    #[tokio::test]
    async fn rules_round_trip_through_json_columns() {
        let store = store().await;
        let rule = RoutingRule::new("sales", 10)
            .with_condition(Condition::new("department", Operator::Equals, "sales"))
            .with_action(Action::Queue {
                queue_sid: "QUsales".to_string(),
            });
        store.insert_rule(rule.clone()).await.unwrap();

        let loaded = store.list_enabled_rules().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].conditions, rule.conditions);
        assert_eq!(loaded[0].actions, rule.actions);

        store.set_rule_enabled(&rule.id, false).await.unwrap();
        assert!(store.list_enabled_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditional_transition_commits_exactly_once() {
        let store = store().await;
        let task = pending_task("WT1");
        let id = task.id.clone();
        store.insert_task(task).await.unwrap();

        let won = store
            .transition_task(
                &id,
                &[TaskStatus::Pending],
                TaskStatus::Reserved,
                TaskChanges::none(),
            )
            .await
            .unwrap();
        assert_eq!(won.unwrap().status, TaskStatus::Reserved);

        let lost = store
            .transition_task(
                &id,
                &[TaskStatus::Pending],
                TaskStatus::Canceled,
                TaskChanges::canceled("late"),
            )
            .await
            .unwrap();
        assert!(lost.is_none());
    }

    #[tokio::test]
    async fn duplicate_task_sid_is_a_data_integrity_fault() {
        let store = store().await;
        store.insert_task(pending_task("WT1")).await.unwrap();
        let err = store.insert_task(pending_task("WT1")).await.unwrap_err();
        assert!(matches!(err, RoutingError::DataIntegrity(_)));
    }

    #[tokio::test]
    async fn task_fields_survive_the_round_trip() {
        let store = store().await;
        let task = pending_task("WT1");
        let id = task.id.clone();
        store.insert_task(task.clone()).await.unwrap();

        let loaded = store.get_task(&id).await.unwrap().unwrap();
        assert_eq!(loaded.task_sid, "WT1");
        assert_eq!(loaded.queue_sid.as_deref(), Some("QUsales"));
        assert_eq!(loaded.attributes, task.attributes);
        assert_eq!(loaded.timeout_secs, 120);

        let by_sid = store.find_task_by_sid("WT1").await.unwrap().unwrap();
        assert_eq!(by_sid.id, id);
    }

    #[tokio::test]
    async fn reservation_lookup_by_task_and_status() {
        let store = store().await;
        let task = pending_task("WT1");
        let task_id = task.id.clone();
        store.insert_task(task).await.unwrap();

        let mut earlier = Reservation::new(task_id.clone(), "w1".into());
        earlier.created_at = Utc::now() - chrono::Duration::seconds(30);
        earlier.status = ReservationStatus::Rejected;
        let current = Reservation::new(task_id.clone(), "w2".into());
        store.insert_reservation(earlier).await.unwrap();
        store.insert_reservation(current.clone()).await.unwrap();

        let latest = store
            .latest_reservation(&task_id, ReservationStatus::Pending)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, current.id);

        let open = store.open_reservations(&task_id).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, current.id);
    }

    #[tokio::test]
    async fn worker_activity_and_assignment_updates() {
        let store = store().await;
        store
            .upsert_worker(Worker::new("w1", "WK1", "Alice").with_skills(vec!["sales".into()]))
            .await
            .unwrap();

        let worker = store
            .set_worker_activity(&WorkerId::from("w1"), "WA-available", true)
            .await
            .unwrap();
        assert!(worker.available);
        assert_eq!(worker.activity_sid, "WA-available");

        let at = Utc::now();
        store
            .record_assignment(&WorkerId::from("w1"), at)
            .await
            .unwrap();
        let worker = store
            .get_worker(&WorkerId::from("w1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            worker.last_assigned_at.map(|t| t.timestamp()),
            Some(at.timestamp())
        );
        assert_eq!(worker.skills, vec!["sales".to_string()]);
    }

    #[tokio::test]
    async fn open_work_counts_offers_and_assignments() {
        let store = store().await;
        store
            .upsert_worker(Worker::new("w1", "WK1", "Alice"))
            .await
            .unwrap();
        let w1 = WorkerId::from("w1");
        assert_eq!(store.count_open_work(&w1).await.unwrap(), 0);

        // A pending offer counts.
        let offered = pending_task("WT1");
        let offered_id = offered.id.clone();
        store.insert_task(offered).await.unwrap();
        store
            .insert_reservation(Reservation::new(offered_id, w1.clone()))
            .await
            .unwrap();
        assert_eq!(store.count_open_work(&w1).await.unwrap(), 1);

        // An accepted assignment counts; a completed one does not.
        let assigned = pending_task("WT2");
        let assigned_id = assigned.id.clone();
        store.insert_task(assigned).await.unwrap();
        store
            .transition_task(
                &assigned_id,
                &[TaskStatus::Pending],
                TaskStatus::Accepted,
                TaskChanges::assigned_to(w1.clone()),
            )
            .await
            .unwrap();
        assert_eq!(store.count_open_work(&w1).await.unwrap(), 2);

        store
            .transition_task(
                &assigned_id,
                &[TaskStatus::Accepted],
                TaskStatus::Completed,
                TaskChanges::ended(),
            )
            .await
            .unwrap();
        assert_eq!(store.count_open_work(&w1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn missing_entities_report_not_found() {
        let store = store().await;
        let err = store
            .transition_task(
                &TaskId::from("nope"),
                &[TaskStatus::Pending],
                TaskStatus::Canceled,
                TaskChanges::none(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NotFound(_)));

        let err = store
            .set_worker_activity(&WorkerId::from("nope"), "WA-available", true)
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::NotFound(_)));
    }
}
