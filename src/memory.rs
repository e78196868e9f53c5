use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::db::Store;
use crate::models::{Attendance, Scholar, User};

/// In-process store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    scholars: RwLock<HashMap<Uuid, Scholar>>,
    attendance: RwLock<BTreeMap<(String, NaiveDate), Attendance>>,
}

#[async_trait]
impl Store for MemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert_user(&self, user: &User) -> anyhow::Result<bool> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Ok(false);
        }
        users.insert(user.email.clone(), user.clone());
        Ok(true)
    }

    async fn find_user(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool> {
        let mut scholars = self.scholars.write().await;
        if scholars.values().any(|s| s.email == scholar.email) {
            return Ok(false);
        }
        scholars.insert(scholar.id, scholar.clone());
        Ok(true)
    }

    async fn scholar_by_email(&self, email: &str) -> anyhow::Result<Option<Scholar>> {
        Ok(self
            .scholars
            .read()
            .await
            .values()
            .find(|s| s.email == email)
            .cloned())
    }

    async fn scholar_by_id(&self, id: Uuid) -> anyhow::Result<Option<Scholar>> {
        Ok(self.scholars.read().await.get(&id).cloned())
    }

    async fn scholars_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Scholar>> {
        let mut scholars: Vec<Scholar> = self
            .scholars
            .read()
            .await
            .values()
            .filter(|s| s.created_by.as_deref() == Some(created_by))
            .cloned()
            .collect();
        scholars.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.email.cmp(&b.email)));
        Ok(scholars)
    }

    async fn replace_scholar(&self, scholar: &Scholar) -> anyhow::Result<bool> {
        let mut scholars = self.scholars.write().await;
        match scholars.get_mut(&scholar.id) {
            Some(stored) => {
                *stored = scholar.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn save_attendance(&self, record: &Attendance) -> anyhow::Result<Attendance> {
        self.attendance
            .write()
            .await
            .insert((record.scholar_email.clone(), record.date), record.clone());
        Ok(record.clone())
    }

    async fn attendance_for_scholar(&self, email: &str) -> anyhow::Result<Vec<Attendance>> {
        Ok(self
            .attendance
            .read()
            .await
            .values()
            .filter(|r| r.scholar_email == email)
            .cloned()
            .collect())
    }

    async fn attendance_created_by(&self, created_by: &str) -> anyhow::Result<Vec<Attendance>> {
        let mut records: Vec<Attendance> = self
            .attendance
            .read()
            .await
            .values()
            .filter(|r| r.created_by == created_by)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.scholar_email.cmp(&b.scholar_email))
        });
        Ok(records)
    }
}
