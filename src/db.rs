use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use mongodb::bson::doc;
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use crate::models::Student;

pub const STUDENTS_COLLECTION: &str = "students";

const DEFAULT_DATABASE: &str = "test";

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn find_all(&self) -> anyhow::Result<Vec<Student>>;
}

pub type DynStudentStore = Arc<dyn StudentStore>;

#[derive(Clone)]
pub struct MongoStore {
    database: Database,
    students: Collection<Student>,
}

impl MongoStore {
    pub async fn connect(uri: &str) -> anyhow::Result<Self> {
        let client = Client::with_uri_str(uri).await?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        let students = database.collection(STUDENTS_COLLECTION);
        Ok(Self { database, students })
    }

    // The driver connects lazily; the ping is what actually reaches the
    // deployment, and the indexes are what enforce the uniqueness of
    // `studentID` and `email` at the storage layer.
    pub async fn ensure_ready(&self) -> anyhow::Result<()> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        self.students.create_indexes(unique_indexes(), None).await?;
        Ok(())
    }
}

#[async_trait]
impl StudentStore for MongoStore {
    async fn find_all(&self) -> anyhow::Result<Vec<Student>> {
        let cursor = self.students.find(None, None).await?;
        let students: Vec<Student> = cursor.try_collect().await?;
        Ok(students)
    }
}

fn unique_indexes() -> [IndexModel; 2] {
    let unique = IndexOptions::builder().unique(true).build();
    [
        IndexModel::builder()
            .keys(doc! { "studentID": 1 })
            .options(unique.clone())
            .build(),
        IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(unique)
            .build(),
    ]
}

// Installed when no client could be built at startup; every query fails,
// so the listing route answers 500 at query time.
pub struct Disconnected;

#[async_trait]
impl StudentStore for Disconnected {
    async fn find_all(&self) -> anyhow::Result<Vec<Student>> {
        bail!("no MongoDB connection was established")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_indexes_cover_student_id_and_email() {
        let indexes = unique_indexes();
        let keys: Vec<_> = indexes.iter().map(|index| index.keys.clone()).collect();

        assert_eq!(keys, vec![doc! { "studentID": 1 }, doc! { "email": 1 }]);
        for index in indexes {
            assert_eq!(index.options.and_then(|options| options.unique), Some(true));
        }
    }

    #[tokio::test]
    async fn disconnected_store_fails_every_query() {
        let err = Disconnected.find_all().await.unwrap_err();
        assert!(err.to_string().contains("no MongoDB connection"));
    }
}
