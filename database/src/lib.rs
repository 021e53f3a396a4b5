use chrono::{DateTime, Utc};
use marketsnipe_core::{
    CoreError, DatabaseError, NewProject, NewSavedComment, Project, ProjectStatus, SavedComment,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_projects",
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            query TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            matches_count INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "create_projects_user_index",
        "CREATE INDEX IF NOT EXISTS idx_projects_user ON projects (user_id, created_at)",
    ),
    (
        "create_saved_comments",
        r#"
        CREATE TABLE IF NOT EXISTS saved_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            project_id INTEGER NOT NULL REFERENCES projects (id) ON DELETE CASCADE,
            comment_text TEXT NOT NULL,
            source_url TEXT NOT NULL,
            author TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    ),
    (
        "create_saved_comments_user_index",
        "CREATE INDEX IF NOT EXISTS idx_saved_comments_user ON saved_comments (user_id, project_id)",
    ),
];

/// SQLite store for projects and the comments saved under them.
#[derive(Debug)]
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    /// Opens (and creates if needed) the database file.
    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to database {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for (name, sql) in MIGRATIONS {
            debug!("Applying migration {}", name);
            sqlx::query(sql)
                .execute(pool)
                .await
                .map_err(|_| DatabaseError::MigrationFailed {
                    migration: name.to_string(),
                })?;
        }
        info!("Database migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            DatabaseError::ConnectionFailed {
                reason: "database is not connected".to_string(),
            }
            .into()
        })
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, CoreError> {
        let created_at = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO projects (user_id, query, status, matches_count, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&project.user_id)
        .bind(&project.query)
        .bind(project.status.as_str())
        .bind(project.matches_count)
        .bind(created_at)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        let id = result.last_insert_rowid();
        debug!("Created project {} for user {}", id, project.user_id);
        self.get_project(id).await
    }

    pub async fn get_project(&self, id: i64) -> Result<Project, CoreError> {
        let row = sqlx::query(
            "SELECT id, user_id, query, status, matches_count, created_at FROM projects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        match row {
            Some(row) => project_from_row(&row),
            None => Err(DatabaseError::NotFound {
                table: "projects".to_string(),
                id,
            }
            .into()),
        }
    }

    /// The user's projects, newest first.
    pub async fn list_projects(&self, user_id: &str) -> Result<Vec<Project>, CoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, query, status, matches_count, created_at FROM projects WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        rows.iter().map(project_from_row).collect()
    }

    pub async fn save_comment(&self, comment: &NewSavedComment) -> Result<SavedComment, CoreError> {
        // Surfaces a missing project as a 404 rather than a constraint error
        self.get_project(comment.project_id).await?;

        let created_at = Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO saved_comments (user_id, project_id, comment_text, source_url, author, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.user_id)
        .bind(comment.project_id)
        .bind(&comment.comment_text)
        .bind(&comment.source_url)
        .bind(&comment.author)
        .bind(created_at)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        let id = result.last_insert_rowid();
        let row = sqlx::query(
            "SELECT id, user_id, project_id, comment_text, source_url, author, created_at FROM saved_comments WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool()?)
        .await
        .map_err(DatabaseError::Sql)?;

        saved_comment_from_row(&row)
    }

    pub async fn list_saved_comments(
        &self,
        user_id: &str,
        project_id: Option<i64>,
    ) -> Result<Vec<SavedComment>, CoreError> {
        let rows = match project_id {
            Some(project_id) => {
                sqlx::query(
                    "SELECT id, user_id, project_id, comment_text, source_url, author, created_at FROM saved_comments WHERE user_id = ? AND project_id = ? ORDER BY id",
                )
                .bind(user_id)
                .bind(project_id)
                .fetch_all(self.pool()?)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, user_id, project_id, comment_text, source_url, author, created_at FROM saved_comments WHERE user_id = ? ORDER BY id",
                )
                .bind(user_id)
                .fetch_all(self.pool()?)
                .await
            }
        }
        .map_err(DatabaseError::Sql)?;

        rows.iter().map(saved_comment_from_row).collect()
    }

    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn project_from_row(row: &SqliteRow) -> Result<Project, CoreError> {
    let status: String = row.try_get("status").map_err(DatabaseError::Sql)?;
    let status = ProjectStatus::parse(&status).ok_or_else(|| DatabaseError::QueryFailed {
        query: format!("unknown project status '{}'", status),
    })?;

    Ok(Project {
        id: row.try_get("id").map_err(DatabaseError::Sql)?,
        user_id: row.try_get("user_id").map_err(DatabaseError::Sql)?,
        query: row.try_get("query").map_err(DatabaseError::Sql)?,
        status,
        matches_count: row.try_get("matches_count").map_err(DatabaseError::Sql)?,
        created_at: timestamp(row.try_get("created_at").map_err(DatabaseError::Sql)?)?,
    })
}

fn saved_comment_from_row(row: &SqliteRow) -> Result<SavedComment, CoreError> {
    Ok(SavedComment {
        id: row.try_get("id").map_err(DatabaseError::Sql)?,
        user_id: row.try_get("user_id").map_err(DatabaseError::Sql)?,
        project_id: row.try_get("project_id").map_err(DatabaseError::Sql)?,
        comment_text: row.try_get("comment_text").map_err(DatabaseError::Sql)?,
        source_url: row.try_get("source_url").map_err(DatabaseError::Sql)?,
        author: row.try_get("author").map_err(DatabaseError::Sql)?,
        created_at: timestamp(row.try_get("created_at").map_err(DatabaseError::Sql)?)?,
    })
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, CoreError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| {
        DatabaseError::QueryFailed {
            query: format!("invalid timestamp {}", secs),
        }
        .into()
    })
}
