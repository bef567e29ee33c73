use std::str::FromStr;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::config::AppConfig;
use crate::models::{ChatMessage, QuizQuestion, SessionSummary};

const SESSION_RETENTION: i64 = 10;
const MESSAGE_RETENTION: i64 = 20;

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.data_dir).await?;

        let options = SqliteConnectOptions::from_str(&config.sqlite_dsn())?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS past_questions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source TEXT NOT NULL,
                chapter TEXT NOT NULL,
                question_text TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Creates or touches a session. Only the 10 most recently updated
    /// sessions are kept; evicted sessions lose their messages too.
    pub async fn save_session(&self, session_id: &str, title: Option<&str>) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        let exists = sqlx::query("SELECT id FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?
            .is_some();

        if exists {
            if let Some(title) = title {
                sqlx::query("UPDATE sessions SET title = ?, updated_at = ? WHERE id = ?")
                    .bind(title)
                    .bind(&now)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
            } else {
                sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(session_id)
                    .execute(&self.pool)
                    .await?;
            }
        } else {
            sqlx::query("INSERT INTO sessions (id, title, updated_at) VALUES (?, ?, ?)")
                .bind(session_id)
                .bind(title.unwrap_or("New Conversation"))
                .bind(&now)
                .execute(&self.pool)
                .await?;
        }

        let evicted = sqlx::query(
            "SELECT id FROM sessions ORDER BY updated_at DESC, id DESC LIMIT -1 OFFSET ?",
        )
        .bind(SESSION_RETENTION)
        .fetch_all(&self.pool)
        .await?;

        for row in evicted {
            let old_id: String = row.get("id");
            sqlx::query("DELETE FROM messages WHERE session_id = ?")
                .bind(&old_id)
                .execute(&self.pool)
                .await?;
            sqlx::query("DELETE FROM sessions WHERE id = ?")
                .bind(&old_id)
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Appends a message, evicting the oldest beyond 20 per session,
    /// and bumps the session so it stays at the top of the history.
    pub async fn save_message(&self, session_id: &str, role: &str, content: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM messages
            WHERE id IN (
                SELECT id FROM messages
                WHERE session_id = ?
                ORDER BY id DESC
                LIMIT -1 OFFSET ?
            )
            "#,
        )
        .bind(session_id)
        .bind(MESSAGE_RETENTION)
        .execute(&self.pool)
        .await?;

        self.save_session(session_id, None).await?;
        Ok(())
    }

    pub async fn recent_sessions(&self, limit: i64) -> Result<Vec<SessionSummary>> {
        let rows = sqlx::query(
            "SELECT id, title FROM sessions ORDER BY updated_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| SessionSummary {
                id: r.get("id"),
                title: r.get("title"),
            })
            .collect())
    }

    pub async fn messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            "SELECT role, content FROM messages WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ChatMessage {
                role: r.get("role"),
                content: r.get("content"),
            })
            .collect())
    }

    pub async fn session_message_count(&self, session_id: &str) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE session_id = ?")
            .bind(session_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn delete_session_messages(&self, session_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent question texts for (source, chapter), newest first.
    pub async fn past_questions(
        &self,
        source: &str,
        chapter: &str,
        limit: i64,
    ) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT question_text FROM past_questions
            WHERE source = ? AND chapter = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(source)
        .bind(chapter)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<String, _>("question_text"))
            .collect())
    }

    pub async fn save_past_questions(
        &self,
        source: &str,
        chapter: &str,
        questions: &[QuizQuestion],
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for question in questions {
            if question.question.is_empty() {
                continue;
            }
            sqlx::query(
                "INSERT INTO past_questions (source, chapter, question_text, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(source)
            .bind(chapter)
            .bind(&question.question)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_past_questions_by_source(&self, source: &str) -> Result<()> {
        sqlx::query("DELETE FROM past_questions WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// Derives a session title from the user's first message.
pub fn generate_chat_title(first_prompt: &str) -> String {
    let trimmed = first_prompt.trim();
    let mut title: String = trimmed.to_string();
    if let Some(first) = trimmed.chars().next() {
        title = first.to_uppercase().collect::<String>() + &trimmed[first.len_utf8()..];
    }
    if title.chars().count() > 35 {
        let head: String = title.chars().take(32).collect();
        return format!("{head}...");
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str) -> QuizQuestion {
        QuizQuestion {
            question: text.to_string(),
            options: vec!["a".into(), "b".into()],
            correct_answer: "a".into(),
            correct_explanation: String::new(),
            incorrect_explanations: Default::default(),
            source_page: String::new(),
            source_snippet: String::new(),
            chapter: String::new(),
        }
    }

    #[test]
    fn titles_are_capitalized_and_truncated() {
        assert_eq!(generate_chat_title("what is the heart"), "What is the heart");
        assert_eq!(generate_chat_title(""), "");
        let long = "a".repeat(50);
        let title = generate_chat_title(&long);
        assert_eq!(title.chars().count(), 35);
        assert!(title.ends_with("..."));
    }

    #[tokio::test]
    async fn messages_are_capped_per_session() {
        let store = HistoryStore::in_memory().await.unwrap();
        store.save_session("s1", Some("Test")).await.unwrap();

        for i in 0..25 {
            store
                .save_message("s1", "user", &format!("message {i}"))
                .await
                .unwrap();
        }

        let messages = store.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 20);
        assert_eq!(messages[0].content, "message 5");
        assert_eq!(messages[19].content, "message 24");
    }

    #[tokio::test]
    async fn oldest_sessions_are_evicted_with_their_messages() {
        let store = HistoryStore::in_memory().await.unwrap();

        for i in 0..12 {
            let id = format!("s{i:02}");
            store.save_session(&id, Some(&format!("Title {i}"))).await.unwrap();
            store.save_message(&id, "user", "hello").await.unwrap();
        }

        let sessions = store.recent_sessions(50).await.unwrap();
        assert_eq!(sessions.len(), 10);
        assert!(sessions.iter().all(|s| s.id != "s00" && s.id != "s01"));

        assert!(store.messages("s00").await.unwrap().is_empty());
        assert_eq!(store.messages("s11").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn past_questions_fetch_newest_first_with_limit() {
        let store = HistoryStore::in_memory().await.unwrap();

        let batch: Vec<QuizQuestion> = (0..5).map(|i| question(&format!("q{i}"))).collect();
        store
            .save_past_questions("book.pdf", "Hoofdstuk 1", &batch)
            .await
            .unwrap();

        let recent = store
            .past_questions("book.pdf", "Hoofdstuk 1", 3)
            .await
            .unwrap();
        assert_eq!(recent, vec!["q4", "q3", "q2"]);

        // Scoped to (source, chapter).
        assert!(store
            .past_questions("book.pdf", "Hoofdstuk 2", 20)
            .await
            .unwrap()
            .is_empty());

        store.delete_past_questions_by_source("book.pdf").await.unwrap();
        assert!(store
            .past_questions("book.pdf", "Hoofdstuk 1", 20)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn saving_a_message_bumps_the_session() {
        let store = HistoryStore::in_memory().await.unwrap();
        store.save_session("a", Some("First")).await.unwrap();
        store.save_session("b", Some("Second")).await.unwrap();

        store.save_message("a", "user", "bump").await.unwrap();

        let sessions = store.recent_sessions(10).await.unwrap();
        assert_eq!(sessions[0].id, "a");
    }
}
