use db_cleaner::db::Database;
use db_cleaner::resolution::{ConsolePrompt, Decision, ScriptedDecisions};
use db_cleaner::store::{Artist, ArtistStore};
use db_cleaner::{run_session, CleanerError, MergeStep, SessionOutcome};
use std::io::Cursor;
use tempfile::TempDir;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE artists (
        artist_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE tracks (
        track_id INTEGER PRIMARY KEY AUTOINCREMENT,
        artist_id INTEGER NOT NULL REFERENCES artists (artist_id),
        title TEXT NOT NULL
    )
    "#,
];

/// A catalog database in a temporary directory. The directory lives as long
/// as the fixture.
struct Catalog {
    _dir: TempDir,
    url: String,
}

impl Catalog {
    async fn new(artists: &[(i64, &str)], tracks: &[(i64, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let url = format!(
            "sqlite://{}?mode=rwc",
            dir.path().join("catalog.db").display()
        );

        let db = Database::new(&url).await.unwrap();
        for statement in SCHEMA {
            sqlx::query(statement).execute(db.pool()).await.unwrap();
        }
        for (id, name) in artists {
            sqlx::query("INSERT INTO artists (artist_id, name) VALUES ($1, $2)")
                .bind(*id)
                .bind(*name)
                .execute(db.pool())
                .await
                .unwrap();
        }
        for (artist_id, title) in tracks {
            sqlx::query("INSERT INTO tracks (artist_id, title) VALUES ($1, $2)")
                .bind(*artist_id)
                .bind(*title)
                .execute(db.pool())
                .await
                .unwrap();
        }
        db.close().await;

        Self { _dir: dir, url }
    }

    /// Opens a fresh connection, as a later session would.
    async fn open(&self) -> Database {
        Database::new(&self.url).await.unwrap()
    }

    async fn execute(&self, statement: &str) {
        let db = self.open().await;
        sqlx::query(statement).execute(db.pool()).await.unwrap();
        db.close().await;
    }

    /// Committed artists and each artist's track count, ordered by id.
    async fn snapshot(&self) -> Vec<(i64, String, i64)> {
        let db = self.open().await;
        let rows: Vec<(i64, String, i64)> = sqlx::query_as(
            r#"
            SELECT a.artist_id, a.name, CAST(COUNT(t.track_id) AS BIGINT)
            FROM artists a
            LEFT JOIN tracks t ON t.artist_id = a.artist_id
            GROUP BY a.artist_id, a.name
            ORDER BY a.artist_id
            "#,
        )
        .fetch_all(db.pool())
        .await
        .unwrap();
        db.close().await;
        rows
    }
}

async fn metal_catalog() -> Catalog {
    Catalog::new(
        &[(1, "Metallica"), (2, "Metalica"), (3, "Slayer")],
        &[
            (1, "One"),
            (1, "Battery"),
            (2, "Fade to Black"),
            (3, "Angel of Death"),
        ],
    )
    .await
}

#[tokio::test]
async fn test_fetch_orders_by_name_and_keeps_lowest_duplicate_id() {
    let catalog = Catalog::new(&[(5, "Slayer"), (2, "Anthrax"), (4, "Slayer")], &[]).await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();

    let artists = store.fetch_artists().await.unwrap();
    store.rollback().await.unwrap();

    assert_eq!(
        artists,
        vec![Artist::new("Anthrax", 2), Artist::new("Slayer", 4)]
    );
}

#[tokio::test]
async fn test_merge_is_committed() {
    let catalog = metal_catalog().await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();
    // "Metalica" sorts before "Metallica", so the survivor is option 2
    let mut decisions = ScriptedDecisions::new([Decision::MergeTo(2)]);

    let report = run_session(&mut store, &mut decisions, 1).await.unwrap();
    db.close().await;

    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.artists_merged, 1);
    assert_eq!(report.tracks_reassigned, 1);
    assert_eq!(report.singletons, 1);
    assert_eq!(
        catalog.snapshot().await,
        vec![(1, "Metallica".to_string(), 3), (3, "Slayer".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_retain_all_leaves_catalog_unchanged() {
    let catalog = metal_catalog().await;
    let before = catalog.snapshot().await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();
    let mut decisions = ScriptedDecisions::new([Decision::RetainAll]);

    let report = run_session(&mut store, &mut decisions, 1).await.unwrap();
    db.close().await;

    assert_eq!(report.retained, 2);
    assert_eq!(report.artists_merged, 0);
    assert_eq!(catalog.snapshot().await, before);
}

#[tokio::test]
async fn test_console_reprompt_then_merge() {
    let catalog = metal_catalog().await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();
    let mut prompt = ConsolePrompt::new(Cursor::new(b"5\n2.\n".to_vec()), Vec::new());

    run_session(&mut store, &mut prompt, 1).await.unwrap();
    db.close().await;

    let output = String::from_utf8(prompt.into_output()).unwrap();
    assert!(output.starts_with("Press 'q' to quit\nUsing an edit distance of 1\n"));
    assert_eq!(
        output
            .matches("Please choose an option between 0 and 2: ")
            .count(),
        1
    );
    assert_eq!(
        catalog.snapshot().await,
        vec![(1, "Metallica".to_string(), 3), (3, "Slayer".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_quit_commits_earlier_merges() {
    let catalog = Catalog::new(
        &[(1, "Anthrax"), (2, "Antrax"), (3, "Metallica"), (4, "Metalica")],
        &[(2, "Madhouse"), (4, "One")],
    )
    .await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();
    let mut prompt = ConsolePrompt::new(Cursor::new(b"1\nq\n".to_vec()), Vec::new());

    let report = run_session(&mut store, &mut prompt, 1).await.unwrap();
    db.close().await;

    assert_eq!(report.outcome, SessionOutcome::Aborted);
    let output = String::from_utf8(prompt.into_output()).unwrap();
    assert!(output.ends_with("Stopping\n"));
    assert_eq!(
        catalog.snapshot().await,
        vec![
            (1, "Anthrax".to_string(), 1),
            (3, "Metallica".to_string(), 0),
            (4, "Metalica".to_string(), 1),
        ]
    );
}

#[tokio::test]
async fn test_failed_delete_rolls_back_whole_session() {
    let catalog = Catalog::new(
        &[(1, "Anthrax"), (2, "Antrax"), (3, "Metallica"), (4, "Metalica")],
        &[(2, "Madhouse"), (3, "Battery"), (4, "One")],
    )
    .await;
    catalog
        .execute(
            r#"
            CREATE TRIGGER protect_metallica BEFORE DELETE ON artists
            WHEN OLD.artist_id = 3
            BEGIN
                SELECT RAISE(ABORT, 'artist 3 is protected');
            END
            "#,
        )
        .await;
    let before = catalog.snapshot().await;

    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();
    // Merge Antrax into Anthrax, then Metallica into Metalica
    let mut decisions = ScriptedDecisions::new([Decision::MergeTo(1), Decision::MergeTo(1)]);

    let err = run_session(&mut store, &mut decisions, 1).await.unwrap_err();
    db.close().await;

    match err {
        CleanerError::Database {
            step,
            artist,
            artist_id,
            survivor_id,
            ..
        } => {
            assert_eq!(step, MergeStep::DeleteArtist);
            assert_eq!(artist, "Metallica");
            assert_eq!(artist_id, 3);
            assert_eq!(survivor_id, 4);
        }
        other => panic!("unexpected error {:?}", other),
    }
    // A fresh connection sees the catalog exactly as it was before the session
    assert_eq!(catalog.snapshot().await, before);
}

#[tokio::test]
async fn test_store_refuses_calls_after_commit() {
    let catalog = metal_catalog().await;
    let db = catalog.open().await;
    let mut store = db.begin_session().await.unwrap();

    store.commit().await.unwrap();

    assert!(store.fetch_artists().await.is_err());
    assert!(store.rollback().await.is_err());
}
