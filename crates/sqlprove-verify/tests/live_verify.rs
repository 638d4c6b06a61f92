//! End-to-end verification against a live database.
//!
//! Requires `DATABASE_URL` in the environment or a `.env` file; the test
//! skips itself otherwise. The schema is rebuilt on every run.

use std::sync::Arc;

use sqlprove::{Command, PgValue, Varchar};
use sqlprove_verify::{
    CheckError, ProcParam, SchemaChecker, derive_proc_params, install_checker, verify_call_sites,
    verify_call_sites_first_only,
};

const SETUP: &str = "
    DROP TABLE IF EXISTS post CASCADE;
    CREATE TABLE post (
        post_id serial PRIMARY KEY,
        text text,
        creation_date timestamp NOT NULL
    );
    DROP PROCEDURE IF EXISTS set_post_text(integer, character varying);
    CREATE PROCEDURE set_post_text(p_id integer, p_text character varying(10))
    LANGUAGE plpgsql AS $$
    BEGIN
        UPDATE post SET text = p_text WHERE post_id = p_id;
    END
    $$;
";

#[derive(Debug, sqlprove::RowShape)]
struct PostRow {
    post_id: i32,
    text: Option<String>,
    creation_date: chrono::NaiveDateTime,
}

fn posts_since(after: chrono::NaiveDateTime) -> sqlprove::Query<PostRow> {
    let mut command = Command::new(
        "SELECT post_id, text, creation_date FROM post WHERE creation_date >= @after",
    );
    command.add_param("after", &after);
    command.query()
}

sqlprove_verify::verify_site!(TypedReadList, fn posts_since(after: chrono::NaiveDateTime));

fn posts_of_year(
    year: i32,
) -> sqlprove::Paging<sqlprove::Query<PostRow>, sqlprove::Query<Option<i64>>> {
    sqlprove::paged_queries(
        |command| {
            command.push_sql(
                "SELECT post_id, text, creation_date FROM post \
                 WHERE EXTRACT(year FROM creation_date)::int4 = @year",
            );
            command.add_param("year", &year);
        },
        "post_id",
        0,
        10,
        None,
    )
}

sqlprove_verify::verify_site!(PagedQueries, fn posts_of_year(year: i32));

#[derive(Clone, sqlprove::BindParams, sqlprove::TestValues)]
struct NewPost {
    text: Option<Varchar>,
    creation_date: chrono::NaiveDateTime,
}

async fn add_post(post: NewPost) -> sqlprove::LiftResult<sqlprove::Query<i32>> {
    sqlprove::insert_returning("post", post, None).await
}

sqlprove_verify::verify_site!(InsertBySchema, async fn add_post(post: NewPost));

#[derive(Clone, sqlprove::BindParams, sqlprove::TestValues)]
struct PostPatch {
    post_id: i32,
    text: Option<Varchar>,
}

async fn patch_post(patch: PostPatch) -> sqlprove::LiftResult<u64> {
    sqlprove::update_by_key("post", patch, None).await?.execute().await
}

sqlprove_verify::verify_site!(UpdateBySchema, async fn patch_post(patch: PostPatch));

#[derive(Clone, sqlprove::BindParams, sqlprove::TestValues)]
struct PostKey {
    post_id: i32,
}

async fn remove_post(key: PostKey) -> sqlprove::LiftResult<u64> {
    sqlprove::delete_by_key("post", key, None).await?.execute().await
}

sqlprove_verify::verify_site!(DeleteBySchema, async fn remove_post(key: PostKey));

async fn call_set_post_text(id: i32, text: Varchar) -> sqlprove::LiftResult<u64> {
    let mut command = Command::procedure("set_post_text");
    command.add_param("p_id", &id);
    command.add_param("p_text", &text);
    command.non_query().execute().await
}

sqlprove_verify::verify_site!(RawNonQuery, async fn call_set_post_text(id: i32, text: Varchar));

#[tokio::test]
async fn verifies_every_call_site_against_the_live_schema() {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("skipping live verification: DATABASE_URL not set");
        return;
    };

    let (client, connection) = tokio_postgres::connect(&url, tokio_postgres::NoTls)
        .await
        .unwrap();
    tokio::spawn(connection);
    client.batch_execute(SETUP).await.unwrap();

    sqlprove::set_connection_string_fn({
        let url = url.clone();
        move || url.clone()
    });

    // the full combination space, then the first-only smoke pass
    verify_call_sites().await.unwrap();
    verify_call_sites_first_only().await.unwrap();

    // a non-optional String against the nullable 'text' column is rejected,
    // with a corrected declaration attached
    {
        let checker = Arc::new(SchemaChecker::new());
        let _guard = install_checker(checker.clone()).unwrap();
        let _ = Command::new("SELECT text FROM post").query::<String>();
        assert_eq!(checker.pending_count(), 1);

        let err = checker.drain().await.unwrap_err();
        let text = err.to_string();
        assert!(text.contains("'text'"), "{text}");
        assert!(text.contains("suggested declaration"), "{text}");
        assert!(text.contains("text: Option<String>"), "{text}");

        let records = checker.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sql, "SELECT text FROM post");
        assert!(records[0].file.ends_with("live_verify.rs"));
        assert!(records[0].result_type.as_deref().unwrap().contains("String"));
    }

    // an undersized procedure parameter is rejected through the same seam
    {
        let checker = Arc::new(SchemaChecker::new());
        let _guard = install_checker(checker.clone()).unwrap();
        let mut command = Command::procedure("set_post_text");
        command.add_param("p_id", &1_i32);
        command.add_param("p_text", &PgValue::text_sized(Some("ab".into()), 5));
        let _ = command.non_query();

        let err = checker.drain().await.unwrap_err();
        assert!(matches!(err.root(), CheckError::ParamMismatch(_)), "{err}");
        assert!(err.to_string().contains("p_text"), "{err}");
    }

    // the declared parameters come back as written in the DDL
    let declared = derive_proc_params(&client, "set_post_text").await.unwrap();
    assert_eq!(
        declared,
        vec![
            ProcParam {
                name: "p_id".into(),
                data_type: "integer".into(),
                size: -1,
            },
            ProcParam {
                name: "p_text".into(),
                data_type: "character varying".into(),
                size: 10,
            },
        ]
    );

    sqlprove::clear_connection_string_fn();
}
